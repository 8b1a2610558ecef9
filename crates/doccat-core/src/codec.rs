//! Length-prefixed wire form for catalogs and document outcomes.
//!
//! Every string is written as a big-endian `u32` byte length followed by its
//! UTF-8 bytes, so keyword text may contain any character, including the
//! separators of the catalog source file.
//!
//! ```text
//! catalog := "DCAT" version:u8 topic_count:u32 { topic:str keyword_count:u32 { keyword:str } }
//! outcome := tag:u8 (0 = classified, 1 = failed)
//!            classified: name:str score_count:u32 { topic:str count:u64 }
//!            failed:     name:str path:str reason:str
//! ```

use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::types::{ClassificationResult, DocumentOutcome, TopicScore};

pub const CATALOG_MAGIC: &[u8; 4] = b"DCAT";
pub const CATALOG_VERSION: u8 = 1;

const TAG_CLASSIFIED: u8 = 0;
const TAG_FAILED: u8 = 1;

/// Append-only byte buffer with the primitive writers used by the wire form.
#[derive(Debug, Default)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self { Self::default() }

    pub fn put_u8(&mut self, v: u8) { self.buf.push(v); }

    pub fn put_u32(&mut self, v: u32) { self.buf.extend_from_slice(&v.to_be_bytes()); }

    pub fn put_u64(&mut self, v: u64) { self.buf.extend_from_slice(&v.to_be_bytes()); }

    pub fn put_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| Error::codec("wire", "length", format!("{len} exceeds u32")))?;
        self.put_u32(len);
        Ok(())
    }

    pub fn put_str(&mut self, s: &str) -> Result<()> {
        self.put_len(s.len())?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub fn into_bytes(self) -> Vec<u8> { self.buf }
}

/// Cursor over a byte slice providing structured reads with error context.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
    context: &'static str,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8], context: &'static str) -> Self {
        Self { bytes, offset: 0, context }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.offset)
    }

    pub fn read_exact(&mut self, len: usize, field: &'static str) -> Result<&'a [u8]> {
        if len > self.remaining() {
            return Err(Error::codec(self.context, field, format!("need {len} bytes, {} left", self.remaining())));
        }
        let start = self.offset;
        self.offset += len;
        Ok(&self.bytes[start..start + len])
    }

    pub fn read_u8(&mut self, field: &'static str) -> Result<u8> {
        Ok(self.read_exact(1, field)?[0])
    }

    pub fn read_u32(&mut self, field: &'static str) -> Result<u32> {
        let mut out = [0u8; 4];
        out.copy_from_slice(self.read_exact(4, field)?);
        Ok(u32::from_be_bytes(out))
    }

    pub fn read_u64(&mut self, field: &'static str) -> Result<u64> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.read_exact(8, field)?);
        Ok(u64::from_be_bytes(out))
    }

    /// Reads a count that must be satisfiable by the bytes left, given a
    /// minimum encoded size per element.
    pub fn read_count(&mut self, field: &'static str, min_item_len: usize) -> Result<usize> {
        let count = self.read_u32(field)? as usize;
        if count.saturating_mul(min_item_len) > self.remaining() {
            return Err(Error::codec(self.context, field, format!("count {count} exceeds remaining input")));
        }
        Ok(count)
    }

    pub fn read_str(&mut self, field: &'static str) -> Result<String> {
        let len = self.read_u32(field)? as usize;
        let bytes = self.read_exact(len, field)?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::codec(self.context, field, e.to_string()))
    }

    pub fn finish(&self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(Error::codec(self.context, "trailing", format!("{} unexpected trailing bytes", self.remaining())));
        }
        Ok(())
    }
}

pub fn encode_catalog(catalog: &Catalog) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new();
    for b in CATALOG_MAGIC { w.put_u8(*b); }
    w.put_u8(CATALOG_VERSION);
    w.put_len(catalog.len())?;
    for (topic, keywords) in catalog.iter() {
        w.put_str(topic)?;
        w.put_len(keywords.len())?;
        for keyword in keywords { w.put_str(keyword)?; }
    }
    Ok(w.into_bytes())
}

pub fn decode_catalog(bytes: &[u8]) -> Result<Catalog> {
    let mut r = ByteReader::new(bytes, "catalog");
    if r.read_exact(4, "magic")? != CATALOG_MAGIC {
        return Err(Error::codec("catalog", "magic", "not a catalog payload"));
    }
    let version = r.read_u8("version")?;
    if version != CATALOG_VERSION {
        return Err(Error::codec("catalog", "version", format!("unsupported version {version}")));
    }
    let topic_count = r.read_count("topic_count", 8)?;
    let mut entries = Vec::with_capacity(topic_count);
    for _ in 0..topic_count {
        let topic = r.read_str("topic")?;
        let keyword_count = r.read_count("keyword_count", 4)?;
        let mut keywords = Vec::with_capacity(keyword_count);
        for _ in 0..keyword_count { keywords.push(r.read_str("keyword")?); }
        entries.push((topic, keywords));
    }
    r.finish()?;
    Catalog::from_entries(entries).map_err(|e| Error::codec("catalog", "entries", e.to_string()))
}

pub fn encode_outcome(w: &mut ByteWriter, outcome: &DocumentOutcome) -> Result<()> {
    match outcome {
        DocumentOutcome::Classified(result) => {
            w.put_u8(TAG_CLASSIFIED);
            w.put_str(&result.document_name)?;
            w.put_len(result.scores.len())?;
            for score in &result.scores {
                w.put_str(&score.topic)?;
                w.put_u64(score.count);
            }
        }
        DocumentOutcome::Failed { document_name, path, reason } => {
            w.put_u8(TAG_FAILED);
            w.put_str(document_name)?;
            w.put_str(path)?;
            w.put_str(reason)?;
        }
    }
    Ok(())
}

pub fn decode_outcome(r: &mut ByteReader<'_>) -> Result<DocumentOutcome> {
    match r.read_u8("tag")? {
        TAG_CLASSIFIED => {
            let document_name = r.read_str("document_name")?;
            let count = r.read_count("score_count", 12)?;
            let mut scores = Vec::with_capacity(count);
            for _ in 0..count {
                let topic = r.read_str("topic")?;
                scores.push(TopicScore { topic, count: r.read_u64("count")? });
            }
            Ok(DocumentOutcome::Classified(ClassificationResult { document_name, scores }))
        }
        TAG_FAILED => Ok(DocumentOutcome::Failed {
            document_name: r.read_str("document_name")?,
            path: r.read_str("path")?,
            reason: r.read_str("reason")?,
        }),
        other => Err(Error::codec("outcome", "tag", format!("unknown tag {other}"))),
    }
}

/// A worker's buffered outcomes, shipped to the manager in merge mode.
pub fn encode_outcomes(outcomes: &[DocumentOutcome]) -> Result<Vec<u8>> {
    let mut w = ByteWriter::new();
    w.put_len(outcomes.len())?;
    for outcome in outcomes { encode_outcome(&mut w, outcome)?; }
    Ok(w.into_bytes())
}

pub fn decode_outcomes(bytes: &[u8]) -> Result<Vec<DocumentOutcome>> {
    let mut r = ByteReader::new(bytes, "outcomes");
    let count = r.read_count("outcome_count", 5)?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count { out.push(decode_outcome(&mut r)?); }
    r.finish()?;
    Ok(out)
}
