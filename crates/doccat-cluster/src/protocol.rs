//! Manager/worker message sequences built on the transport.
//!
//! ```text
//! manager                               worker k
//!   catalog length, catalog bytes  ──►  (broadcast)
//!   ────────────── barrier ──────────────
//!   assignment count               ──►
//!   { path length, path bytes }    ──►  classify each as it arrives
//!   ────────────── barrier ──────────────
//!                                  ◄──  stats length, stats bytes
//!                                  ◄──  outcomes length, outcomes bytes (merge mode)
//! ```

use std::path::Path;

use doccat_core::codec::{self, ByteReader, ByteWriter};
use doccat_core::error::{Error, Result};
use doccat_core::types::DocumentRef;
use doccat_core::{Catalog, DocumentOutcome};

use crate::transport::{Endpoint, Rank, MANAGER};

pub fn broadcast_catalog(endpoint: &Endpoint, catalog: &Catalog) -> Result<usize> {
    let bytes = codec::encode_catalog(catalog)?;
    endpoint.broadcast_sized(MANAGER, Some(&bytes))?;
    Ok(bytes.len())
}

pub fn receive_catalog(endpoint: &Endpoint) -> Result<Catalog> {
    let bytes = endpoint.broadcast_sized(MANAGER, None)?;
    codec::decode_catalog(&bytes)
}

/// Sends the assignment count, then every path as its own sized message.
pub fn send_assignment(endpoint: &Endpoint, to: Rank, documents: &[DocumentRef]) -> Result<()> {
    endpoint.send_size(to, documents.len())?;
    for doc in documents { endpoint.send_sized(to, &path_to_bytes(doc))?; }
    Ok(())
}

pub fn receive_assignment_count(endpoint: &Endpoint) -> Result<usize> {
    endpoint.recv_size(MANAGER)
}

pub fn receive_document(endpoint: &Endpoint) -> Result<DocumentRef> {
    let bytes = endpoint.recv_sized(MANAGER)?;
    path_from_bytes(bytes)
}

#[cfg(unix)]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
fn path_to_bytes(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

#[cfg(unix)]
fn path_from_bytes(bytes: Vec<u8>) -> Result<DocumentRef> {
    use std::os::unix::ffi::OsStringExt;
    Ok(DocumentRef::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn path_from_bytes(bytes: Vec<u8>) -> Result<DocumentRef> {
    String::from_utf8(bytes).map(DocumentRef::from).map_err(|e| Error::Codec { context: "path", field: "bytes", reason: e.to_string() })
}

/// Counters a worker reports to the manager once its assignment is done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub rank: Rank,
    pub assigned: usize,
    pub classified: usize,
    pub failed: usize,
    pub sink_errors: usize,
}

impl WorkerStats {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        for v in [self.rank, self.assigned, self.classified, self.failed, self.sink_errors] { w.put_u64(v as u64); }
        Ok(w.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(bytes, "worker stats");
        let mut next = |field: &'static str| -> Result<usize> {
            let v = r.read_u64(field)?;
            usize::try_from(v).map_err(|_| Error::Codec { context: "worker stats", field, reason: format!("{v} overflows usize") })
        };
        let stats = Self { rank: next("rank")?, assigned: next("assigned")?, classified: next("classified")?, failed: next("failed")?, sink_errors: next("sink_errors")? };
        r.finish()?;
        Ok(stats)
    }
}

pub fn send_stats(endpoint: &Endpoint, stats: &WorkerStats) -> Result<()> {
    endpoint.send_sized(MANAGER, &stats.encode()?)
}

pub fn receive_stats(endpoint: &Endpoint, from: Rank) -> Result<WorkerStats> {
    let stats = WorkerStats::decode(&endpoint.recv_sized(from)?)?;
    if stats.rank != from {
        return Err(Error::Transport(format!("unit {from} reported stats for unit {}", stats.rank)));
    }
    Ok(stats)
}

pub fn send_outcomes(endpoint: &Endpoint, outcomes: &[DocumentOutcome]) -> Result<()> {
    endpoint.send_sized(MANAGER, &codec::encode_outcomes(outcomes)?)
}

pub fn receive_outcomes(endpoint: &Endpoint, from: Rank) -> Result<Vec<DocumentOutcome>> {
    codec::decode_outcomes(&endpoint.recv_sized(from)?)
}
