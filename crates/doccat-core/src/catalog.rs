//! Topic catalog: topic name -> keywords matched against document text.
//!
//! A catalog file holds one topic per line, `Topic<SEP_TOPIC>kw1<SEP_ID>kw2...`,
//! with `@%` and `,` as the default separators.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};

pub const DEFAULT_TOPIC_SEPARATOR: &str = "@%";
pub const DEFAULT_KEYWORD_SEPARATOR: &str = ",";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separators {
    pub topic: String,
    pub keyword: String,
}

impl Default for Separators {
    fn default() -> Self {
        Self { topic: DEFAULT_TOPIC_SEPARATOR.to_string(), keyword: DEFAULT_KEYWORD_SEPARATOR.to_string() }
    }
}

impl Separators {
    pub fn new(topic: impl Into<String>, keyword: impl Into<String>) -> Result<Self> {
        let seps = Self { topic: topic.into(), keyword: keyword.into() };
        seps.validate()?;
        Ok(seps)
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic.is_empty() || self.keyword.is_empty() {
            return Err(Error::InvalidConfig("catalog separators must be non-empty".into()));
        }
        if self.topic == self.keyword {
            return Err(Error::InvalidConfig(format!("catalog separators must differ (both are '{}')", self.topic)));
        }
        Ok(())
    }
}

/// Immutable topic -> keywords mapping.
///
/// Topics iterate in name order so every unit that holds a copy reports
/// scores in the same order. Every topic has at least one non-empty keyword.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    topics: BTreeMap<String, Vec<String>>,
}

impl Catalog {
    /// Build a catalog from `(topic, keywords)` pairs, enforcing the invariants.
    pub fn from_entries<I, T, K>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (T, Vec<K>)>,
        T: Into<String>,
        K: Into<String>,
    {
        let mut topics = BTreeMap::new();
        for (index, (topic, keywords)) in entries.into_iter().enumerate() {
            let topic = topic.into();
            let keywords: Vec<String> = keywords.into_iter().map(Into::into).collect();
            check_entry(&topic, &keywords).map_err(|reason| Error::CatalogParse { line: index + 1, reason })?;
            if topics.insert(topic.clone(), keywords).is_some() {
                return Err(Error::CatalogParse { line: index + 1, reason: format!("duplicate topic '{topic}'") });
            }
        }
        Ok(Self { topics })
    }

    /// Load a catalog file. An unreadable file is `CatalogUnavailable`.
    pub fn load(path: &Path, separators: &Separators) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::CatalogUnavailable { path: path.to_path_buf(), source })?;
        let catalog = Self::parse(BufReader::new(file), separators).map_err(|e| match e {
            Error::CatalogUnavailable { source, .. } => Error::CatalogUnavailable { path: path.to_path_buf(), source },
            other => other,
        })?;
        tracing::info!(path = %path.display(), topics = catalog.len(), "catalog loaded");
        Ok(catalog)
    }

    /// Parse catalog records from any line source. Lines are split on `\n`
    /// with a trailing `\r` dropped; each must be valid UTF-8.
    pub fn parse<R: BufRead>(reader: R, separators: &Separators) -> Result<Self> {
        separators.validate()?;
        let mut topics = BTreeMap::new();
        for (index, bytes) in reader.split(b'\n').enumerate() {
            let line_no = index + 1;
            let bytes = bytes.map_err(|source| Error::CatalogUnavailable { path: "<reader>".into(), source })?;
            let line = String::from_utf8(bytes)
                .map_err(|e| Error::CatalogParse { line: line_no, reason: format!("invalid UTF-8: {}", e.utf8_error()) })?;
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if line.trim().is_empty() { continue; }
            let (topic, ids) = line.split_once(separators.topic.as_str()).ok_or_else(|| Error::CatalogParse {
                line: line_no,
                reason: format!("missing topic separator '{}'", separators.topic),
            })?;
            if ids.contains(separators.topic.as_str()) {
                return Err(Error::CatalogParse { line: line_no, reason: format!("more than one topic separator '{}'", separators.topic) });
            }
            let keywords: Vec<String> = ids.split(separators.keyword.as_str()).map(str::to_string).collect();
            check_entry(topic, &keywords).map_err(|reason| Error::CatalogParse { line: line_no, reason })?;
            if topics.insert(topic.to_string(), keywords).is_some() {
                return Err(Error::CatalogParse { line: line_no, reason: format!("duplicate topic '{topic}'") });
            }
        }
        Ok(Self { topics })
    }

    pub fn len(&self) -> usize { self.topics.len() }

    pub fn is_empty(&self) -> bool { self.topics.is_empty() }

    pub fn keywords(&self, topic: &str) -> Option<&[String]> {
        self.topics.get(topic).map(Vec::as_slice)
    }

    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// `(topic, keywords)` in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.topics.iter().map(|(t, k)| (t.as_str(), k.as_slice()))
    }
}

fn check_entry(topic: &str, keywords: &[String]) -> std::result::Result<(), String> {
    if topic.is_empty() { return Err("empty topic name".into()); }
    if keywords.is_empty() { return Err(format!("topic '{topic}' has no keywords")); }
    if keywords.iter().any(String::is_empty) { return Err(format!("topic '{topic}' has an empty keyword")); }
    Ok(())
}
