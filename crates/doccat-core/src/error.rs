use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Catalog unavailable at '{path}': {source}")]
    CatalogUnavailable { path: PathBuf, source: std::io::Error },

    #[error("Catalog line {line} is malformed: {reason}")]
    CatalogParse { line: usize, reason: String },

    #[error("Insufficient workers: {units} unit(s) available, at least {required} required (1 manager + 1 worker)")]
    InsufficientWorkers { units: usize, required: usize },

    #[error("Document unavailable at '{path}': {source}")]
    DocumentUnavailable { path: PathBuf, source: std::io::Error },

    #[error("Failed to write results to '{path}': {source}")]
    SinkWrite { path: PathBuf, source: std::io::Error },

    #[error("Corpus directory unavailable at '{path}': {source}")]
    CorpusUnavailable { path: PathBuf, source: std::io::Error },

    #[error("Failed to decode {context} ({field}): {reason}")]
    Codec { context: &'static str, field: &'static str, reason: String },

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Run aborted by manager: {0}")]
    Aborted(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Errors that end the whole run, as opposed to a single document.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::DocumentUnavailable { .. } | Error::SinkWrite { .. })
    }

    pub(crate) fn codec(context: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        Error::Codec { context, field, reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
