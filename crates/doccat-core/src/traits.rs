use std::path::PathBuf;

use crate::error::Result;
use crate::types::DocumentOutcome;

/// Lists the documents to classify.
pub trait CorpusEnumerator: Send + Sync {
    fn list(&self) -> Result<Vec<PathBuf>>;
}

/// Records classification outcomes. Implementations are shared between
/// worker threads and must write each outcome as one indivisible record.
pub trait ResultSink: Send + Sync {
    fn record(&self, outcome: &DocumentOutcome) -> Result<()>;
    fn flush(&self) -> Result<()> { Ok(()) }
}

impl<T: ResultSink + ?Sized> ResultSink for std::sync::Arc<T> {
    fn record(&self, outcome: &DocumentOutcome) -> Result<()> { (**self).record(outcome) }
    fn flush(&self) -> Result<()> { (**self).flush() }
}

impl<T: CorpusEnumerator + ?Sized> CorpusEnumerator for Box<T> {
    fn list(&self) -> Result<Vec<PathBuf>> { (**self).list() }
}
