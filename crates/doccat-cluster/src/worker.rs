use doccat_core::classifier::classify_outcome;
use doccat_core::config::SinkMode;
use doccat_core::error::Result;
use doccat_core::{DocumentOutcome, ResultSink};

use crate::protocol::{self, WorkerStats};
use crate::transport::Endpoint;

/// Worker role: receives the catalog and an assignment, classifies each
/// document in the order it arrives.
pub struct Worker<'a> {
    endpoint: Endpoint,
    sink: &'a dyn ResultSink,
    mode: SinkMode,
}

impl<'a> Worker<'a> {
    pub fn new(endpoint: Endpoint, sink: &'a dyn ResultSink, mode: SinkMode) -> Self {
        Self { endpoint, sink, mode }
    }

    pub fn run(self) -> Result<WorkerStats> {
        let ep = &self.endpoint;
        let rank = ep.rank();

        let catalog = protocol::receive_catalog(ep)?;
        tracing::debug!(rank, topics = catalog.len(), "catalog received");
        ep.barrier();

        let assigned = protocol::receive_assignment_count(ep)?;
        let mut stats = WorkerStats { rank, assigned, ..Default::default() };
        let mut buffered: Vec<DocumentOutcome> = Vec::new();
        for _ in 0..assigned {
            let path = protocol::receive_document(ep)?;
            let outcome = classify_outcome(&catalog, &path);
            if outcome.is_classified() { stats.classified += 1 } else { stats.failed += 1 }
            match self.mode {
                SinkMode::Append => {
                    if let Err(e) = self.sink.record(&outcome) {
                        tracing::error!(rank, document = outcome.document_name(), error = %e, "result not written");
                        stats.sink_errors += 1;
                    }
                }
                SinkMode::Merge => buffered.push(outcome),
            }
        }
        if self.mode == SinkMode::Append {
            if let Err(e) = self.sink.flush() {
                tracing::error!(rank, error = %e, "flushing results failed");
                stats.sink_errors += 1;
            }
        }
        tracing::info!(rank, assigned, classified = stats.classified, failed = stats.failed, "assignment done");

        ep.barrier();
        protocol::send_stats(ep, &stats)?;
        if self.mode == SinkMode::Merge { protocol::send_outcomes(ep, &buffered)?; }
        Ok(stats)
    }
}
