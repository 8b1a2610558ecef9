//! Manager role: loads and distributes the catalog, partitions the corpus and
//! collects the workers' reports. It never classifies a document itself.

use std::path::PathBuf;
use std::time::Instant;

use doccat_core::config::SinkMode;
use doccat_core::error::{Error, Result};
use doccat_core::partition::partition;
use doccat_core::types::WorkAssignment;
use doccat_core::{Catalog, CorpusEnumerator, ResultSink, Separators};

use crate::protocol::{self, WorkerStats};
use crate::transport::Endpoint;

/// Fewest units a run can have: the manager plus one worker.
pub const MIN_UNITS: usize = 2;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Total units including the manager.
    pub units: usize,
    pub catalog_path: PathBuf,
    pub separators: Separators,
    pub sink_mode: SinkMode,
}

impl PipelineConfig {
    pub fn new(workers: usize, catalog_path: impl Into<PathBuf>) -> Self {
        Self { units: workers + 1, catalog_path: catalog_path.into(), separators: Separators::default(), sink_mode: SinkMode::Append }
    }

    pub fn with_separators(mut self, separators: Separators) -> Self {
        self.separators = separators;
        self
    }

    pub fn with_sink_mode(mut self, sink_mode: SinkMode) -> Self {
        self.sink_mode = sink_mode;
        self
    }

    pub fn workers(&self) -> usize { self.units.saturating_sub(1) }

    pub fn check_units(&self) -> Result<()> {
        if self.units < MIN_UNITS {
            return Err(Error::InsufficientWorkers { units: self.units, required: MIN_UNITS });
        }
        Ok(())
    }
}

/// What the manager learned during a run.
#[derive(Debug, Clone, Default)]
pub struct ManagerReport {
    pub topics: usize,
    pub catalog_bytes: usize,
    pub documents: usize,
    pub workers: Vec<WorkerStats>,
    /// Records the manager itself failed to write (merge mode).
    pub merge_sink_errors: usize,
}

pub struct Coordinator<'a> {
    endpoint: Endpoint,
    config: &'a PipelineConfig,
    corpus: &'a dyn CorpusEnumerator,
    sink: &'a dyn ResultSink,
}

impl<'a> Coordinator<'a> {
    pub fn new(endpoint: Endpoint, config: &'a PipelineConfig, corpus: &'a dyn CorpusEnumerator, sink: &'a dyn ResultSink) -> Self {
        Self { endpoint, config, corpus, sink }
    }

    /// Runs the manager side of the protocol. On a fatal error every worker
    /// is told to abort before the error is returned.
    pub fn run(self) -> Result<ManagerReport> {
        let result = self.run_inner();
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!(error = %e, "run aborted");
                self.endpoint.abort_all(&e.to_string());
            }
        }
        result
    }

    fn run_inner(&self) -> Result<ManagerReport> {
        let ep = &self.endpoint;
        self.config.check_units()?;
        let workers = ep.size() - 1;

        let catalog = Catalog::load(&self.config.catalog_path, &self.config.separators)?;
        let catalog_bytes = protocol::broadcast_catalog(ep, &catalog)?;
        tracing::info!(topics = catalog.len(), bytes = catalog_bytes, workers, "catalog broadcast");
        ep.barrier();

        let started = Instant::now();
        let documents = self.corpus.list()?;
        let assignments: Vec<WorkAssignment> = partition(&documents, workers)?;
        for (index, assignment) in assignments.iter().enumerate() {
            let rank = index + 1;
            tracing::debug!(rank, documents = assignment.len(), "sending assignment");
            protocol::send_assignment(ep, rank, assignment)?;
        }
        tracing::info!(documents = documents.len(), elapsed_ms = started.elapsed().as_millis() as u64, "work distributed");

        ep.barrier();
        let mut report = ManagerReport { topics: catalog.len(), catalog_bytes, documents: documents.len(), ..Default::default() };
        for rank in 1..=workers {
            let stats = protocol::receive_stats(ep, rank)?;
            if self.config.sink_mode == SinkMode::Merge {
                for outcome in protocol::receive_outcomes(ep, rank)? {
                    if let Err(e) = self.sink.record(&outcome) {
                        tracing::error!(rank, document = outcome.document_name(), error = %e, "result not written");
                        report.merge_sink_errors += 1;
                    }
                }
            }
            report.workers.push(stats);
        }
        if self.config.sink_mode == SinkMode::Merge {
            if let Err(e) = self.sink.flush() {
                tracing::error!(error = %e, "flushing merged results failed");
                report.merge_sink_errors += 1;
            }
        }
        Ok(report)
    }
}
