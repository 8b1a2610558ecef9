use std::thread;
use std::time::{Duration, Instant};

use doccat_core::classifier::classify_outcome;
use doccat_core::error::{Error, Result};
use doccat_core::{Catalog, CorpusEnumerator, ResultSink};

use crate::coordinator::{Coordinator, PipelineConfig};
use crate::protocol::WorkerStats;
use crate::transport::local_cluster;
use crate::worker::Worker;

/// Summary of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Units that took part, manager included.
    pub units: usize,
    pub topics: usize,
    pub documents: usize,
    pub workers: Vec<WorkerStats>,
    pub classified: usize,
    pub failed: usize,
    pub sink_errors: usize,
    pub elapsed: Duration,
}

impl RunReport {
    fn from_workers(units: usize, topics: usize, documents: usize, workers: Vec<WorkerStats>, extra_sink_errors: usize, elapsed: Duration) -> Self {
        let classified = workers.iter().map(|w| w.classified).sum();
        let failed = workers.iter().map(|w| w.failed).sum();
        let sink_errors = workers.iter().map(|w| w.sink_errors).sum::<usize>() + extra_sink_errors;
        Self { units, topics, documents, workers, classified, failed, sink_errors, elapsed }
    }
}

/// Runs the manager and `config.units - 1` workers as threads of this process.
///
/// Fails with `InsufficientWorkers` before touching the catalog when fewer
/// than two units are configured. A catalog or corpus failure aborts every
/// worker and is returned as is.
pub fn run_cluster(config: &PipelineConfig, corpus: &dyn CorpusEnumerator, sink: &dyn ResultSink) -> Result<RunReport> {
    config.check_units()?;
    let started = Instant::now();
    let mut endpoints = local_cluster(config.units).into_iter();
    let manager_ep = endpoints.next().ok_or_else(|| Error::Transport("cluster has no manager".into()))?;
    tracing::info!(units = config.units, catalog = %config.catalog_path.display(), mode = ?config.sink_mode, "starting run");

    let (manager_result, worker_results) = thread::scope(|s| {
        let mut handles = Vec::with_capacity(config.units - 1);
        for ep in endpoints {
            let rank = ep.rank();
            let worker = Worker::new(ep, sink, config.sink_mode);
            let handle = thread::Builder::new()
                .name(format!("doccat-worker-{rank}"))
                .spawn_scoped(s, move || worker.run())
                .map_err(|e| Error::Transport(format!("failed to spawn worker {rank}: {e}")));
            handles.push((rank, handle));
        }
        let coordinator = Coordinator::new(manager_ep, config, corpus, sink);
        let manager = thread::Builder::new()
            .name("doccat-manager".to_string())
            .spawn_scoped(s, move || coordinator.run())
            .map_err(|e| Error::Transport(format!("failed to spawn manager: {e}")));
        let manager_result = match manager {
            Ok(h) => h.join().unwrap_or_else(|_| Err(Error::Transport("manager panicked".into()))),
            Err(e) => Err(e),
        };
        let worker_results: Vec<(usize, Result<WorkerStats>)> = handles
            .into_iter()
            .map(|(rank, handle)| {
                let result = match handle {
                    Ok(h) => h.join().unwrap_or_else(|_| Err(Error::Transport(format!("worker {rank} panicked")))),
                    Err(e) => Err(e),
                };
                (rank, result)
            })
            .collect();
        (manager_result, worker_results)
    });

    let manager_report = manager_result?;
    for (rank, result) in worker_results {
        if let Err(e) = result {
            tracing::error!(rank, error = %e, "worker failed");
            return Err(e);
        }
    }
    let report = RunReport::from_workers(
        config.units,
        manager_report.topics,
        manager_report.documents,
        manager_report.workers,
        manager_report.merge_sink_errors,
        started.elapsed(),
    );
    tracing::info!(documents = report.documents, classified = report.classified, failed = report.failed, elapsed_ms = report.elapsed.as_millis() as u64, "run finished");
    Ok(report)
}

/// Single-process variant: one unit loads the catalog and classifies every
/// document in enumeration order.
pub fn run_sequential(config: &PipelineConfig, corpus: &dyn CorpusEnumerator, sink: &dyn ResultSink) -> Result<RunReport> {
    let started = Instant::now();
    let catalog = Catalog::load(&config.catalog_path, &config.separators)?;
    let documents = corpus.list()?;
    let mut stats = WorkerStats { rank: 0, assigned: documents.len(), ..Default::default() };
    for path in &documents {
        let outcome = classify_outcome(&catalog, path);
        if outcome.is_classified() { stats.classified += 1 } else { stats.failed += 1 }
        if let Err(e) = sink.record(&outcome) {
            tracing::error!(document = outcome.document_name(), error = %e, "result not written");
            stats.sink_errors += 1;
        }
    }
    if let Err(e) = sink.flush() {
        tracing::error!(error = %e, "flushing results failed");
        stats.sink_errors += 1;
    }
    Ok(RunReport::from_workers(1, catalog.len(), documents.len(), vec![stats], 0, started.elapsed()))
}
