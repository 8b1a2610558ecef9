//! doccat-cluster
//!
//! Distributed classification: a manager unit loads the catalog, broadcasts
//! it, partitions the corpus and ships each worker its share of document
//! paths; workers classify their documents and hand outcomes to the result
//! sink. Units are threads talking only through `transport`.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod coordinator;
pub mod protocol;
pub mod runner;
pub mod transport;
pub mod worker;

pub use coordinator::{Coordinator, ManagerReport, PipelineConfig, MIN_UNITS};
pub use protocol::WorkerStats;
pub use runner::{run_cluster, run_sequential, RunReport};
pub use worker::Worker;
