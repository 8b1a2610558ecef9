//! doccat-core
//!
//! Catalog, classifier, partitioner, corpus enumeration and result sinks for
//! keyword-based document classification. The distributed manager/worker
//! pipeline lives in `doccat-cluster`.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod catalog;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod corpus;
pub mod error;
pub mod partition;
pub mod sink;
pub mod traits;
pub mod types;

pub use catalog::{Catalog, Separators};
pub use error::{Error, Result};
pub use traits::{CorpusEnumerator, ResultSink};
pub use types::{ClassificationResult, DocumentOutcome, TopicScore};
