//! Domain types shared by the classifier, the sinks and the cluster roles.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub type DocumentRef = PathBuf;

/// Ordered slice of the corpus routed to one worker.
pub type WorkAssignment = Vec<DocumentRef>;

/// A topic paired with its occurrence count for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScore {
    pub topic: String,
    pub count: u64,
}

impl TopicScore {
    pub fn new(topic: impl Into<String>, count: u64) -> Self {
        Self { topic: topic.into(), count }
    }
}

/// Scores of one document against every topic of the catalog.
///
/// `scores` always has one entry per catalog topic, in catalog order,
/// including topics with a zero count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub document_name: String,
    pub scores: Vec<TopicScore>,
}

impl ClassificationResult {
    pub fn count_for(&self, topic: &str) -> Option<u64> {
        self.scores.iter().find(|s| s.topic == topic).map(|s| s.count)
    }
}

/// What happened to one assigned document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentOutcome {
    Classified(ClassificationResult),
    Failed { document_name: String, path: String, reason: String },
}

impl DocumentOutcome {
    pub fn document_name(&self) -> &str {
        match self {
            DocumentOutcome::Classified(r) => &r.document_name,
            DocumentOutcome::Failed { document_name, .. } => document_name,
        }
    }

    pub fn is_classified(&self) -> bool {
        matches!(self, DocumentOutcome::Classified(_))
    }
}

/// Base name of a document path, as reported in the output.
pub fn document_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| path.to_string_lossy().to_string())
}
