//! Result sinks and the record formats they write.
//!
//! A record is rendered completely in memory and then written with a single
//! `write_all` while the sink's lock is held, so concurrent workers sharing a
//! sink never interleave inside a record.
//!
//! A file sink opened with `truncate` empties the file on its first write or
//! flush, not when it is opened, so a run that fails before producing any
//! outcome leaves the previous results in place.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::classifier::relevant_topic;
use crate::error::{Error, Result};
use crate::traits::ResultSink;
use crate::types::DocumentOutcome;

pub const FAILED_MARKER: &str = "FAILED";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `name:\tTopic;count,\t...` one line per document.
    #[default]
    Tabbed,
    /// Block per document: the name, one `Topic,count` line per topic, a blank line.
    Csv,
    /// One JSON object per line.
    Jsonl,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "tabbed" | "txt" | "text" => Ok(OutputFormat::Tabbed),
            "csv" => Ok(OutputFormat::Csv),
            "jsonl" | "json" => Ok(OutputFormat::Jsonl),
            other => Err(Error::InvalidConfig(format!("unknown output format '{other}'"))),
        }
    }
}

fn one_line(s: &str) -> String { s.replace(['\n', '\r'], " ") }

/// Renders one complete record, trailing newline included.
pub fn format_record(outcome: &DocumentOutcome, format: OutputFormat) -> io::Result<String> {
    let record = match (format, outcome) {
        (OutputFormat::Tabbed, DocumentOutcome::Classified(r)) => {
            let mut line = format!("{}:\t", r.document_name);
            for s in &r.scores { line.push_str(&format!("{};{},\t", s.topic, s.count)); }
            line.push('\n');
            line
        }
        (OutputFormat::Tabbed, DocumentOutcome::Failed { document_name, reason, .. }) => {
            format!("{document_name}:\t{FAILED_MARKER};{}\n", one_line(reason))
        }
        (OutputFormat::Csv, DocumentOutcome::Classified(r)) => {
            let mut block = format!("{}\n", r.document_name);
            for s in &r.scores { block.push_str(&format!("{},{}\n", s.topic, s.count)); }
            block.push('\n');
            block
        }
        (OutputFormat::Csv, DocumentOutcome::Failed { document_name, reason, .. }) => {
            format!("{document_name}\n{FAILED_MARKER},{}\n\n", one_line(reason))
        }
        (OutputFormat::Jsonl, outcome) => {
            let mut value = serde_json::to_value(outcome).map_err(io::Error::other)?;
            if let (DocumentOutcome::Classified(r), Some(fields)) = (outcome, value.as_object_mut()) {
                let topic = relevant_topic(r).map(|s| s.topic.clone());
                fields.insert("relevant_topic".into(), topic.into());
            }
            let mut line = serde_json::to_string(&value).map_err(io::Error::other)?;
            line.push('\n');
            line
        }
    };
    Ok(record)
}

/// `Document: <name>, Relevant Topic: <topic>` for a classified document,
/// `none` when no keyword matched. Failed documents have no line.
pub fn relevant_topic_line(outcome: &DocumentOutcome) -> Option<String> {
    match outcome {
        DocumentOutcome::Classified(r) => {
            let topic = relevant_topic(r).map_or("none", |s| s.topic.as_str());
            Some(format!("Document: {}, Relevant Topic: {topic}", r.document_name))
        }
        DocumentOutcome::Failed { .. } => None,
    }
}

struct OpenFile {
    file: File,
    truncate_pending: bool,
}

impl OpenFile {
    fn ready(&mut self) -> io::Result<&mut File> {
        if self.truncate_pending {
            self.file.set_len(0)?;
            self.truncate_pending = false;
        }
        Ok(&mut self.file)
    }
}

/// Appends records to a file shared by every worker of the run.
pub struct AppendFileSink {
    path: PathBuf,
    format: OutputFormat,
    file: Mutex<OpenFile>,
}

impl AppendFileSink {
    /// Opens `path` for appending, creating it if needed. With `truncate` the
    /// file is emptied just before the first record or flush.
    pub fn open(path: &Path, format: OutputFormat, truncate: bool) -> Result<Self> {
        let to_sink_err = |source| Error::SinkWrite { path: path.to_path_buf(), source };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(to_sink_err)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path).map_err(to_sink_err)?;
        tracing::debug!(path = %path.display(), ?format, truncate, "result sink opened");
        Ok(Self { path: path.to_path_buf(), format, file: Mutex::new(OpenFile { file, truncate_pending: truncate }) })
    }

    pub fn path(&self) -> &Path { &self.path }

    fn with_file(&self, op: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
        let mut open = self.file.lock().map_err(|_| Error::SinkWrite {
            path: self.path.clone(),
            source: io::Error::other("sink lock poisoned"),
        })?;
        open.ready().and_then(op).map_err(|source| Error::SinkWrite { path: self.path.clone(), source })
    }
}

impl ResultSink for AppendFileSink {
    fn record(&self, outcome: &DocumentOutcome) -> Result<()> {
        let record = format_record(outcome, self.format).map_err(|source| Error::SinkWrite { path: self.path.clone(), source })?;
        self.with_file(|file| file.write_all(record.as_bytes()))
    }

    fn flush(&self) -> Result<()> {
        self.with_file(|file| file.flush())
    }
}

/// Keeps outcomes in memory, in arrival order.
#[derive(Default)]
pub struct MemorySink {
    outcomes: Mutex<Vec<DocumentOutcome>>,
}

impl MemorySink {
    pub fn new() -> Self { Self::default() }

    pub fn outcomes(&self) -> Vec<DocumentOutcome> {
        self.outcomes.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn into_outcomes(self) -> Vec<DocumentOutcome> {
        self.outcomes.into_inner().unwrap_or_default()
    }
}

impl ResultSink for MemorySink {
    fn record(&self, outcome: &DocumentOutcome) -> Result<()> {
        self.outcomes
            .lock()
            .map_err(|_| Error::SinkWrite { path: "<memory>".into(), source: io::Error::other("sink lock poisoned") })?
            .push(outcome.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ClassificationResult, TopicScore};

    fn classified() -> DocumentOutcome {
        DocumentOutcome::Classified(ClassificationResult {
            document_name: "a.txt".into(),
            scores: vec![TopicScore::new("Sports", 4), TopicScore::new("Tech", 0)],
        })
    }

    fn failed() -> DocumentOutcome {
        DocumentOutcome::Failed { document_name: "b.txt".into(), path: "/d/b.txt".into(), reason: "No such file\nor directory".into() }
    }

    #[test]
    fn tabbed_matches_classic_layout() {
        assert_eq!(format_record(&classified(), OutputFormat::Tabbed).unwrap(), "a.txt:\tSports;4,\tTech;0,\t\n");
        assert_eq!(format_record(&failed(), OutputFormat::Tabbed).unwrap(), "b.txt:\tFAILED;No such file or directory\n");
    }

    #[test]
    fn csv_is_one_block_per_document() {
        assert_eq!(format_record(&classified(), OutputFormat::Csv).unwrap(), "a.txt\nSports,4\nTech,0\n\n");
        assert_eq!(format_record(&failed(), OutputFormat::Csv).unwrap(), "b.txt\nFAILED,No such file or directory\n\n");
    }

    #[test]
    fn jsonl_is_a_single_line() {
        let line = format_record(&failed(), OutputFormat::Jsonl).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        let back: DocumentOutcome = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back, failed());
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("CSV".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert_eq!("jsonl".parse::<OutputFormat>().unwrap(), OutputFormat::Jsonl);
        assert_eq!("tabbed".parse::<OutputFormat>().unwrap(), OutputFormat::Tabbed);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn append_sink_appends_and_truncates() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out").join("results.txt");
        let sink = AppendFileSink::open(&path, OutputFormat::Tabbed, false).expect("open");
        sink.record(&classified()).unwrap();
        drop(sink);
        let sink = AppendFileSink::open(&path, OutputFormat::Tabbed, false).expect("reopen");
        sink.record(&failed()).unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);

        let sink = AppendFileSink::open(&path, OutputFormat::Tabbed, true).expect("truncate");
        sink.record(&failed()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn truncate_waits_for_the_first_write() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("results.txt");
        std::fs::write(&path, "previous run\n").unwrap();

        let sink = AppendFileSink::open(&path, OutputFormat::Tabbed, true).expect("open");
        drop(sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "previous run\n");

        let sink = AppendFileSink::open(&path, OutputFormat::Tabbed, true).expect("open");
        sink.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        sink.record(&classified()).unwrap();
        sink.record(&failed()).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }

    #[test]
    fn jsonl_carries_the_relevant_topic() {
        let line = format_record(&classified(), OutputFormat::Jsonl).unwrap();
        let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["status"], "classified");
        assert_eq!(value["relevant_topic"], "Sports");
        let back: DocumentOutcome = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(back, classified());

        let nothing = DocumentOutcome::Classified(ClassificationResult {
            document_name: "c.txt".into(),
            scores: vec![TopicScore::new("Sports", 0), TopicScore::new("Tech", 0)],
        });
        let value: serde_json::Value = serde_json::from_str(format_record(&nothing, OutputFormat::Jsonl).unwrap().trim_end()).unwrap();
        assert!(value["relevant_topic"].is_null());
    }

    #[test]
    fn relevant_topic_lines() {
        assert_eq!(relevant_topic_line(&classified()).as_deref(), Some("Document: a.txt, Relevant Topic: Sports"));
        let nothing = DocumentOutcome::Classified(ClassificationResult { document_name: "c.txt".into(), scores: vec![TopicScore::new("Tech", 0)] });
        assert_eq!(relevant_topic_line(&nothing).as_deref(), Some("Document: c.txt, Relevant Topic: none"));
        assert_eq!(relevant_topic_line(&failed()), None);
    }

    #[test]
    fn memory_sink_keeps_arrival_order() {
        let sink = MemorySink::new();
        sink.record(&classified()).unwrap();
        sink.record(&failed()).unwrap();
        let names: Vec<String> = sink.into_outcomes().iter().map(|o| o.document_name().to_string()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }
}
