use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::traits::CorpusEnumerator;

pub const DEFAULT_EXTENSIONS: [&str; 3] = [".txt", ".html", ".tex"];

/// Regular files directly inside `root` whose extension is in the set.
///
/// Not recursive. Paths come back in filesystem enumeration order, which is
/// not guaranteed to be sorted.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
    extensions: BTreeSet<String>,
}

impl DirectoryCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect() }
    }

    /// Extensions are matched with their leading dot, e.g. `.txt`. A missing
    /// dot is added.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| { let e = e.as_ref(); if e.starts_with('.') { e.to_string() } else { format!(".{e}") } })
            .collect();
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| self.extensions.contains(&format!(".{ext}")))
    }
}

impl CorpusEnumerator for DirectoryCorpus {
    fn list(&self) -> Result<Vec<PathBuf>> {
        let meta = std::fs::metadata(&self.root).map_err(|source| Error::CorpusUnavailable { path: self.root.clone(), source })?;
        if !meta.is_dir() {
            return Err(Error::CorpusUnavailable {
                path: self.root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
            });
        }
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => { tracing::warn!(root = %self.root.display(), error = %e, "skipping unreadable entry"); continue; }
            };
            if entry.file_type().is_file() && self.accepts(entry.path()) { files.push(entry.into_path()); }
        }
        tracing::debug!(root = %self.root.display(), documents = files.len(), "corpus enumerated");
        Ok(files)
    }
}

/// A fixed list of documents, for callers that already know the corpus.
#[derive(Debug, Clone, Default)]
pub struct StaticCorpus(pub Vec<PathBuf>);

impl CorpusEnumerator for StaticCorpus {
    fn list(&self) -> Result<Vec<PathBuf>> { Ok(self.0.clone()) }
}
