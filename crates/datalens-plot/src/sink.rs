//! Destinations for finished figures.
//!
//! - [`JsonDirSink`]: writes each figure as a JSON document under a directory,
//!   plus an `index.json` on close
//! - [`MemorySink`]: keeps figures in memory behind a shared handle

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write as _},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::figure::Figure;

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum SinkError {
    #[display("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("failed to encode figure '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[display("invalid figure key '{key}'")]
    InvalidKey { key: String },
    #[display("sink is already closed")]
    Closed,
}

/// Receives finished figures.
pub trait FigureSink: fmt::Debug + Send {
    /// Persists `figure` under `key`.
    fn log_graph(&mut self, key: &str, figure: Figure) -> Result<(), SinkError>;

    /// Flushes and releases resources. No figure may be logged afterwards.
    fn close(&mut self) -> Result<(), SinkError>;
}

pub type BoxedFigureSink = Box<dyn FigureSink>;

#[derive(Debug, Clone, Serialize)]
struct IndexEntry {
    key: String,
    path: PathBuf,
    logged_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct Index<'a> {
    opened_at: DateTime<Utc>,
    closed_at: DateTime<Utc>,
    figures: &'a [IndexEntry],
}

/// Writes figures as pretty-printed JSON files.
///
/// A key `A/b` is stored at `<root>/A/b.json`. Key segments must be
/// non-empty and must not be `.` or `..`.
#[derive(Debug)]
pub struct JsonDirSink {
    root: PathBuf,
    opened_at: DateTime<Utc>,
    entries: Vec<IndexEntry>,
    closed: bool,
}

impl JsonDirSink {
    pub const INDEX_FILE: &'static str = "index.json";

    /// Creates the output directory if needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| SinkError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            opened_at: Utc::now(),
            entries: vec![],
            closed: false,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, SinkError> {
        let segments = key.split('/').collect::<Vec<_>>();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == ".." || s.contains('\\'))
        {
            return Err(SinkError::InvalidKey { key: key.to_owned() });
        }
        let mut path = self.root.clone();
        path.extend(&segments);
        path.set_extension("json");
        Ok(path)
    }

    fn write_json<T>(path: &Path, value: &T, key: &str) -> Result<(), SinkError>
    where
        T: Serialize + ?Sized,
    {
        let io_err = |source: io::Error| SinkError::Io {
            path: path.to_owned(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| SinkError::Encode {
            key: key.to_owned(),
            source,
        })?;
        writeln!(writer).map_err(io_err)?;
        writer.flush().map_err(io_err)
    }
}

impl FigureSink for JsonDirSink {
    fn log_graph(&mut self, key: &str, figure: Figure) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        let path = self.path_for(key)?;
        Self::write_json(&path, &figure, key)?;
        tracing::debug!(key, path = %path.display(), "figure written");
        self.entries.push(IndexEntry {
            key: key.to_owned(),
            path,
            logged_at: Utc::now(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        if self.closed {
            return Err(SinkError::Closed);
        }
        self.closed = true;
        let index = Index {
            opened_at: self.opened_at,
            closed_at: Utc::now(),
            figures: &self.entries,
        };
        let path = self.root.join(Self::INDEX_FILE);
        Self::write_json(&path, &index, Self::INDEX_FILE)?;
        tracing::info!(
            figures = self.entries.len(),
            index = %path.display(),
            "figure sink closed"
        );
        Ok(())
    }
}

/// Figures and lifecycle calls recorded by a [`MemorySink`].
#[derive(Debug, Default, Clone)]
pub struct MemoryRecords {
    pub figures: Vec<(String, Figure)>,
    pub close_calls: usize,
}

/// Keeps logged figures in memory.
///
/// Cloning a `MemorySink` yields another handle to the same records, so a
/// caller can hand one handle to an orchestrator and inspect the other.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    records: Arc<Mutex<MemoryRecords>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of everything recorded so far.
    #[must_use]
    pub fn records(&self) -> MemoryRecords {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryRecords> {
        // records stay consistent even if a holder panicked
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FigureSink for MemorySink {
    fn log_graph(&mut self, key: &str, figure: Figure) -> Result<(), SinkError> {
        let mut records = self.lock();
        if records.close_calls > 0 {
            return Err(SinkError::Closed);
        }
        records.figures.push((key.to_owned(), figure));
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        let mut records = self.lock();
        records.close_calls += 1;
        if records.close_calls > 1 {
            return Err(SinkError::Closed);
        }
        Ok(())
    }
}
