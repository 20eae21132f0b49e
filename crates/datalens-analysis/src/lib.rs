//! Batch analysis orchestration.
//!
//! This crate drives a set of [feature extractors](datalens_extractors) over
//! two streamed data splits and turns their accumulated statistics into
//! figures.
//!
//! # Lifecycle
//!
//! ```text
//! build ──► execute ──► post_process ──► close
//!             │
//!             └─ per cycle: fetch train, fetch val, dispatch, barrier
//! ```
//!
//! 1. **Build** - the configuration is resolved twice, yielding independent
//!    train and validation extractor lists
//! 2. **Execute** - batches are pulled until the train source is exhausted;
//!    each cycle fans one batch per split out to that split's extractors and
//!    waits for all of them
//! 3. **Post-process** - every (train, val) extractor pair renders onto one
//!    [`Figure`](datalens_plot::Figure), logged as `<TypeName>/fig`
//! 4. **Close** - the figure sink is released
//!
//! See [`manager::AnalysisManager`] for the state machine and
//! [`dispatch`] for how a cycle is executed.

use std::io;

use datalens_batch::preprocess::ValidationError;
use datalens_extractors::{ExtractorError, Side, registry::ConfigError};
use datalens_plot::sink::SinkError;

use crate::manager::Stage;

pub mod config;
pub mod dispatch;
pub mod manager;

/// Failure reported by a batch source.
#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum SourceError {
    #[display("I/O error while reading batches: {_0}")]
    #[from]
    Io(io::Error),
    #[display("failed to decode batch: {_0}")]
    #[from]
    Decode(serde_json::Error),
    #[display("{message}")]
    Other { message: String },
}

impl SourceError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum AnalysisError {
    #[display("{_0}")]
    #[from]
    Config(ConfigError),
    #[display("configuration has no extractor list for task '{task}'")]
    MissingTaskSection { task: String },
    #[display("unsupported task '{task}'")]
    UnsupportedTask { task: String },
    #[display("failed to build worker pool: {_0}")]
    #[from]
    ThreadPool(rayon::ThreadPoolBuildError),
    #[display("{side} source failed at batch {batch}: {source}")]
    Source {
        side: Side,
        batch: usize,
        source: SourceError,
    },
    #[display("invalid {side} batch {batch}: {source}")]
    Validation {
        side: Side,
        batch: usize,
        source: ValidationError,
    },
    #[display("{side} extractor failed at batch {batch}: {source}")]
    Extractor {
        side: Side,
        batch: usize,
        source: ExtractorError,
    },
    #[display("{_0}")]
    #[from]
    Sink(SinkError),
    #[display("cannot {operation} while {stage}")]
    InvalidStage { operation: &'static str, stage: Stage },
}
