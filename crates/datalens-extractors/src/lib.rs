//! Stateful feature extractors for dataset analysis.
//!
//! A feature extractor sees every batch of one data split and keeps a private
//! running aggregate (histogram, coordinate lists, counts). Once the stream
//! is exhausted it renders that aggregate onto an [`Axes`].
//!
//! # Extractor Lifecycle
//!
//! 1. **Build** - [`registry::ExtractorRegistry`] instantiates extractors from
//!    configuration entries
//! 2. **Execute** - [`FeatureExtractor::execute()`] is called once per batch;
//!    calls accumulate (the same batch executed twice is counted twice)
//! 3. **Process** - [`FeatureExtractor::process()`] normalizes the aggregate
//!    and draws it
//!
//! # Available Extractors
//!
//! **Common** - apply to any task:
//! - [`common::ImagesAverageBrightness`] - Distribution of per-image mean intensity
//!
//! **Semantic segmentation**:
//! - [`segmentation::CountSmallObjects`] - Object size distribution as fraction of the image
//! - [`segmentation::ObjectsCenterOfMass`] - Heat-map of object centroids
//! - [`segmentation::AppearancesInImages`] - Share of images containing each class
//!
//! # Concurrency
//!
//! Extractors are `Send` but not required to be `Sync`: the orchestrator
//! hands each one to at most one worker at a time, and only the batch is
//! shared between workers.

use std::fmt;

use datalens_batch::BatchData;
use datalens_plot::{Axes, AxisLayout, Color};

pub mod common;
pub mod registry;
pub mod segmentation;

/// Which data split an extractor instance accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Train,
    Validation,
}

impl Side {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Side::Train => "train",
            Side::Validation => "val",
        }
    }

    #[must_use]
    pub fn is_train(self) -> bool {
        matches!(self, Side::Train)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ExtractorError {
    #[display("{extractor}: batch contains class {class_id}, which is not configured")]
    UnexpectedClass {
        extractor: &'static str,
        class_id: u8,
    },
    #[display("{extractor}: {message}")]
    Failed { extractor: String, message: String },
    #[display("{extractor} panicked: {message}")]
    Panicked { extractor: String, message: String },
}

impl ExtractorError {
    pub fn failed(extractor: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            extractor: extractor.into(),
            message: message.into(),
        }
    }
}

pub trait FeatureExtractor: fmt::Debug + Send {
    /// Stable type name, used as the figure key stem.
    fn type_name(&self) -> &'static str;

    /// Whether train and validation share one axes or get one each.
    fn layout(&self) -> AxisLayout {
        AxisLayout::Single
    }

    /// Series color for the given split.
    fn color(&self, side: Side) -> Color {
        match side {
            Side::Train => Color::BLUE,
            Side::Validation => Color::ORANGE,
        }
    }

    /// Folds one batch into the running aggregate.
    fn execute(&mut self, batch: &BatchData) -> Result<(), ExtractorError>;

    /// Draws the aggregate. Must not panic on an empty aggregate.
    fn process(&self, axes: &mut Axes, side: Side);
}

pub type BoxedFeatureExtractor = Box<dyn FeatureExtractor>;

/// Formats a number with at most `decimals` decimals and no trailing zeros.
pub(crate) fn format_trimmed(value: f64, decimals: usize) -> String {
    let s = format!("{value:.decimals$}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s
    }
}
