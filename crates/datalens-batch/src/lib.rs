//! Batch representations for dataset analysis.
//!
//! Data flows through this crate in two forms:
//!
//! - [`RawBatch`]: what a user-supplied data source yields: a list of
//!   images and a list of label masks, not yet checked for consistency
//! - [`BatchData`]: the canonical, validated form shared read-only by every
//!   feature extractor for one loop cycle, including derived per-class
//!   object lists
//!
//! The [`preprocess`] module converts between the two.
//!
//! # Example
//!
//! ```
//! use datalens_batch::{
//!     Image, LabelMask, RawBatch,
//!     preprocess::{BatchPreprocessor, SegmentationPreprocessor},
//! };
//!
//! let raw = RawBatch {
//!     images: vec![Image::filled(1, 2, 3, 0.5)],
//!     labels: vec![LabelMask::from_rows(&[vec![0, 1, 1], vec![0, 0, 0]])],
//! };
//! let preprocessor = SegmentationPreprocessor::new(2, vec![]);
//! let batch = preprocessor.process(raw)?;
//! assert_eq!(batch.len(), 1);
//! assert_eq!(batch.layers()[0][1].contours().len(), 1);
//! # Ok::<(), datalens_batch::preprocess::ValidationError>(())
//! ```

pub use self::{batch::*, contour::*, image::*};

mod batch;
mod contour;
mod image;
pub mod preprocess;
