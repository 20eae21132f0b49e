//! Statistical building blocks for dataset analysis.
//!
//! Extractors accumulate raw observations across many batches and only turn
//! them into distributions when rendering. This crate provides the pieces
//! they share:
//!
//! - **Bucket histograms**: counts over explicit, caller-chosen bucket edges
//! - **Density grids**: 2-D histograms with optional gaussian smoothing
//! - **Descriptive statistics**: mean, median, spread of a dataset
//!
//! # Modules
//!
//! - [`histogram`]: Fixed-edge bucket histogram with an open-ended top bucket
//! - [`density`]: 2-D density grid for heat-map rendering
//! - [`descriptive`]: Descriptive statistics for summarizing datasets
//!
//! # Examples
//!
//! ## Counting values into buckets
//!
//! ```
//! use datalens_stats::histogram::BucketHistogram;
//!
//! let mut hist = BucketHistogram::uniform(0.0, 1.0, 4);
//! for v in [0.1, 0.3, 0.35, 0.9] {
//!     hist.record(v);
//! }
//! assert_eq!(hist.counts(), &[1, 2, 0, 1]);
//! ```
//!
//! ## Building a smoothed density grid
//!
//! ```
//! use datalens_stats::density::DensityGrid;
//!
//! let xs = [1.0, 2.0, 3.0];
//! let ys = [1.0, 2.0, 3.0];
//! let grid = DensityGrid::from_points(&xs, &ys, 3).smoothed(0.5);
//! assert_eq!(grid.bins(), 3);
//! ```
//!
//! ## Computing descriptive statistics
//!
//! ```
//! use datalens_stats::descriptive::DescriptiveStats;
//!
//! let stats = DescriptiveStats::new([1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```

pub mod density;
pub mod descriptive;
pub mod histogram;
