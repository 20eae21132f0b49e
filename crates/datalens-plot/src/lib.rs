//! Render surfaces and figure sinks.
//!
//! Feature extractors do not draw pixels. They describe a chart on an
//! [`Axes`]: title, labels, bar or heat-map series. A [`Figure`] groups one or
//! two axes, and a [`FigureSink`](sink::FigureSink) persists finished figures
//! under a string key.
//!
//! Styling calls overwrite earlier ones, so when two extractors draw on the
//! same axes the last caller decides the visible title and labels.
//!
//! ```
//! use datalens_plot::{AxisLayout, BarSeries, Color, Figure};
//!
//! let mut figure = Figure::new(AxisLayout::Single);
//! let axes = figure.axes_mut(0);
//! axes.set_title("validation");
//! axes.set_title("train");
//! axes.bar(BarSeries {
//!     label: "train".into(),
//!     categories: vec!["a".into(), "b".into()],
//!     values: vec![0.25, 0.75],
//!     color: Color::BLUE,
//! });
//! figure.tight_layout();
//! assert_eq!(figure.axes()[0].title(), Some("train"));
//! ```

pub use self::figure::*;

mod figure;
pub mod sink;
