use datalens_batch::BatchData;
use datalens_plot::{Axes, BarSeries, GridAxis};
use datalens_stats::histogram::BucketHistogram;

use crate::{ExtractorError, FeatureExtractor, Side, format_trimmed};

/// Object size distribution, as a fraction of a reference image.
///
/// # Buckets
///
/// With threshold `T` (percent of an image) there are eleven edges
/// `E_k = k · (T / 100) / 10` for `k = 0..=10`. An object whose area
/// fraction `a` satisfies `E_k ≤ a < E_{k+1}` lands in bucket `k`; objects at
/// or above `E_10` share the last bucket. Area fractions are measured
/// against [`REFERENCE_AREA`](Self::REFERENCE_AREA) regardless of the actual
/// image size, so the buckets stay comparable across datasets.
///
/// Regions of the background class `0` are not counted. The preprocessor
/// still detects them as contours, but only objects of classes `1..` reach
/// the histogram.
#[derive(Debug, Clone)]
pub struct CountSmallObjects {
    percent_of_an_image: f64,
    hist: BucketHistogram,
}

impl CountSmallObjects {
    /// Area of a 512×512 image.
    pub const REFERENCE_AREA: f64 = 512.0 * 512.0;
    pub const NUM_BUCKETS: usize = 11;
    pub const DEFAULT_PERCENT: f64 = 10.0;

    /// # Panics
    ///
    /// Panics unless `0 < percent_of_an_image <= 100`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn new(percent_of_an_image: f64) -> Self {
        assert!(
            Self::is_valid_percent(percent_of_an_image),
            "percent_of_an_image must be in (0, 100]"
        );
        let top = percent_of_an_image / 100.0;
        let edges = (0..Self::NUM_BUCKETS)
            .map(|k| top * k as f64 / 10.0)
            .collect();
        Self {
            percent_of_an_image,
            hist: BucketHistogram::with_edges(edges),
        }
    }

    #[must_use]
    pub fn is_valid_percent(percent: f64) -> bool {
        percent > 0.0 && percent <= 100.0
    }

    #[must_use]
    pub fn percent_of_an_image(&self) -> f64 {
        self.percent_of_an_image
    }

    /// Bucket edges as fractions of the reference area.
    #[must_use]
    pub fn edges(&self) -> &[f64] {
        self.hist.edges()
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        self.hist.counts()
    }

    /// Records one object of `area` pixels.
    #[expect(clippy::cast_precision_loss)]
    pub fn record_area(&mut self, area: usize) {
        self.hist.record(area as f64 / Self::REFERENCE_AREA);
    }

    /// Bucket labels in percent of the image, e.g. `0-1%`, `>10%`.
    #[must_use]
    pub fn bucket_labels(&self) -> Vec<String> {
        let edges = self.hist.edges();
        let pct = |e: f64| format_trimmed(e * 100.0, 3);
        edges
            .iter()
            .enumerate()
            .map(|(k, &start)| match edges.get(k + 1) {
                Some(&end) => format!("{}-{}%", pct(start), pct(end)),
                None => format!(">{}%", pct(start)),
            })
            .collect()
    }
}

impl Default for CountSmallObjects {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERCENT)
    }
}

impl FeatureExtractor for CountSmallObjects {
    fn type_name(&self) -> &'static str {
        "CountSmallObjects"
    }

    fn execute(&mut self, batch: &BatchData) -> Result<(), ExtractorError> {
        for (_, class_id, contour) in batch.contours() {
            if class_id == 0 {
                continue;
            }
            self.record_area(contour.area());
        }
        Ok(())
    }

    fn process(&self, axes: &mut Axes, side: Side) {
        axes.bar(BarSeries {
            label: side.label().to_owned(),
            categories: self.bucket_labels(),
            values: self.hist.fractions(),
            color: self.color(side),
        });
        axes.set_title("Number of small objects");
        axes.set_x_label("Object Size [% of image]");
        axes.set_y_label("Fraction of objects");
        axes.set_ticks_rotation(0.0);
        axes.set_grid(GridAxis::Y);
        axes.show_legend();
    }
}

#[cfg(test)]
mod tests {
    use datalens_plot::Series;

    use super::*;
    use crate::test_util::batch_from_masks;

    fn bar_values(axes: &Axes) -> Vec<f64> {
        match &axes.series()[0] {
            Series::Bar(bar) => bar.values.clone(),
            Series::Heatmap(_) => panic!("expected a bar series"),
        }
    }

    #[test]
    fn test_edges_from_threshold() {
        let extractor = CountSmallObjects::new(10.0);
        assert_eq!(extractor.edges().len(), 11);
        assert_eq!(extractor.edges()[0], 0.0);
        assert!((extractor.edges()[10] - 0.1).abs() < 1e-12);
        assert!(extractor.edges().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_each_area_lands_in_one_bucket() {
        let mut extractor = CountSmallObjects::new(10.0);
        let reference = CountSmallObjects::REFERENCE_AREA;
        // 0%, 0.5%, 1.5%, 5.5%, 9.99%, just above 10%, 50% of 512x512
        let areas = [0, 1311, 3932, 14418, 26188, 26215, 131_072];
        for area in areas {
            extractor.record_area(area);
        }

        let mut expected = [0_u64; 11];
        for area in areas {
            #[expect(clippy::cast_precision_loss)]
            let a = area as f64 / reference;
            let edges = extractor.edges();
            let k = (0..11)
                .rev()
                .find(|&k| edges[k] <= a)
                .unwrap();
            if k < 10 {
                assert!(a < edges[k + 1]);
            }
            expected[k] += 1;
        }
        assert_eq!(extractor.counts(), expected.as_slice());
        assert_eq!(extractor.counts()[0], 2);
        assert_eq!(extractor.counts()[10], 2);
        assert_eq!(extractor.counts().iter().sum::<u64>(), 7);
    }

    #[test]
    fn test_render_normalizes_to_one() {
        let mut extractor = CountSmallObjects::default();
        for area in [10, 20, 30_000, 1_000_000] {
            extractor.record_area(area);
        }
        let mut axes = Axes::default();
        extractor.process(&mut axes, Side::Train);
        let sum: f64 = bar_values(&axes).iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        // rendering does not consume the counts
        assert_eq!(extractor.counts().iter().sum::<u64>(), 4);
    }

    #[test]
    fn test_render_with_no_objects() {
        let extractor = CountSmallObjects::default();
        let mut axes = Axes::default();
        extractor.process(&mut axes, Side::Validation);
        assert!(bar_values(&axes).iter().all(|&v| v == 0.0));
        assert_eq!(axes.grid(), Some(GridAxis::Y));
    }

    #[test]
    fn test_execute_skips_background() {
        let batch = batch_from_masks(
            3,
            &[&[vec![0, 1, 0, 2], vec![0, 1, 0, 2]], &[vec![0, 0, 0, 0]]],
        );
        let mut extractor = CountSmallObjects::default();
        extractor.execute(&batch).unwrap();
        assert_eq!(extractor.counts()[0], 2);
        extractor.execute(&batch).unwrap();
        assert_eq!(extractor.counts()[0], 4);
    }

    #[test]
    fn test_bucket_labels() {
        let labels = CountSmallObjects::new(10.0).bucket_labels();
        assert_eq!(labels.len(), 11);
        assert_eq!(labels[0], "0-1%");
        assert_eq!(labels[2], "2-3%");
        assert_eq!(labels[10], ">10%");
    }
}
