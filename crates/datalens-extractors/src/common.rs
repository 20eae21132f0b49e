//! Extractors that apply to any task.

use datalens_batch::BatchData;
use datalens_plot::{Axes, BarSeries, GridAxis};
use datalens_stats::{descriptive::DescriptiveStats, histogram::BucketHistogram};

use crate::{ExtractorError, FeatureExtractor, Side, format_trimmed};

/// Distribution of per-image mean brightness.
///
/// Each image contributes its mean intensity over all channels, divided by
/// the dataset's `pixel_max` so that it falls in `[0, 1]`. The rendered
/// chart buckets those means into [`NUM_BUCKETS`](Self::NUM_BUCKETS)
/// equal-width buckets.
#[derive(Debug, Clone)]
pub struct ImagesAverageBrightness {
    pixel_max: f64,
    means: Vec<f64>,
}

impl ImagesAverageBrightness {
    pub const NUM_BUCKETS: usize = 20;

    /// # Panics
    ///
    /// Panics unless `pixel_max` is finite and positive.
    #[must_use]
    pub fn new(pixel_max: f64) -> Self {
        assert!(
            Self::is_valid_pixel_max(pixel_max),
            "pixel_max must be finite and positive"
        );
        Self {
            pixel_max,
            means: vec![],
        }
    }

    #[must_use]
    pub fn is_valid_pixel_max(pixel_max: f64) -> bool {
        pixel_max.is_finite() && pixel_max > 0.0
    }

    #[must_use]
    pub fn pixel_max(&self) -> f64 {
        self.pixel_max
    }

    /// Per-image means seen so far.
    #[must_use]
    pub fn means(&self) -> &[f64] {
        &self.means
    }
}

impl FeatureExtractor for ImagesAverageBrightness {
    fn type_name(&self) -> &'static str {
        "ImagesAverageBrightness"
    }

    fn execute(&mut self, batch: &BatchData) -> Result<(), ExtractorError> {
        self.means.extend(
            batch
                .images()
                .iter()
                .map(|image| image.normalized_mean(self.pixel_max)),
        );
        Ok(())
    }

    fn process(&self, axes: &mut Axes, side: Side) {
        let mut hist = BucketHistogram::uniform(0.0, 1.0, Self::NUM_BUCKETS);
        for &mean in &self.means {
            hist.record(mean);
        }
        let categories = hist
            .edges()
            .iter()
            .map(|&edge| format_trimmed(edge, 2))
            .collect();

        axes.bar(BarSeries {
            label: side.label().to_owned(),
            categories,
            values: hist.fractions(),
            color: self.color(side),
        });
        if let Some(stats) = DescriptiveStats::new(self.means.iter().copied()) {
            axes.annotate(format!(
                "{side}: mean={:.3} std={:.3} (n={})",
                stats.mean, stats.std_dev, stats.count
            ));
        }
        axes.set_title("Images average brightness");
        axes.set_x_label("Average brightness");
        axes.set_y_label("Fraction of images");
        axes.set_ticks_rotation(45.0);
        axes.set_grid(GridAxis::Y);
        axes.show_legend();
    }
}

#[cfg(test)]
mod tests {
    use datalens_batch::{
        Image, LabelMask, RawBatch,
        preprocess::{BatchPreprocessor as _, SegmentationPreprocessor},
    };
    use datalens_plot::Series;

    use super::*;

    fn batch(images: Vec<Image>) -> BatchData {
        let labels = images
            .iter()
            .map(|image| LabelMask::filled(image.height, image.width, 0))
            .collect();
        SegmentationPreprocessor::new(1, vec![])
            .process(RawBatch { images, labels })
            .unwrap()
    }

    fn bar_values(extractor: &ImagesAverageBrightness) -> Vec<f64> {
        let mut axes = Axes::default();
        extractor.process(&mut axes, Side::Train);
        let Series::Bar(bar) = &axes.series()[0] else {
            panic!("expected a bar series");
        };
        bar.values.clone()
    }

    #[test]
    fn test_accumulates_across_batches() {
        let batch = batch(vec![Image::filled(3, 2, 2, 255.0), Image::filled(1, 2, 2, 130.0)]);

        let mut extractor = ImagesAverageBrightness::new(255.0);
        extractor.execute(&batch).unwrap();
        extractor.execute(&batch).unwrap();
        assert_eq!(extractor.means().len(), 4);
        assert_eq!(extractor.means()[2], 1.0);

        let values = bar_values(&extractor);
        assert_eq!(values.len(), ImagesAverageBrightness::NUM_BUCKETS);
        assert_eq!(values[10], 0.5);
        assert_eq!(values[19], 0.5);

        let mut axes = Axes::default();
        extractor.process(&mut axes, Side::Train);
        assert_eq!(axes.annotations().len(), 1);
    }

    #[test]
    fn test_dark_images_use_dataset_scale() {
        let dark = Image {
            channels: 1,
            height: 2,
            width: 2,
            pixels: vec![1.0, 0.0, 1.0, 1.0],
        };
        let mut extractor = ImagesAverageBrightness::new(255.0);
        extractor.execute(&batch(vec![dark, Image::filled(1, 2, 2, 1.0)])).unwrap();
        assert!(extractor.means().iter().all(|&mean| mean < 0.1));
        assert_eq!(bar_values(&extractor)[0], 1.0);
    }

    #[test]
    fn test_normalized_dataset() {
        let mut extractor = ImagesAverageBrightness::new(1.0);
        extractor.execute(&batch(vec![Image::filled(1, 2, 2, 1.0)])).unwrap();
        assert_eq!(extractor.means(), [1.0]);
    }

    #[test]
    fn test_pixel_max_validation() {
        assert!(ImagesAverageBrightness::is_valid_pixel_max(255.0));
        assert!(!ImagesAverageBrightness::is_valid_pixel_max(0.0));
        assert!(!ImagesAverageBrightness::is_valid_pixel_max(-1.0));
        assert!(!ImagesAverageBrightness::is_valid_pixel_max(f64::NAN));
    }

    #[test]
    fn test_empty_render() {
        let mut axes = Axes::default();
        ImagesAverageBrightness::new(255.0).process(&mut axes, Side::Validation);
        assert!(axes.annotations().is_empty());
        assert_eq!(axes.series().len(), 1);
    }
}
