use std::collections::BTreeMap;

use datalens_batch::{BatchData, preprocess::segmentation_class_ids};
use datalens_plot::{Axes, AxisLayout, HeatmapSeries};
use datalens_stats::density::DensityGrid;

use crate::{ExtractorError, FeatureExtractor, Side};

#[derive(Debug, Clone, Default, PartialEq)]
struct Centroids {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

/// Where objects sit in the image, rendered as a smoothed heat-map.
///
/// Centroids are kept per class, but the heat-map mixes every class.
#[derive(Debug, Clone)]
pub struct ObjectsCenterOfMass {
    by_class: BTreeMap<u8, Centroids>,
}

impl ObjectsCenterOfMass {
    #[must_use]
    pub fn new(number_of_classes: usize, ignore_labels: &[u8]) -> Self {
        let by_class = segmentation_class_ids(number_of_classes, ignore_labels)
            .into_iter()
            .map(|id| (id, Centroids::default()))
            .collect();
        Self { by_class }
    }

    /// Centroid `x` coordinates recorded for `class_id`.
    #[must_use]
    pub fn xs(&self, class_id: u8) -> Option<&[f64]> {
        self.by_class.get(&class_id).map(|c| c.xs.as_slice())
    }

    /// Centroid `y` coordinates recorded for `class_id`.
    #[must_use]
    pub fn ys(&self, class_id: u8) -> Option<&[f64]> {
        self.by_class.get(&class_id).map(|c| c.ys.as_slice())
    }

    /// Number of centroids over all classes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_class.values().map(|c| c.xs.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Heat-map resolution for `n` points: `⌊4·√n⌋`.
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn bins_for(n: usize) -> usize {
        ((n as f64).sqrt() * 4.0) as usize
    }

    /// Smoothing in cells for a `bins`-wide grid.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn sigma_for(bins: usize) -> f64 {
        2.0 * bins as f64 / 150.0
    }

    fn density(&self) -> DensityGrid {
        let (xs, ys): (Vec<f64>, Vec<f64>) = self
            .by_class
            .values()
            .flat_map(|c| c.xs.iter().copied().zip(c.ys.iter().copied()))
            .unzip();
        let bins = Self::bins_for(xs.len());
        DensityGrid::from_points(&xs, &ys, bins).smoothed(Self::sigma_for(bins))
    }
}

impl FeatureExtractor for ObjectsCenterOfMass {
    fn type_name(&self) -> &'static str {
        "ObjectsCenterOfMass"
    }

    fn layout(&self) -> AxisLayout {
        AxisLayout::SideBySide
    }

    fn execute(&mut self, batch: &BatchData) -> Result<(), ExtractorError> {
        for layer in batch.layers().iter().flatten() {
            if layer.distinct_values() <= 1 {
                continue;
            }
            let centroids =
                self.by_class
                    .get_mut(&layer.class_id())
                    .ok_or(ExtractorError::UnexpectedClass {
                        extractor: "ObjectsCenterOfMass",
                        class_id: layer.class_id(),
                    })?;
            for contour in layer.contours() {
                let (x, y) = contour.center_of_mass();
                centroids.xs.push(x);
                centroids.ys.push(y);
            }
        }
        Ok(())
    }

    fn process(&self, axes: &mut Axes, side: Side) {
        let grid = self.density();
        let (x_range, y_range) = (grid.x_range(), grid.y_range());
        axes.heatmap(HeatmapSeries {
            label: side.label().to_owned(),
            x_min: x_range.start,
            x_max: x_range.end,
            y_min: y_range.start,
            y_max: y_range.end,
            rows: grid.rows(),
        });
        axes.set_title("Center of mass average locations");
        axes.set_x_label("X axis");
        axes.set_y_label("Y axis");
        axes.annotate(format!("{side}: {} objects", self.len()));
    }
}

#[cfg(test)]
mod tests {
    use datalens_batch::{BatchData, ClassLayer, Contour, find_contours};
    use datalens_plot::Series;

    use super::*;
    use crate::test_util::batch_from_masks;

    #[test]
    fn test_background_only_records_nothing() {
        let batch = batch_from_masks(2, &[&[vec![0, 0], vec![0, 0]]]);
        let mut extractor = ObjectsCenterOfMass::new(2, &[]);
        extractor.execute(&batch).unwrap();
        assert!(extractor.is_empty());
    }

    #[test]
    fn test_one_centroid_per_object() {
        let batch = batch_from_masks(
            3,
            &[
                &[vec![1, 1, 0, 0], vec![1, 1, 0, 2], vec![0, 0, 0, 2]],
                &[vec![0, 0, 0, 0], vec![0, 0, 0, 0], vec![0, 0, 0, 1]],
            ],
        );
        let mut extractor = ObjectsCenterOfMass::new(3, &[]);
        extractor.execute(&batch).unwrap();

        assert_eq!(extractor.len(), 3);
        assert_eq!(extractor.xs(1).unwrap().len(), 2);
        assert_eq!(extractor.xs(2).unwrap().len(), 1);
        assert_eq!(extractor.xs(0).unwrap().len(), 0);
        assert!(extractor.xs(7).is_none());

        let (x, y) = (extractor.xs(2).unwrap()[0], extractor.ys(2).unwrap()[0]);
        assert!((x - 3.0).abs() < 1e-9);
        assert!((y - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_unconfigured_class_is_an_error() {
        let mask = [true, true, false, false];
        let layer = ClassLayer::new(5, find_contours(&mask, 2, 2));
        let batch = BatchData::new(
            vec![datalens_batch::Image::filled(1, 2, 2, 0.0)],
            vec![datalens_batch::LabelMask::filled(2, 2, 5)],
            vec![vec![layer]],
        );
        let mut extractor = ObjectsCenterOfMass::new(2, &[]);
        let err = extractor.execute(&batch).unwrap_err();
        assert_eq!(
            err,
            ExtractorError::UnexpectedClass {
                extractor: "ObjectsCenterOfMass",
                class_id: 5
            }
        );
    }

    #[test]
    fn test_ignore_labels_shift_class_ids() {
        let extractor = ObjectsCenterOfMass::new(2, &[1]);
        assert!(extractor.xs(0).is_some());
        assert!(extractor.xs(1).is_none());
        assert!(extractor.xs(2).is_some());
    }

    #[test]
    fn test_accepts_every_layer_the_preprocessor_emits() {
        use datalens_batch::{
            LabelMask, RawBatch,
            preprocess::{BatchPreprocessor as _, SegmentationPreprocessor},
        };

        let pre = SegmentationPreprocessor::new(2, vec![1]);
        let label = LabelMask::from_rows(&[vec![0, 1, 2], vec![0, 2, 2]]);
        let batch = pre
            .process(RawBatch {
                images: vec![datalens_batch::Image::filled(1, 2, 3, 0.0)],
                labels: vec![label],
            })
            .unwrap();

        let mut extractor = ObjectsCenterOfMass::new(2, &[1]);
        for &class_id in pre.class_ids() {
            assert!(extractor.xs(class_id).is_some(), "class {class_id}");
        }
        extractor.execute(&batch).unwrap();
        assert_eq!(extractor.xs(2).unwrap().len(), 1);
    }

    #[test]
    fn test_heatmap_parameters() {
        assert_eq!(ObjectsCenterOfMass::bins_for(0), 0);
        assert_eq!(ObjectsCenterOfMass::bins_for(1), 4);
        assert_eq!(ObjectsCenterOfMass::bins_for(100), 40);
        assert!((ObjectsCenterOfMass::sigma_for(75) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_render() {
        let mut extractor = ObjectsCenterOfMass::new(2, &[]);
        let mut axes = Axes::default();
        extractor.process(&mut axes, Side::Train);
        let Series::Heatmap(empty) = &axes.series()[0] else {
            panic!("expected a heat-map");
        };
        assert!(empty.rows.is_empty());

        let mut mask = vec![false; 64];
        for i in 0..4 {
            mask[i * 8 + i * 2] = true;
        }
        let contours: Vec<Contour> = find_contours(&mask, 8, 8);
        assert_eq!(contours.len(), 4);
        let layer = ClassLayer::new(1, contours);
        let batch = BatchData::new(
            vec![datalens_batch::Image::filled(1, 8, 8, 0.0)],
            vec![datalens_batch::LabelMask::filled(8, 8, 0)],
            vec![vec![layer]],
        );
        extractor.execute(&batch).unwrap();
        let mut axes = Axes::default();
        extractor.process(&mut axes, Side::Validation);
        let Series::Heatmap(map) = &axes.series()[0] else {
            panic!("expected a heat-map");
        };
        assert_eq!(map.rows.len(), 8);
        let total: f64 = map.rows.iter().flatten().sum();
        assert!((total - 4.0).abs() < 1e-9);
        assert_eq!(map.label, "val");
    }
}
