use std::collections::BTreeMap;

use datalens_batch::{BatchData, preprocess::segmentation_class_ids};
use datalens_plot::{Axes, BarSeries, GridAxis};

use crate::{ExtractorError, FeatureExtractor, Side};

/// Share of images in which each class appears at least once.
#[derive(Debug, Clone)]
pub struct AppearancesInImages {
    images: u64,
    appearances: BTreeMap<u8, u64>,
}

impl AppearancesInImages {
    #[must_use]
    pub fn new(number_of_classes: usize, ignore_labels: &[u8]) -> Self {
        let appearances = segmentation_class_ids(number_of_classes, ignore_labels)
            .into_iter()
            .map(|id| (id, 0))
            .collect();
        Self {
            images: 0,
            appearances,
        }
    }

    /// Number of images seen.
    #[must_use]
    pub fn images(&self) -> u64 {
        self.images
    }

    /// Number of images containing `class_id`.
    #[must_use]
    pub fn appearances(&self, class_id: u8) -> Option<u64> {
        self.appearances.get(&class_id).copied()
    }

    #[expect(clippy::cast_precision_loss)]
    fn fractions(&self) -> Vec<f64> {
        self.appearances
            .values()
            .map(|&count| {
                if self.images == 0 {
                    0.0
                } else {
                    count as f64 / self.images as f64
                }
            })
            .collect()
    }
}

impl FeatureExtractor for AppearancesInImages {
    fn type_name(&self) -> &'static str {
        "AppearancesInImages"
    }

    fn execute(&mut self, batch: &BatchData) -> Result<(), ExtractorError> {
        for layers in batch.layers() {
            self.images += 1;
            for layer in layers.iter().filter(|l| l.is_present()) {
                let count = self.appearances.get_mut(&layer.class_id()).ok_or(
                    ExtractorError::UnexpectedClass {
                        extractor: "AppearancesInImages",
                        class_id: layer.class_id(),
                    },
                )?;
                *count += 1;
            }
        }
        Ok(())
    }

    fn process(&self, axes: &mut Axes, side: Side) {
        axes.bar(BarSeries {
            label: side.label().to_owned(),
            categories: self.appearances.keys().map(u8::to_string).collect(),
            values: self.fractions(),
            color: self.color(side),
        });
        axes.set_title("Number of appearance in images");
        axes.set_x_label("Class");
        axes.set_y_label("Fraction of images");
        axes.set_grid(GridAxis::Y);
        axes.show_legend();
    }
}
