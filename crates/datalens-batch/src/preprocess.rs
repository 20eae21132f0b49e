//! Validation and normalization of raw batches.
//!
//! A [`BatchPreprocessor`] runs in two steps:
//!
//! 1. [`validate`](BatchPreprocessor::validate) checks that a [`RawBatch`] is
//!    internally consistent and splits it into images and labels
//! 2. [`preprocess`](BatchPreprocessor::preprocess) derives the task-specific
//!    data (for segmentation: per-class object contours) and returns the
//!    canonical [`BatchData`]

use std::fmt;

use crate::{
    batch::{BatchData, ClassLayer, RawBatch},
    contour::find_contours,
    image::{Image, LabelMask},
};

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum ValidationError {
    #[display("batch contains no samples")]
    EmptyBatch,
    #[display("batch has {images} images but {labels} labels")]
    LengthMismatch { images: usize, labels: usize },
    #[display("image #{index} has no channels")]
    NoChannels { index: usize },
    #[display("image #{index} holds {actual} values, expected {expected} for its shape")]
    ImageShape {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[display("label #{index} holds {actual} values, expected {expected} for its shape")]
    LabelShape {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[display(
        "sample #{index}: image is {image_height}x{image_width} but label is {label_height}x{label_width}"
    )]
    SizeMismatch {
        index: usize,
        image_height: usize,
        image_width: usize,
        label_height: usize,
        label_width: usize,
    },
    #[display("label #{index} contains unknown class id {value}")]
    UnknownClass { index: usize, value: u8 },
}

/// Turns raw batches into canonical [`BatchData`].
pub trait BatchPreprocessor: fmt::Debug + Send + Sync {
    /// Checks a raw batch and splits it into images and labels.
    fn validate(&self, raw: RawBatch) -> Result<(Vec<Image>, Vec<LabelMask>), ValidationError>;

    /// Builds the canonical batch from validated images and labels.
    fn preprocess(&self, images: Vec<Image>, labels: Vec<LabelMask>) -> BatchData;

    /// Runs [`validate`](Self::validate) then [`preprocess`](Self::preprocess).
    fn process(&self, raw: RawBatch) -> Result<BatchData, ValidationError> {
        let (images, labels) = self.validate(raw)?;
        Ok(self.preprocess(images, labels))
    }
}

pub type BoxedBatchPreprocessor = Box<dyn BatchPreprocessor>;

/// Preprocessor for semantic segmentation batches.
///
/// Class ids span `0..number_of_classes + ignore_labels.len()`, minus the
/// ignore labels themselves, so that ignore labels placed inside the range
/// do not shrink the set of real classes. Pixels carrying an ignore label
/// are accepted but produce no objects.
#[derive(Debug, Clone)]
pub struct SegmentationPreprocessor {
    number_of_classes: usize,
    ignore_labels: Vec<u8>,
    class_ids: Vec<u8>,
}

impl SegmentationPreprocessor {
    #[must_use]
    pub fn new(number_of_classes: usize, ignore_labels: Vec<u8>) -> Self {
        let class_ids = segmentation_class_ids(number_of_classes, &ignore_labels);
        Self {
            number_of_classes,
            ignore_labels,
            class_ids,
        }
    }

    #[must_use]
    pub fn number_of_classes(&self) -> usize {
        self.number_of_classes
    }

    #[must_use]
    pub fn ignore_labels(&self) -> &[u8] {
        &self.ignore_labels
    }

    /// Class ids that get a [`ClassLayer`] in every preprocessed image.
    #[must_use]
    pub fn class_ids(&self) -> &[u8] {
        &self.class_ids
    }

    fn is_known(&self, value: u8) -> bool {
        self.class_ids.contains(&value) || self.ignore_labels.contains(&value)
    }
}

/// Class ids that get a layer in a segmentation batch:
/// `0..number_of_classes + ignore_labels.len()` minus the ignore labels.
///
/// # Examples
///
/// ```
/// # use datalens_batch::preprocess::segmentation_class_ids;
/// assert_eq!(segmentation_class_ids(3, &[1]), [0, 2, 3]);
/// assert_eq!(segmentation_class_ids(3, &[255]), [0, 1, 2, 3]);
/// ```
#[must_use]
pub fn segmentation_class_ids(number_of_classes: usize, ignore_labels: &[u8]) -> Vec<u8> {
    (0..number_of_classes + ignore_labels.len())
        .filter_map(|id| u8::try_from(id).ok())
        .filter(|id| !ignore_labels.contains(id))
        .collect()
}

impl BatchPreprocessor for SegmentationPreprocessor {
    fn validate(&self, raw: RawBatch) -> Result<(Vec<Image>, Vec<LabelMask>), ValidationError> {
        let RawBatch { images, labels } = raw;
        if images.is_empty() && labels.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if images.len() != labels.len() {
            return Err(ValidationError::LengthMismatch {
                images: images.len(),
                labels: labels.len(),
            });
        }

        for (index, (image, label)) in images.iter().zip(&labels).enumerate() {
            if image.channels == 0 {
                return Err(ValidationError::NoChannels { index });
            }
            if image.pixels.len() != image.expected_len() {
                return Err(ValidationError::ImageShape {
                    index,
                    expected: image.expected_len(),
                    actual: image.pixels.len(),
                });
            }
            if label.values.len() != label.expected_len() {
                return Err(ValidationError::LabelShape {
                    index,
                    expected: label.expected_len(),
                    actual: label.values.len(),
                });
            }
            if (image.height, image.width) != (label.height, label.width) {
                return Err(ValidationError::SizeMismatch {
                    index,
                    image_height: image.height,
                    image_width: image.width,
                    label_height: label.height,
                    label_width: label.width,
                });
            }
            if let Some(&value) = label.values.iter().find(|&&v| !self.is_known(v)) {
                return Err(ValidationError::UnknownClass { index, value });
            }
        }

        Ok((images, labels))
    }

    fn preprocess(&self, images: Vec<Image>, labels: Vec<LabelMask>) -> BatchData {
        let layers = labels
            .iter()
            .map(|label| {
                self.class_ids
                    .iter()
                    .map(|&class_id| {
                        let mask = label.binary_mask(class_id);
                        let contours = find_contours(&mask, label.width, label.height);
                        ClassLayer::new(class_id, contours)
                    })
                    .collect()
            })
            .collect();
        BatchData::new(images, labels, layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rows: &[Vec<u8>]) -> (Image, LabelMask) {
        let label = LabelMask::from_rows(rows);
        let image = Image::filled(3, label.height, label.width, 0.0);
        (image, label)
    }

    #[test]
    fn test_class_ids_skip_ignore_labels() {
        let pre = SegmentationPreprocessor::new(3, vec![1]);
        assert_eq!(pre.class_ids(), &[0, 2, 3]);
        let pre = SegmentationPreprocessor::new(3, vec![255]);
        assert_eq!(pre.class_ids(), &[0, 1, 2, 3]);
    }

    #[test]
    fn test_rejects_inconsistent_batches() {
        let pre = SegmentationPreprocessor::new(2, vec![]);
        let (image, label) = sample(&[vec![0, 1]]);

        let raw = RawBatch {
            images: vec![],
            labels: vec![],
        };
        assert_eq!(pre.validate(raw), Err(ValidationError::EmptyBatch));

        let raw = RawBatch {
            images: vec![image.clone(), image.clone()],
            labels: vec![label.clone()],
        };
        assert!(matches!(
            pre.validate(raw),
            Err(ValidationError::LengthMismatch { images: 2, labels: 1 })
        ));

        let mut small = image.clone();
        small.pixels.pop();
        let raw = RawBatch {
            images: vec![small],
            labels: vec![label.clone()],
        };
        assert!(matches!(
            pre.validate(raw),
            Err(ValidationError::ImageShape { index: 0, .. })
        ));

        let (wide, _) = sample(&[vec![0, 0, 0]]);
        let raw = RawBatch {
            images: vec![wide],
            labels: vec![label],
        };
        assert!(matches!(
            pre.validate(raw),
            Err(ValidationError::SizeMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_unknown_class() {
        let pre = SegmentationPreprocessor::new(2, vec![255]);
        let (image, label) = sample(&[vec![0, 255, 7]]);
        let raw = RawBatch {
            images: vec![image],
            labels: vec![label],
        };
        let err = pre.validate(raw).unwrap_err();
        assert_eq!(err, ValidationError::UnknownClass { index: 0, value: 7 });
        assert_eq!(err.to_string(), "label #0 contains unknown class id 7");
    }

    #[test]
    fn test_preprocess_builds_layers() {
        let pre = SegmentationPreprocessor::new(3, vec![255]);
        let (image, label) = sample(&[
            vec![1, 1, 0, 2],
            vec![0, 0, 0, 2],
            vec![255, 0, 1, 0],
        ]);
        let batch = pre
            .process(RawBatch {
                images: vec![image],
                labels: vec![label],
            })
            .unwrap();

        let layers = &batch.layers()[0];
        let ids = layers.iter().map(ClassLayer::class_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(layers[0].distinct_values(), 1);
        assert_eq!(layers[1].contours().len(), 2);
        assert_eq!(layers[1].distinct_values(), 2);
        assert_eq!(layers[2].contours().len(), 1);
        assert_eq!(layers[3].distinct_values(), 1);
        // background objects are still detected
        assert!(layers[0].is_present());
        assert_eq!(batch.contours().filter(|(_, class, _)| *class != 0).count(), 3);
    }
}
