use serde::{Deserialize, Serialize};

use crate::{contour::Contour, image::Image, image::LabelMask};

/// One batch as yielded by a data source, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBatch {
    pub images: Vec<Image>,
    pub labels: Vec<LabelMask>,
}

/// Objects of a single class within one image.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLayer {
    class_id: u8,
    contours: Vec<Contour>,
}

impl ClassLayer {
    #[must_use]
    pub fn new(class_id: u8, contours: Vec<Contour>) -> Self {
        Self { class_id, contours }
    }

    #[must_use]
    pub fn class_id(&self) -> u8 {
        self.class_id
    }

    #[must_use]
    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    /// Number of distinct values in this layer's one-hot mask scaled by its
    /// class id.
    ///
    /// The scaled mask always contains `0`. It contains a second value only
    /// when the class is present and is not the background class `0`, so
    /// background and absent classes report `1`.
    #[must_use]
    pub fn distinct_values(&self) -> usize {
        if self.class_id == 0 || self.contours.is_empty() {
            1
        } else {
            2
        }
    }

    /// Whether any object of this class is present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.contours.is_empty()
    }
}

/// The canonical form of one batch.
///
/// Produced by a [`BatchPreprocessor`](crate::preprocess::BatchPreprocessor)
/// and never mutated afterwards: all feature extractors scheduled against it
/// read it concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchData {
    images: Vec<Image>,
    labels: Vec<LabelMask>,
    layers: Vec<Vec<ClassLayer>>,
}

impl BatchData {
    /// Assembles a batch from validated parts.
    ///
    /// # Panics
    ///
    /// Panics if the three lists do not have the same length.
    #[must_use]
    pub fn new(images: Vec<Image>, labels: Vec<LabelMask>, layers: Vec<Vec<ClassLayer>>) -> Self {
        assert_eq!(images.len(), labels.len(), "one label per image");
        assert_eq!(images.len(), layers.len(), "one layer list per image");
        Self {
            images,
            labels,
            layers,
        }
    }

    #[must_use]
    pub fn images(&self) -> &[Image] {
        &self.images
    }

    #[must_use]
    pub fn labels(&self) -> &[LabelMask] {
        &self.labels
    }

    /// Per-image, per-class object lists.
    #[must_use]
    pub fn layers(&self) -> &[Vec<ClassLayer>] {
        &self.layers
    }

    /// Number of samples in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Iterates over every detected object with its image index and class.
    pub fn contours(&self) -> impl Iterator<Item = (usize, u8, &Contour)> {
        self.layers.iter().enumerate().flat_map(|(i, layers)| {
            layers.iter().flat_map(move |layer| {
                layer
                    .contours()
                    .iter()
                    .map(move |c| (i, layer.class_id(), c))
            })
        })
    }
}
