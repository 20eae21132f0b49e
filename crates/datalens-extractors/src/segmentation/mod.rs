//! Semantic segmentation extractors.
//!
//! These read the per-class object lists that
//! [`SegmentationPreprocessor`](datalens_batch::preprocess::SegmentationPreprocessor)
//! derives from label masks. Class `0` is the background class: its regions
//! are not counted as objects.

pub use self::{
    appearances_in_images::AppearancesInImages, count_small_objects::CountSmallObjects,
    objects_center_of_mass::ObjectsCenterOfMass,
};

mod appearances_in_images;
mod count_small_objects;
mod objects_center_of_mass;

