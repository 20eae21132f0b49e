//! Analysis configuration.
//!
//! A configuration is one JSON document. Besides the dataset description it
//! holds a `common` extractor list and one list per task; the lists used for
//! a run are `common` followed by the section named by `task`:
//!
//! ```json
//! {
//!   "task": "semantic_segmentation",
//!   "number_of_classes": 3,
//!   "ignore_labels": [255],
//!   "pixel_max": 255.0,
//!   "dispatch": "pooled",
//!   "num_threads": 4,
//!   "common": ["images_average_brightness"],
//!   "semantic_segmentation": [
//!     {"count_small_objects": {"percent_of_an_image": 10}},
//!     "objects_center_of_mass"
//!   ]
//! }
//! ```

use std::collections::BTreeMap;

use datalens_batch::preprocess::{BoxedBatchPreprocessor, SegmentationPreprocessor};
use datalens_extractors::{
    BoxedFeatureExtractor,
    registry::{BuildContext, ExtractorRegistry, ExtractorSpec},
};
use serde::{Deserialize, Serialize};

use crate::{
    AnalysisError,
    dispatch::{BoxedDispatcher, InlineDispatcher, PooledDispatcher},
};

/// How extractor executions within one cycle are run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// On a shared worker pool.
    #[default]
    Pooled,
    /// One after another on the calling thread.
    Sequential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Task name; selects the preprocessor and the task extractor section.
    pub task: String,
    pub number_of_classes: usize,
    /// Label values excluded from the class list.
    #[serde(default)]
    pub ignore_labels: Vec<u8>,
    /// Top of the pixel value range: `255.0` for 8-bit data, `1.0` for
    /// normalized data.
    #[serde(default = "default_pixel_max")]
    pub pixel_max: f64,
    #[serde(default)]
    pub dispatch: DispatchMode,
    /// Worker count for [`DispatchMode::Pooled`]; `None` lets the pool decide.
    #[serde(default)]
    pub num_threads: Option<usize>,
    /// Shows a batch spinner on stderr while executing.
    #[serde(default)]
    pub show_progress: bool,
    /// Extractors for every task.
    #[serde(default)]
    pub common: Vec<ExtractorSpec>,
    /// Task-specific extractor lists, keyed by task name.
    #[serde(flatten)]
    pub tasks: BTreeMap<String, Vec<ExtractorSpec>>,
}

impl AnalysisConfig {
    pub const SEMANTIC_SEGMENTATION: &'static str = "semantic_segmentation";

    /// A segmentation configuration with no extractors.
    #[must_use]
    pub fn segmentation(number_of_classes: usize) -> Self {
        Self {
            task: Self::SEMANTIC_SEGMENTATION.to_owned(),
            number_of_classes,
            ignore_labels: vec![],
            pixel_max: default_pixel_max(),
            dispatch: DispatchMode::default(),
            num_threads: None,
            show_progress: false,
            common: vec![],
            tasks: BTreeMap::from([(Self::SEMANTIC_SEGMENTATION.to_owned(), vec![])]),
        }
    }

    /// Appends `spec` to the current task's section.
    #[must_use]
    pub fn with_extractor(mut self, spec: impl Into<ExtractorSpec>) -> Self {
        self.tasks
            .entry(self.task.clone())
            .or_default()
            .push(spec.into());
        self
    }

    #[must_use]
    pub fn build_context(&self) -> BuildContext {
        BuildContext::new(self.number_of_classes, self.ignore_labels.clone())
            .with_pixel_max(self.pixel_max)
    }

    /// The `common` entries followed by the current task's entries.
    pub fn extractor_specs(&self) -> Result<impl Iterator<Item = &ExtractorSpec>, AnalysisError> {
        let task = self
            .tasks
            .get(&self.task)
            .ok_or_else(|| AnalysisError::MissingTaskSection {
                task: self.task.clone(),
            })?;
        Ok(self.common.iter().chain(task))
    }

    /// Instantiates a fresh extractor list.
    ///
    /// Every call yields new instances, so two calls give two lists that
    /// share no state.
    pub fn resolve_extractors(
        &self,
        registry: &ExtractorRegistry,
    ) -> Result<Vec<BoxedFeatureExtractor>, AnalysisError> {
        let ctx = self.build_context();
        self.extractor_specs()?
            .map(|spec| registry.build(spec, &ctx).map_err(AnalysisError::from))
            .collect()
    }

    pub fn preprocessor(&self) -> Result<BoxedBatchPreprocessor, AnalysisError> {
        match self.task.as_str() {
            Self::SEMANTIC_SEGMENTATION => Ok(Box::new(SegmentationPreprocessor::new(
                self.number_of_classes,
                self.ignore_labels.clone(),
            ))),
            _ => Err(AnalysisError::UnsupportedTask {
                task: self.task.clone(),
            }),
        }
    }

    pub fn dispatcher(&self) -> Result<BoxedDispatcher, AnalysisError> {
        Ok(match self.dispatch {
            DispatchMode::Pooled => Box::new(PooledDispatcher::new(self.num_threads)?),
            DispatchMode::Sequential => Box::new(InlineDispatcher),
        })
    }
}

fn default_pixel_max() -> f64 {
    BuildContext::DEFAULT_PIXEL_MAX
}
