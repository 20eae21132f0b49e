//! The analysis orchestrator.
//!
//! [`AnalysisManager`] owns both batch sources, both extractor lists, the
//! dispatcher and the figure sink, and moves through a fixed set of stages:
//!
//! ```text
//! Created ──build──► Built ──execute──► Executed ──post_process──► PostProcessed
//!    │                                     ▲                            │
//!    └───────────────execute───────────────┘                          close
//!                                                                       ▼
//!  (any failure) ──► Failed ──close──► Closed ◄─────────────────────────┘
//! ```
//!
//! Calling an operation from any other stage returns
//! [`AnalysisError::InvalidStage`].

use std::{fmt, time::Duration};

use datalens_batch::{
    BatchData, RawBatch,
    preprocess::{BatchPreprocessor, BoxedBatchPreprocessor},
};
use datalens_extractors::{BoxedFeatureExtractor, Side, registry::ExtractorRegistry};
use datalens_plot::{AxisLayout, Figure, sink::BoxedFigureSink};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    AnalysisError, SourceError,
    config::AnalysisConfig,
    dispatch::{BoxedDispatcher, Job},
};

/// A stream of raw batches. `None` marks the end of the split.
pub type BatchSource = Box<dyn Iterator<Item = Result<RawBatch, SourceError>>>;

/// Wraps an infallible batch sequence as a [`BatchSource`].
pub fn batch_source<I>(batches: I) -> BatchSource
where
    I: IntoIterator<Item = RawBatch>,
    I::IntoIter: 'static,
{
    Box::new(batches.into_iter().map(Ok))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Stage {
    #[display("created")]
    Created,
    #[display("built")]
    Built,
    #[display("executed")]
    Executed,
    #[display("post-processed")]
    PostProcessed,
    #[display("closed")]
    Closed,
    #[display("failed")]
    Failed,
}

pub struct AnalysisManager {
    config: AnalysisConfig,
    registry: ExtractorRegistry,
    preprocessor: BoxedBatchPreprocessor,
    dispatcher: BoxedDispatcher,
    sink: BoxedFigureSink,
    train_source: BatchSource,
    val_source: Option<BatchSource>,
    has_val_source: bool,
    train_extractors: Vec<BoxedFeatureExtractor>,
    val_extractors: Vec<BoxedFeatureExtractor>,
    stage: Stage,
    train_batches: usize,
    val_batches: usize,
    progress: ProgressBar,
}

impl fmt::Debug for AnalysisManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisManager")
            .field("config", &self.config)
            .field("preprocessor", &self.preprocessor)
            .field("dispatcher", &self.dispatcher)
            .field("sink", &self.sink)
            .field("has_val_source", &self.has_val_source)
            .field("train_only", &self.is_train_only())
            .field("train_extractors", &self.train_extractors)
            .field("val_extractors", &self.val_extractors)
            .field("stage", &self.stage)
            .field("train_batches", &self.train_batches)
            .field("val_batches", &self.val_batches)
            .finish_non_exhaustive()
    }
}

impl AnalysisManager {
    /// Creates a manager using the built-in extractors.
    ///
    /// The worker pool, if any, is created here and reused for the whole run.
    pub fn new(
        config: AnalysisConfig,
        sink: BoxedFigureSink,
        train_source: BatchSource,
        val_source: Option<BatchSource>,
    ) -> Result<Self, AnalysisError> {
        let preprocessor = config.preprocessor()?;
        let dispatcher = config.dispatcher()?;
        let progress = if config.show_progress {
            batch_spinner()
        } else {
            ProgressBar::hidden()
        };
        tracing::debug!(
            task = %config.task,
            dispatch = ?config.dispatch,
            parallelism = dispatcher.parallelism(),
            "analysis manager created"
        );
        Ok(Self {
            config,
            registry: ExtractorRegistry::with_builtin(),
            preprocessor,
            dispatcher,
            sink,
            train_source,
            has_val_source: val_source.is_some(),
            val_source,
            train_extractors: vec![],
            val_extractors: vec![],
            stage: Stage::Created,
            train_batches: 0,
            val_batches: 0,
            progress,
        })
    }

    /// Replaces the registry used by [`build`](Self::build).
    #[must_use]
    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the dispatcher chosen from the configuration.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: BoxedDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Number of completed cycles, i.e. train batches consumed.
    #[must_use]
    pub fn train_batches(&self) -> usize {
        self.train_batches
    }

    #[must_use]
    pub fn val_batches(&self) -> usize {
        self.val_batches
    }

    /// Whether validation batches are no longer pulled.
    ///
    /// True from the start without a validation source, and from the cycle
    /// in which the validation source ran out. It never reverts.
    #[must_use]
    pub fn is_train_only(&self) -> bool {
        self.val_source.is_none()
    }

    #[must_use]
    pub fn train_extractors(&self) -> &[BoxedFeatureExtractor] {
        &self.train_extractors
    }

    #[must_use]
    pub fn val_extractors(&self) -> &[BoxedFeatureExtractor] {
        &self.val_extractors
    }

    fn check_stage(&self, operation: &'static str, allowed: &[Stage]) -> Result<(), AnalysisError> {
        if allowed.contains(&self.stage) {
            Ok(())
        } else {
            Err(AnalysisError::InvalidStage {
                operation,
                stage: self.stage,
            })
        }
    }

    fn fail(&mut self, err: AnalysisError) -> AnalysisError {
        tracing::error!(error = %err, stage = %self.stage, "analysis failed");
        self.stage = Stage::Failed;
        self.progress.abandon();
        err
    }

    /// Instantiates the train and validation extractor lists.
    pub fn build(&mut self) -> Result<(), AnalysisError> {
        self.check_stage("build", &[Stage::Created])?;
        match self.resolve_both() {
            Ok((train, val)) => {
                tracing::info!(extractors = train.len(), "extractors built");
                self.train_extractors = train;
                self.val_extractors = val;
                self.stage = Stage::Built;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn resolve_both(
        &self,
    ) -> Result<(Vec<BoxedFeatureExtractor>, Vec<BoxedFeatureExtractor>), AnalysisError> {
        let train = self.config.resolve_extractors(&self.registry)?;
        let val = self.config.resolve_extractors(&self.registry)?;
        Ok((train, val))
    }

    /// Feeds every batch to the extractors.
    ///
    /// Runs until the train source is exhausted. Each cycle pulls one train
    /// batch and, until the validation source runs out, one validation
    /// batch, then runs all extractors on them and waits for every one to
    /// finish. The first failure of a cycle is returned once the whole cycle
    /// has completed.
    ///
    /// Without a prior [`build`](Self::build) the extractor lists are empty
    /// and the sources are merely drained.
    pub fn execute(&mut self) -> Result<(), AnalysisError> {
        self.check_stage("execute", &[Stage::Created, Stage::Built])?;
        tracing::info!(
            train_only = self.is_train_only(),
            "executing extractors on batches"
        );
        match self.run_cycles() {
            Ok(()) => {
                self.progress.finish_with_message(format!(
                    "{} train / {} val batches",
                    self.train_batches, self.val_batches
                ));
                tracing::info!(
                    train_batches = self.train_batches,
                    val_batches = self.val_batches,
                    "all batches processed"
                );
                self.stage = Stage::Executed;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn run_cycles(&mut self) -> Result<(), AnalysisError> {
        loop {
            let batch = self.train_batches;
            let Some(train) = next_batch(
                &mut self.train_source,
                self.preprocessor.as_ref(),
                Side::Train,
                batch,
            )?
            else {
                return Ok(());
            };

            let val = match &mut self.val_source {
                Some(source) => {
                    let val =
                        next_batch(source, self.preprocessor.as_ref(), Side::Validation, batch)?;
                    if val.is_none() {
                        tracing::warn!(
                            batch,
                            "validation source exhausted, continuing with train batches only"
                        );
                        self.val_source = None;
                    }
                    val
                }
                None => None,
            };

            let mut jobs = self
                .train_extractors
                .iter_mut()
                .map(|e| Job::new(e.as_mut(), &train, Side::Train))
                .collect::<Vec<_>>();
            if let Some(val) = &val {
                jobs.extend(
                    self.val_extractors
                        .iter_mut()
                        .map(|e| Job::new(e.as_mut(), val, Side::Validation)),
                );
            }
            let sides = jobs.iter().map(Job::side).collect::<Vec<_>>();
            let outcomes = self.dispatcher.dispatch(jobs);

            let mut first_error = None;
            for (side, outcome) in sides.into_iter().zip(outcomes) {
                if let Err(source) = outcome {
                    tracing::error!(%side, batch, error = %source, "extractor failed");
                    if first_error.is_none() {
                        first_error = Some(AnalysisError::Extractor {
                            side,
                            batch,
                            source,
                        });
                    }
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }

            self.train_batches += 1;
            if val.is_some() {
                self.val_batches += 1;
            }
            self.progress.inc(1);
            tracing::debug!(
                batch,
                train_len = train.len(),
                val_len = val.as_ref().map(BatchData::len),
                "cycle completed"
            );
        }
    }

    /// Renders every (train, val) extractor pair and logs the figures.
    ///
    /// The validation side is drawn first, so styling set by the train side
    /// wins. Without a validation source the validation side is not drawn.
    pub fn post_process(&mut self) -> Result<(), AnalysisError> {
        self.check_stage("post_process", &[Stage::Executed])?;
        tracing::info!(figures = self.train_extractors.len(), "rendering figures");
        match self.render_all() {
            Ok(()) => {
                self.stage = Stage::PostProcessed;
                Ok(())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn render_all(&mut self) -> Result<(), AnalysisError> {
        for (train, val) in self.train_extractors.iter().zip(&self.val_extractors) {
            let layout = train.layout();
            let mut figure = Figure::new(layout);
            if self.has_val_source {
                let index = match layout {
                    AxisLayout::Single => 0,
                    AxisLayout::SideBySide => 1,
                };
                val.process(figure.axes_mut(index), Side::Validation);
            }
            train.process(figure.axes_mut(0), Side::Train);
            figure.tight_layout();

            let key = format!("{}/fig", train.type_name());
            self.sink.log_graph(&key, figure)?;
            tracing::debug!(key, "figure logged");
        }
        Ok(())
    }

    /// Releases the figure sink.
    ///
    /// Valid from every stage but [`Stage::Closed`].
    pub fn close(&mut self) -> Result<(), AnalysisError> {
        if self.stage == Stage::Closed {
            return Err(AnalysisError::InvalidStage {
                operation: "close",
                stage: self.stage,
            });
        }
        self.stage = Stage::Closed;
        self.sink.close()?;
        tracing::info!("analysis closed");
        Ok(())
    }

    /// Runs `build`, `execute`, `post_process` and `close` in order.
    ///
    /// On failure the sink is still closed and the first error is returned.
    pub fn run(&mut self) -> Result<(), AnalysisError> {
        let result = self
            .build()
            .and_then(|()| self.execute())
            .and_then(|()| self.post_process());
        match result {
            Ok(()) => self.close(),
            Err(err) => {
                if let Err(close_err) = self.close() {
                    tracing::warn!(error = %close_err, "failed to close sink after error");
                }
                Err(err)
            }
        }
    }
}

fn next_batch(
    source: &mut BatchSource,
    preprocessor: &dyn BatchPreprocessor,
    side: Side,
    batch: usize,
) -> Result<Option<BatchData>, AnalysisError> {
    let Some(raw) = source.next() else {
        return Ok(None);
    };
    let raw = raw.map_err(|source| AnalysisError::Source {
        side,
        batch,
        source,
    })?;
    let data = preprocessor
        .process(raw)
        .map_err(|source| AnalysisError::Validation {
            side,
            batch,
            source,
        })?;
    Ok(Some(data))
}

fn batch_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {pos} batches {msg}") {
        spinner.set_style(style.tick_strings(&["-", "\\", "|", "/", "+"]));
    }
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
