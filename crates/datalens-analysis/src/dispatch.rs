//! Execution of one analysis cycle.
//!
//! A cycle is the set of [`Job`]s produced for one train batch and, when
//! present, one validation batch. A [`Dispatcher`] runs all of them and
//! returns only when every job has finished, which makes the return the
//! end-of-cycle barrier:
//!
//! - No extractor is given two batches at once: each job holds the only
//!   mutable borrow of its extractor.
//! - No batch is dropped while a job still reads it: jobs borrow the batch
//!   for the duration of the dispatch call.
//!
//! A job that fails or panics does not stop its siblings; its outcome is
//! reported in the slot matching its position.

use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

use datalens_batch::BatchData;
use datalens_extractors::{ExtractorError, FeatureExtractor, Side};
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

/// One extractor paired with the batch it must consume.
pub struct Job<'a> {
    extractor: &'a mut dyn FeatureExtractor,
    batch: &'a BatchData,
    side: Side,
}

impl fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("extractor", &self.extractor.type_name())
            .field("batch_len", &self.batch.len())
            .field("side", &self.side)
            .finish()
    }
}

impl<'a> Job<'a> {
    pub fn new(extractor: &'a mut dyn FeatureExtractor, batch: &'a BatchData, side: Side) -> Self {
        Self {
            extractor,
            batch,
            side,
        }
    }

    #[must_use]
    pub fn side(&self) -> Side {
        self.side
    }

    /// Runs the extractor, turning a panic into [`ExtractorError::Panicked`].
    pub fn run(self) -> Result<(), ExtractorError> {
        let name = self.extractor.type_name();
        let extractor = self.extractor;
        let batch = self.batch;
        panic::catch_unwind(AssertUnwindSafe(|| extractor.execute(batch))).unwrap_or_else(
            |payload| {
                Err(ExtractorError::Panicked {
                    extractor: name.to_owned(),
                    message: panic_message(payload.as_ref()),
                })
            },
        )
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

pub trait Dispatcher: fmt::Debug + Send + Sync {
    /// Runs every job and waits for all of them.
    ///
    /// The returned outcomes are in the same order as `jobs`.
    fn dispatch(&self, jobs: Vec<Job<'_>>) -> Vec<Result<(), ExtractorError>>;

    /// Number of jobs that may run at the same time.
    fn parallelism(&self) -> usize;
}

pub type BoxedDispatcher = Box<dyn Dispatcher>;

/// Runs jobs on a worker pool that lives as long as the dispatcher.
#[derive(Debug)]
pub struct PooledDispatcher {
    pool: ThreadPool,
}

impl PooledDispatcher {
    /// Builds the worker pool.
    ///
    /// `None` uses rayon's default thread count.
    pub fn new(num_threads: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let mut builder =
            ThreadPoolBuilder::new().thread_name(|index| format!("datalens-worker-{index}"));
        if let Some(num_threads) = num_threads {
            builder = builder.num_threads(num_threads);
        }
        Ok(Self {
            pool: builder.build()?,
        })
    }
}

impl Dispatcher for PooledDispatcher {
    fn dispatch(&self, jobs: Vec<Job<'_>>) -> Vec<Result<(), ExtractorError>> {
        let mut outcomes = vec![Ok(()); jobs.len()];
        self.pool.scope(|scope| {
            for (job, outcome) in jobs.into_iter().zip(&mut outcomes) {
                scope.spawn(move |_| *outcome = job.run());
            }
        });
        outcomes
    }

    fn parallelism(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Runs jobs one after another on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, jobs: Vec<Job<'_>>) -> Vec<Result<(), ExtractorError>> {
        jobs.into_iter().map(Job::run).collect()
    }

    fn parallelism(&self) -> usize {
        1
    }
}
