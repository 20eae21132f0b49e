use std::ops::Range;

/// A histogram over explicit bucket edges.
///
/// With edges `E0 < E1 < ... < En`, the histogram has `n + 1` buckets:
/// bucket `k < n` covers `[E_k, E_{k+1})` and the last bucket covers
/// `[E_n, ∞)`. Values below `E0` are clamped into the first bucket.
///
/// Unlike a one-shot histogram built from a complete dataset, a
/// `BucketHistogram` is meant to be fed incrementally: its edges are fixed
/// up front and [`record`](Self::record) can be called across many batches.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketHistogram {
    edges: Vec<f64>,
    counts: Vec<u64>,
}

impl BucketHistogram {
    /// Creates an empty histogram over the given bucket edges.
    ///
    /// # Panics
    ///
    /// Panics if `edges` is empty or not strictly increasing.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datalens_stats::histogram::BucketHistogram;
    /// let hist = BucketHistogram::with_edges(vec![0.0, 10.0, 20.0]);
    /// assert_eq!(hist.num_buckets(), 3);
    /// ```
    #[must_use]
    pub fn with_edges(edges: Vec<f64>) -> Self {
        assert!(!edges.is_empty(), "histogram needs at least one edge");
        assert!(
            edges.windows(2).all(|w| w[0] < w[1]),
            "edges must be strictly increasing"
        );
        let counts = vec![0; edges.len()];
        Self { edges, counts }
    }

    /// Creates a histogram with `num_buckets` equal-width buckets starting at
    /// `min`, the last of which is open-ended from `max - width`.
    ///
    /// # Panics
    ///
    /// Panics if `num_buckets` is zero or `max <= min`.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn uniform(min: f64, max: f64, num_buckets: usize) -> Self {
        assert!(num_buckets > 0, "histogram needs at least one bucket");
        assert!(max > min, "histogram range must not be empty");
        let width = (max - min) / num_buckets as f64;
        let edges = (0..num_buckets).map(|k| min + width * k as f64).collect();
        Self::with_edges(edges)
    }

    /// Returns the index of the bucket `value` falls into.
    #[must_use]
    pub fn bucket_index(&self, value: f64) -> usize {
        // number of edges <= value, minus one for the bucket starting at that edge
        self.edges
            .partition_point(|&edge| edge <= value)
            .saturating_sub(1)
    }

    /// Counts one observation.
    pub fn record(&mut self, value: f64) {
        let idx = self.bucket_index(value);
        self.counts[idx] += 1;
    }

    #[must_use]
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    #[must_use]
    pub fn num_buckets(&self) -> usize {
        self.counts.len()
    }

    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns the range covered by bucket `idx`.
    ///
    /// The last bucket ends at `f64::INFINITY`.
    #[must_use]
    pub fn bucket_range(&self, idx: usize) -> Range<f64> {
        let start = self.edges[idx];
        let end = self.edges.get(idx + 1).copied().unwrap_or(f64::INFINITY);
        start..end
    }

    /// Returns each bucket's share of the total count.
    ///
    /// An empty histogram yields all zeros rather than NaN.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datalens_stats::histogram::BucketHistogram;
    /// let mut hist = BucketHistogram::with_edges(vec![0.0, 1.0]);
    /// assert_eq!(hist.fractions(), vec![0.0, 0.0]);
    /// hist.record(0.5);
    /// hist.record(3.0);
    /// assert_eq!(hist.fractions(), vec![0.5, 0.5]);
    /// ```
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn fractions(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return vec![0.0; self.counts.len()];
        }
        self.counts
            .iter()
            .map(|&c| c as f64 / total as f64)
            .collect()
    }
}
