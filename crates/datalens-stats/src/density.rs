//! 2-D density estimation for heat-map rendering.
//!
//! A [`DensityGrid`] is a square `bins × bins` histogram over the bounding
//! box of a point cloud. [`DensityGrid::smoothed`] applies a separable
//! gaussian blur whose `sigma` is measured in cells, which is what a heat-map
//! of object positions needs to look continuous with few samples.

use std::ops::Range;

/// A square 2-D histogram of point positions.
///
/// Cells are stored row-major: `cells[y * bins + x]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    x_range: Range<f64>,
    y_range: Range<f64>,
    bins: usize,
    cells: Vec<f64>,
}

impl DensityGrid {
    /// Returns a grid with no cells.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            x_range: 0.0..0.0,
            y_range: 0.0..0.0,
            bins: 0,
            cells: vec![],
        }
    }

    /// Counts points into a `bins × bins` grid spanning their bounding box.
    ///
    /// Points are paired positionally; extra coordinates in the longer slice
    /// are ignored. Returns an [empty](Self::empty) grid when there are no
    /// points or `bins` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datalens_stats::density::DensityGrid;
    /// let grid = DensityGrid::from_points(&[0.0, 10.0], &[0.0, 10.0], 2);
    /// assert_eq!(grid.value(0, 0), 1.0);
    /// assert_eq!(grid.value(1, 1), 1.0);
    /// assert_eq!(grid.total(), 2.0);
    /// ```
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    #[must_use]
    pub fn from_points(xs: &[f64], ys: &[f64], bins: usize) -> Self {
        let len = xs.len().min(ys.len());
        if len == 0 || bins == 0 {
            return Self::empty();
        }
        let (xs, ys) = (&xs[..len], &ys[..len]);
        let x_range = padded_range(xs);
        let y_range = padded_range(ys);

        let cell_of = |v: f64, range: &Range<f64>| -> usize {
            let pos = (v - range.start) / (range.end - range.start) * bins as f64;
            (pos.floor().max(0.0) as usize).min(bins - 1)
        };

        let mut cells = vec![0.0; bins * bins];
        for (&x, &y) in xs.iter().zip(ys) {
            let cx = cell_of(x, &x_range);
            let cy = cell_of(y, &y_range);
            cells[cy * bins + cx] += 1.0;
        }

        Self {
            x_range,
            y_range,
            bins,
            cells,
        }
    }

    /// Returns a copy blurred with a gaussian kernel of `sigma` cells.
    ///
    /// The kernel is truncated at `3·sigma` and renormalized at the grid
    /// border. A non-positive `sigma` returns the grid unchanged.
    #[must_use]
    pub fn smoothed(&self, sigma: f64) -> Self {
        if self.bins == 0 || sigma.is_nan() || sigma <= 0.0 {
            return self.clone();
        }
        let kernel = gaussian_kernel(sigma);
        let n = self.bins;

        let mut horizontal = vec![0.0; n * n];
        for y in 0..n {
            let row = &self.cells[y * n..(y + 1) * n];
            for x in 0..n {
                horizontal[y * n + x] = convolve_at(x, n, &kernel, |i| row[i]);
            }
        }

        let mut cells = vec![0.0; n * n];
        for x in 0..n {
            for y in 0..n {
                cells[y * n + x] = convolve_at(y, n, &kernel, |i| horizontal[i * n + x]);
            }
        }

        Self {
            x_range: self.x_range.clone(),
            y_range: self.y_range.clone(),
            bins: n,
            cells,
        }
    }

    #[must_use]
    pub fn bins(&self) -> usize {
        self.bins
    }

    #[must_use]
    pub fn x_range(&self) -> Range<f64> {
        self.x_range.clone()
    }

    #[must_use]
    pub fn y_range(&self) -> Range<f64> {
        self.y_range.clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bins == 0
    }

    /// Returns the density at cell `(x, y)`.
    #[must_use]
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.cells[y * self.bins + x]
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.cells.iter().sum()
    }

    /// Returns the grid as rows (outer index is `y`).
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<f64>> {
        if self.bins == 0 {
            return vec![];
        }
        self.cells.chunks(self.bins).map(<[f64]>::to_vec).collect()
    }
}

fn padded_range(values: &[f64]) -> Range<f64> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max - min < f64::EPSILON {
        // all points share one coordinate
        return (min - 0.5)..(max + 0.5);
    }
    min..max
}

#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = ((3.0 * sigma).ceil() as usize).max(1);
    (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect()
}

fn convolve_at<F>(center: usize, len: usize, kernel: &[f64], sample: F) -> f64
where
    F: Fn(usize) -> f64,
{
    let radius = kernel.len() / 2;
    let mut acc = 0.0;
    let mut weight = 0.0;
    for (k, &w) in kernel.iter().enumerate() {
        let Some(i) = (center + k).checked_sub(radius) else {
            continue;
        };
        if i >= len {
            continue;
        }
        acc += w * sample(i);
        weight += w;
    }
    if weight > 0.0 { acc / weight } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_inputs() {
        assert!(DensityGrid::from_points(&[], &[], 4).is_empty());
        assert!(DensityGrid::from_points(&[1.0], &[1.0], 0).is_empty());
        assert!(DensityGrid::empty().smoothed(1.0).rows().is_empty());
    }

    #[test]
    fn test_counts_every_point() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0, 4.0];
        let ys = [4.0, 3.0, 2.0, 1.0, 0.0, 0.0];
        let grid = DensityGrid::from_points(&xs, &ys, 5);
        assert_eq!(grid.total(), 6.0);
        // max coordinates fall into the last cell
        assert_eq!(grid.value(4, 0), 2.0);
    }

    #[test]
    fn test_single_point_is_centered() {
        let grid = DensityGrid::from_points(&[7.0], &[3.0], 3);
        assert_eq!(grid.x_range(), 6.5..7.5);
        assert_eq!(grid.value(1, 1), 1.0);
    }

    #[test]
    fn test_smoothing_spreads_mass() {
        let grid = DensityGrid::from_points(&[0.0, 0.0, 8.0], &[0.0, 0.0, 8.0], 9);
        let smooth = grid.smoothed(1.0);
        assert!(smooth.value(1, 1) > 0.0);
        assert!(smooth.value(0, 0) < grid.value(0, 0));
        assert_eq!(grid.smoothed(0.0), grid);
    }
}
