//! Bars data - synthetic "which bars are present" task

use ndarray::Array2;
use rand::Rng;
use tracing::debug;

use super::Dataset;
use crate::{Error, Result};

/// Stochastic generator of `D×D` binary images made of full horizontal and
/// vertical bars.
///
/// Each of the `2D` bars is switched on independently with probability
/// `1/(2D)`. Label bit `i < D` marks image row `i`; bit `D + j` marks image
/// column `j`. The image is flattened row-major into `D²` features.
///
/// Reproducibility is the caller's concern: pass a seeded RNG to
/// [`BarsData::generate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarsData {
    n_datapoints: usize,
    d: usize,
}

impl Default for BarsData {
    fn default() -> Self {
        Self {
            n_datapoints: 1000,
            d: 5,
        }
    }
}

impl BarsData {
    /// Generator for `n_datapoints` images of side `d`.
    #[must_use]
    pub const fn new(n_datapoints: usize, d: usize) -> Self {
        Self { n_datapoints, d }
    }

    /// Number of datapoints generated.
    #[must_use]
    pub const fn n_datapoints(&self) -> usize {
        self.n_datapoints
    }

    /// Grid side length.
    #[must_use]
    pub const fn side(&self) -> usize {
        self.d
    }

    /// Probability of each individual bar being present.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bar_probability(&self) -> f64 {
        1.0 / (2 * self.d) as f64
    }

    /// Generate a dataset using `rng`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the grid side is zero.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Dataset> {
        let Self { n_datapoints, d } = *self;
        if d == 0 {
            return Err(Error::InvalidInput("bars grid side must be positive".to_string()));
        }
        debug!(n_datapoints, d, "generating bars data");

        let bar_prob = self.bar_probability();
        let mut x = Array2::<f32>::zeros((n_datapoints, d * d));
        let mut y = Array2::<f32>::zeros((n_datapoints, 2 * d));

        for n in 0..n_datapoints {
            for bar in 0..2 * d {
                if rng.gen_bool(bar_prob) {
                    y[[n, bar]] = 1.0;
                }
            }
            for i in 0..d {
                if y[[n, i]] > 0.5 {
                    for c in 0..d {
                        x[[n, i * d + c]] = 1.0;
                    }
                }
                if y[[n, d + i]] > 0.5 {
                    for r in 0..d {
                        x[[n, r * d + i]] = 1.0;
                    }
                }
            }
        }

        Dataset::new(x, y)
    }

    /// Generate a dataset using the thread-local RNG.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the grid side is zero.
    pub fn generate_default(&self) -> Result<Dataset> {
        self.generate(&mut rand::thread_rng())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_bars_shapes() {
        let mut rng = StdRng::seed_from_u64(42);
        let data = BarsData::new(200, 4).generate(&mut rng).unwrap();

        assert_eq!(data.n_datapoints(), 200);
        assert_eq!(data.x().dim(), (200, 16));
        assert_eq!(data.y().dim(), (200, 8));
    }

    #[test]
    fn test_flagged_bars_are_all_ones() {
        let mut rng = StdRng::seed_from_u64(1);
        let d = 5;
        let data = BarsData::new(500, d).generate(&mut rng).unwrap();

        for (x, y) in data.x().rows().into_iter().zip(data.y().rows()) {
            let image = x.to_shape((d, d)).unwrap();
            for i in 0..d {
                if y[i] > 0.5 {
                    assert!(image.row(i).iter().all(|&v| v == 1.0));
                }
                if y[d + i] > 0.5 {
                    assert!(image.column(i).iter().all(|&v| v == 1.0));
                }
            }
        }
    }

    #[test]
    fn test_unflagged_image_is_empty() {
        let mut rng = StdRng::seed_from_u64(3);
        let data = BarsData::new(300, 3).generate(&mut rng).unwrap();

        for (x, y) in data.x().rows().into_iter().zip(data.y().rows()) {
            if y.iter().all(|&b| b == 0.0) {
                assert!(x.iter().all(|&v| v == 0.0));
            }
        }
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let a = BarsData::new(50, 5).generate(&mut StdRng::seed_from_u64(9)).unwrap();
        let b = BarsData::new(50, 5).generate(&mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_side_rejected() {
        let err = BarsData::new(10, 0).generate_default().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_default_parameters() {
        let bars = BarsData::default();
        assert_eq!(bars.n_datapoints(), 1000);
        assert_eq!(bars.side(), 5);
        assert!((bars.bar_probability() - 0.1).abs() < f64::EPSILON);
    }
}
