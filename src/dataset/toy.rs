//! Toy data - two fixed, linearly separable patterns

use ndarray::{array, concatenate, Array2, ArrayView2, Axis};
use tracing::info;

use super::{Dataset, Split};
use crate::Result;

/// Small fixed two-class dataset for smoke tests.
///
/// Rows `[1,1,1,1,0,0,0,0] → class 0` and `[0,0,0,0,1,1,1,1] → class 1`,
/// repeated 10 times for `train` and twice for `valid`/`test`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToyData;

impl ToyData {
    /// Build the toy dataset for a split name.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSplit` for names other than `train`, `valid`, `test`.
    pub fn load(which_set: &str) -> Result<Dataset> {
        Self::for_split(which_set.parse()?)
    }

    /// Build the toy dataset for a split.
    ///
    /// # Errors
    ///
    /// Never fails for a parsed split; the `Result` mirrors the other loaders.
    pub fn for_split(split: Split) -> Result<Dataset> {
        info!(%split, "generating toy data");

        let x: Array2<f32> = array![
            [1., 1., 1., 1., 0., 0., 0., 0.],
            [0., 0., 0., 0., 1., 1., 1., 1.]
        ];
        let y: Array2<f32> = array![[1., 0.], [0., 1.]];

        let copies = match split {
            Split::Train => 10,
            Split::Valid | Split::Test => 2,
        };

        Dataset::new(tile(&x.view(), copies)?, tile(&y.view(), copies)?)
    }
}

fn tile(block: &ArrayView2<'_, f32>, copies: usize) -> Result<Array2<f32>> {
    let views = vec![block.view(); copies];
    Ok(concatenate(Axis(0), &views)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_toy_sizes_per_split() {
        assert_eq!(ToyData::load("train").unwrap().n_datapoints(), 20);
        assert_eq!(ToyData::load("valid").unwrap().n_datapoints(), 4);
        assert_eq!(ToyData::load("test").unwrap().n_datapoints(), 4);
    }

    #[test]
    fn test_toy_is_constant() {
        let a = ToyData::load("train").unwrap();
        let b = ToyData::load("train").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.x().row(0).to_vec(), vec![1., 1., 1., 1., 0., 0., 0., 0.]);
        assert_eq!(a.y().row(1).to_vec(), vec![0., 1.]);
        assert_eq!(a.x().row(2), a.x().row(0));
    }

    #[test]
    fn test_toy_unknown_split() {
        assert!(matches!(ToyData::load("holdout"), Err(Error::InvalidSplit(_))));
    }
}
