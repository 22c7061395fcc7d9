//! Datasets for experiment runs
//!
//! A [`Dataset`] is a pair of row-aligned matrices: features `x` and labels
//! `y`. It is built once by a generator or loader and never mutated.
//!
//! | Source | Features | Labels |
//! |---|---|---|
//! | [`ToyData`] | 8 binary columns, two fixed patterns | 2-class one-hot |
//! | [`BarsData`] | `D×D` binary image, flattened | `2D` bar activations |
//! | [`MnistLoader`] | 784 binarized pixels | 10-class one-hot |
//!
//! ## Usage
//!
//! ```rust
//! use lab_runner::dataset::{BarsData, ToyData};
//! use rand::SeedableRng;
//!
//! let toy = ToyData::load("train")?;
//! assert_eq!(toy.n_datapoints(), 20);
//!
//! let mut rng = rand::rngs::StdRng::seed_from_u64(7);
//! let bars = BarsData::new(500, 5).generate(&mut rng)?;
//! assert_eq!(bars.x().ncols(), 25);
//! assert_eq!(bars.y().ncols(), 10);
//! # Ok::<(), lab_runner::Error>(())
//! ```

mod bars;
mod mnist;
mod permute;
mod toy;

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::Rng;

pub use bars::BarsData;
pub use mnist::{
    preprocess as preprocess_mnist, MnistArchive, MnistLoader, MnistSplit, DEFAULT_MNIST_FILE,
    MNIST_CLASSES,
};
pub use permute::{permute_cols, permute_cols_all, random_permutation};
pub use toy::ToyData;

use crate::{Error, Result};

/// Dataset partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Split {
    /// Training partition.
    Train,
    /// Validation partition.
    Valid,
    /// Test partition.
    Test,
}

impl Split {
    /// All splits, in canonical order.
    pub const ALL: [Self; 3] = [Self::Train, Self::Valid, Self::Test];

    /// Split name as accepted by [`FromStr`].
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        }
    }
}

impl FromStr for Split {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Self::Train),
            "valid" => Ok(Self::Valid),
            "test" => Ok(Self::Test),
            other => Err(Error::InvalidSplit(other.to_string())),
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable feature/label matrices with one row per datapoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Build a dataset from row-aligned matrices.
    ///
    /// # Errors
    ///
    /// Returns `DataIntegrity` if `x` and `y` have different row counts.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(Error::DataIntegrity(format!(
                "feature rows ({}) != label rows ({})",
                x.nrows(),
                y.nrows()
            )));
        }
        Ok(Self { x, y })
    }

    /// Feature matrix (`n_datapoints × n_features`).
    #[must_use]
    pub const fn x(&self) -> &Array2<f32> {
        &self.x
    }

    /// Label matrix (`n_datapoints × n_labels`).
    #[must_use]
    pub const fn y(&self) -> &Array2<f32> {
        &self.y
    }

    /// Number of datapoints.
    #[must_use]
    pub fn n_datapoints(&self) -> usize {
        self.x.nrows()
    }

    /// Number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Consume the dataset, returning `(x, y)`.
    #[must_use]
    pub fn into_parts(self) -> (Array2<f32>, Array2<f32>) {
        (self.x, self.y)
    }

    /// New dataset with feature columns reordered.
    ///
    /// See [`permute_cols`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if `idx` is not a permutation of the columns.
    pub fn permute_cols<R: Rng + ?Sized>(
        &self,
        idx: Option<&[usize]>,
        rng: &mut R,
    ) -> Result<(Self, Vec<usize>)> {
        let (x, idx) = permute_cols(&self.x, idx, rng)?;
        Ok((
            Self {
                x,
                y: self.y.clone(),
            },
            idx,
        ))
    }
}
