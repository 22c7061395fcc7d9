//! MNIST loader - binarized digits with one-hot labels
//!
//! The archive is zstd-compressed JSON holding the three pre-partitioned
//! splits, each as pixel rows in `[0, 1]` plus integer labels.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{random_permutation, Dataset, Split};
use crate::{Error, Result};

/// Number of digit classes.
pub const MNIST_CLASSES: usize = 10;

/// Default archive file name.
pub const DEFAULT_MNIST_FILE: &str = "mnist.json.zst";

/// Pixel threshold for binarization.
const BINARIZE_THRESHOLD: f32 = 0.5;

/// ZSTD level used when writing archives.
const ZSTD_LEVEL: i32 = 3;

/// One split of the raw archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MnistSplit {
    /// Pixel rows, intensities in `[0, 1]`.
    pub images: Vec<Vec<f32>>,
    /// Digit label per row.
    pub labels: Vec<u8>,
}

/// Raw archive: the three pre-partitioned splits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MnistArchive {
    /// Training split.
    pub train: MnistSplit,
    /// Validation split.
    pub valid: MnistSplit,
    /// Test split.
    pub test: MnistSplit,
}

impl MnistArchive {
    /// Read a compressed archive.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the file is missing or not valid zstd, and `Json`
    /// if the payload cannot be decoded.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Storage(format!("Failed to open MNIST archive {}: {e}", path.display()))
        })?;
        let decoder = zstd::stream::read::Decoder::new(file)
            .map_err(|e| Error::Storage(format!("ZSTD decompression failed: {e}")))?;
        Ok(serde_json::from_reader(decoder)?)
    }

    /// Write a compressed archive.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), ZSTD_LEVEL)
            .map_err(|e| Error::Storage(format!("ZSTD compression failed: {e}")))?;
        serde_json::to_writer(&mut encoder, self)?;
        let mut writer = encoder
            .finish()
            .map_err(|e| Error::Storage(format!("ZSTD compression failed: {e}")))?;
        writer.flush()?;
        Ok(())
    }

    /// Take one split out of the archive.
    #[must_use]
    pub fn into_split(self, split: Split) -> MnistSplit {
        match split {
            Split::Train => self.train,
            Split::Valid => self.valid,
            Split::Test => self.test,
        }
    }
}

/// Loads one MNIST split and applies the fixed preprocessing:
///
/// 1. lock-step random row permutation of images and labels
/// 2. binarization, `pixel > 0.5 → 1.0` else `0.0`
/// 3. one-hot labels over [`MNIST_CLASSES`] classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MnistLoader {
    path: PathBuf,
    n_datapoints: Option<usize>,
}

impl Default for MnistLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MNIST_FILE)
    }
}

impl MnistLoader {
    /// Loader reading the archive at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            n_datapoints: None,
        }
    }

    /// Keep only the first `n` rows (after permutation).
    #[must_use]
    pub const fn with_n_datapoints(mut self, n: usize) -> Self {
        self.n_datapoints = Some(n);
        self
    }

    /// Archive path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and preprocess the split named `which_set`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSplit` for an unknown split name (before touching the
    /// file), archive errors from [`MnistArchive::read`], and
    /// `DataIntegrity` if the split is inconsistent.
    pub fn load<R: Rng + ?Sized>(&self, which_set: &str, rng: &mut R) -> Result<Dataset> {
        self.load_split(which_set.parse()?, rng)
    }

    /// Load and preprocess one split.
    ///
    /// # Errors
    ///
    /// See [`MnistLoader::load`].
    pub fn load_split<R: Rng + ?Sized>(&self, split: Split, rng: &mut R) -> Result<Dataset> {
        info!(%split, path = %self.path.display(), "loading MNIST data");
        let raw = MnistArchive::read(&self.path)?.into_split(split);
        let data = preprocess(&raw, rng)?;

        match self.n_datapoints {
            None => Ok(data),
            Some(n) if n <= data.n_datapoints() => {
                let (x, y) = data.into_parts();
                Dataset::new(
                    x.slice_move(ndarray::s![..n, ..]),
                    y.slice_move(ndarray::s![..n, ..]),
                )
            }
            Some(n) => Err(Error::InvalidInput(format!(
                "requested {n} datapoints, split '{split}' has {}",
                data.n_datapoints()
            ))),
        }
    }
}

/// Permute, binarize and one-hot encode a raw split.
///
/// # Errors
///
/// Returns `DataIntegrity` if image and label counts differ, image rows have
/// different lengths, or a label is not a digit.
pub fn preprocess<R: Rng + ?Sized>(raw: &MnistSplit, rng: &mut R) -> Result<Dataset> {
    let n = raw.images.len();
    if n != raw.labels.len() {
        return Err(Error::DataIntegrity(format!(
            "{n} images but {} labels",
            raw.labels.len()
        )));
    }

    let width = raw.images.first().map_or(0, Vec::len);
    if let Some(row) = raw.images.iter().position(|img| img.len() != width) {
        return Err(Error::DataIntegrity(format!(
            "image {row} has {} pixels, expected {width}",
            raw.images[row].len()
        )));
    }

    let perm = random_permutation(n, rng);
    let mut x = Array2::<f32>::zeros((n, width));
    let mut y = Array2::<f32>::zeros((n, MNIST_CLASSES));

    for (dst, &src) in perm.iter().enumerate() {
        for (pixel, &value) in x.row_mut(dst).iter_mut().zip(&raw.images[src]) {
            *pixel = if value > BINARIZE_THRESHOLD { 1.0 } else { 0.0 };
        }

        let label = usize::from(raw.labels[src]);
        if label >= MNIST_CLASSES {
            return Err(Error::DataIntegrity(format!(
                "label {label} at row {src} is not a digit"
            )));
        }
        y[[dst, label]] = 1.0;
    }

    Dataset::new(x, y)
}
