//! Observation - one appended record in a metric stream

use std::fmt;

use ndarray::{ArrayBase, ArrayD, Data, Dimension, IxDyn};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single observation appended to a named metric stream.
///
/// Scalars have an empty shape. Arrays are stored row-major, so
/// `values.len()` always equals the product of `shape`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    shape: Vec<usize>,
    values: Vec<f64>,
}

impl Observation {
    /// Create a scalar observation.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: vec![value],
        }
    }

    /// Create an array observation from a shape and row-major values.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the element count of `shape` overflows or
    /// does not match the number of values.
    pub fn array(shape: Vec<usize>, values: Vec<f64>) -> Result<Self> {
        let expected = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| {
                Error::InvalidInput(format!("observation shape {shape:?} overflows usize"))
            })?;
        if expected != values.len() {
            return Err(Error::InvalidInput(format!(
                "observation shape {shape:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Create an observation from an `f32` ndarray (model weights are usually `f32`).
    #[must_use]
    pub fn from_f32_array<S, D>(array: &ArrayBase<S, D>) -> Self
    where
        S: Data<Elem = f32>,
        D: Dimension,
    {
        Self {
            shape: array.shape().to_vec(),
            values: array.iter().map(|&v| f64::from(v)).collect(),
        }
    }

    /// Get the shape (empty for scalars).
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the row-major values.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Check whether this observation is a scalar.
    #[must_use]
    pub fn is_scalar(&self) -> bool {
        self.shape.is_empty()
    }

    /// Get the scalar value, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        if self.is_scalar() {
            self.values.first().copied()
        } else {
            None
        }
    }

    /// Convert into a dynamically shaped ndarray.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if shape and values disagree (cannot happen for
    /// observations built through the public constructors).
    pub fn to_array(&self) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.values.clone())
            .map_err(|e| Error::InvalidInput(format!("observation shape mismatch: {e}")))
    }
}

impl From<f64> for Observation {
    fn from(value: f64) -> Self {
        Self::scalar(value)
    }
}

impl From<Vec<f64>> for Observation {
    fn from(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values,
        }
    }
}

impl<S, D> From<&ArrayBase<S, D>> for Observation
where
    S: Data<Elem = f64>,
    D: Dimension,
{
    fn from(array: &ArrayBase<S, D>) -> Self {
        Self {
            shape: array.shape().to_vec(),
            values: array.iter().copied().collect(),
        }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_scalar() {
            Some(value) => write!(f, "{value}"),
            None => write!(f, "<array {:?}>", self.shape),
        }
    }
}
