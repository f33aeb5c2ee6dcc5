//! Inducing point sets for sparse approximations

use nalgebra::{DMatrix, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Locations of the inducing variables used by the sparse models
///
/// A fixed set is excluded from optimization; a trainable set contributes
/// its (natural-scale) coordinates to the model parameter vector.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct InducingPoints {
    z: DMatrix<f64>,
    trainable: bool,
}

impl InducingPoints {
    /// Create a set of inducing points excluded from optimization
    pub fn fixed(z: DMatrix<f64>) -> Result<Self, InducingPointsError> {
        if z.nrows() == 0 {
            Err(InducingPointsError::NoPoints)
        } else {
            Ok(Self {
                z,
                trainable: false,
            })
        }
    }

    /// Create a set of inducing points whose locations are optimized with
    /// the model hyperparameters
    pub fn trainable(z: DMatrix<f64>) -> Result<Self, InducingPointsError> {
        if z.nrows() == 0 {
            Err(InducingPointsError::NoPoints)
        } else {
            Ok(Self { z, trainable: true })
        }
    }

    /// The inducing locations, one per row
    #[must_use]
    pub fn z(&self) -> &DMatrix<f64> {
        &self.z
    }

    /// Number of inducing points
    #[must_use]
    pub fn n_points(&self) -> usize {
        self.z.nrows()
    }

    /// Whether the locations are optimized
    #[must_use]
    pub fn is_trainable(&self) -> bool {
        self.trainable
    }

    /// Number of trainable parameters
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        if self.trainable {
            self.z.nrows() * self.z.ncols()
        } else {
            0
        }
    }

    /// Return the parameter vector (column-major flattened locations, or
    /// empty when fixed)
    #[must_use]
    pub fn parameters(&self) -> DVector<f64> {
        if self.trainable {
            DVector::from_column_slice(self.z.as_slice())
        } else {
            DVector::zeros(0)
        }
    }

    /// Create a new set of the same shape from the given parameters
    pub fn reparameterize(
        &self,
        params: &[f64],
    ) -> Result<Self, InducingPointsError> {
        let expected = self.n_parameters();
        if params.len() != expected {
            return Err(InducingPointsError::ParameterCount {
                expected,
                given: params.len(),
            });
        }
        if self.trainable {
            Ok(Self {
                z: DMatrix::from_column_slice(
                    self.z.nrows(),
                    self.z.ncols(),
                    params,
                ),
                trainable: true,
            })
        } else {
            Ok(self.clone())
        }
    }
}

/// Errors from inducing point construction
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum InducingPointsError {
    /// An inducing set cannot be empty
    NoPoints,
    /// Wrong number of parameters for the set's shape
    ParameterCount {
        /// Number expected
        expected: usize,
        /// Number given
        given: usize,
    },
}

impl std::error::Error for InducingPointsError {}

impl fmt::Display for InducingPointsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPoints => writeln!(f, "Inducing point set is empty"),
            Self::ParameterCount { expected, given } => writeln!(
                f,
                "Inducing set expects {expected} parameters, given {given}"
            ),
        }
    }
}
