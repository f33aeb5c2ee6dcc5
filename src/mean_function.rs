//! Prior mean functions

use nalgebra::{DMatrix, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// A parametric prior mean over latent function values
///
/// A mean function maps inputs to one prior mean column per model output.
/// Unlike kernel parameters, mean-function parameters live on their natural
/// scale since mean values may be negative.
pub trait MeanFunction: fmt::Debug + Clone + PartialEq {
    /// Number of trainable parameters
    fn n_parameters(&self) -> usize;

    /// Number of output columns this mean function produces
    fn n_outputs(&self) -> usize;

    /// Return the parameter vector
    fn parameters(&self) -> DVector<f64>;

    /// Create a new mean function of the same shape from the given
    /// parameters
    fn reparameterize(
        &self,
        params: &[f64],
    ) -> Result<Self, MeanFunctionError>;

    /// Evaluate the mean at the rows of `x`, one column per output
    fn mean(&self, x: &DMatrix<f64>) -> DMatrix<f64>;

    /// Gradient of `mean(x)` with respect to each parameter, one slice per
    /// parameter
    fn mean_gradient(&self, x: &DMatrix<f64>) -> Vec<DMatrix<f64>>;
}

/// Errors from mean function construction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum MeanFunctionError {
    /// A mean function must produce at least one output column
    NoOutputs,
    /// A parameter value is infinite or NaN
    ValueNotFinite {
        /// Index of the offending parameter
        index: usize,
        /// Value given
        value: f64,
    },
    /// Too many parameters provided
    ExtraneousParameters(usize),
    /// Too few parameters provided
    MissingParameters(usize),
}

impl std::error::Error for MeanFunctionError {}

impl fmt::Display for MeanFunctionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOutputs => {
                writeln!(f, "Mean function must have at least one output")
            }
            Self::ValueNotFinite { index, value } => writeln!(
                f,
                "Mean parameter {} is not finite: {}",
                index, value
            ),
            Self::ExtraneousParameters(n) => {
                writeln!(f, "{} extra parameters provided to mean function", n)
            }
            Self::MissingParameters(n) => {
                writeln!(f, "Missing {} parameters", n)
            }
        }
    }
}

/// Mean function that is zero everywhere
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ZeroMean {
    outputs: usize,
}

impl ZeroMean {
    /// Create a new zero mean with the given number of output columns
    pub fn new(outputs: usize) -> Result<Self, MeanFunctionError> {
        if outputs == 0 {
            Err(MeanFunctionError::NoOutputs)
        } else {
            Ok(Self { outputs })
        }
    }
}

impl MeanFunction for ZeroMean {
    fn n_parameters(&self) -> usize {
        0
    }

    fn n_outputs(&self) -> usize {
        self.outputs
    }

    fn parameters(&self) -> DVector<f64> {
        DVector::zeros(0)
    }

    fn reparameterize(
        &self,
        params: &[f64],
    ) -> Result<Self, MeanFunctionError> {
        if params.is_empty() {
            Ok(self.clone())
        } else {
            Err(MeanFunctionError::ExtraneousParameters(params.len()))
        }
    }

    fn mean(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::zeros(x.nrows(), self.outputs)
    }

    fn mean_gradient(&self, _x: &DMatrix<f64>) -> Vec<DMatrix<f64>> {
        Vec::new()
    }
}

/// Mean function holding one trainable constant per output column
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ConstantMean {
    c: DVector<f64>,
}

impl ConstantMean {
    /// Create a new constant mean with the given constants
    pub fn new(c: DVector<f64>) -> Result<Self, MeanFunctionError> {
        if c.is_empty() {
            return Err(MeanFunctionError::NoOutputs);
        }
        match c.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            Some((index, value)) => Err(MeanFunctionError::ValueNotFinite {
                index,
                value: *value,
            }),
            None => Ok(Self { c }),
        }
    }

    /// Create a zero-valued constant mean with the given number of output
    /// columns
    pub fn zeros(outputs: usize) -> Result<Self, MeanFunctionError> {
        if outputs == 0 {
            Err(MeanFunctionError::NoOutputs)
        } else {
            Ok(Self {
                c: DVector::zeros(outputs),
            })
        }
    }

    /// The constants, one per output column
    #[must_use]
    pub fn constants(&self) -> &DVector<f64> {
        &self.c
    }
}

impl MeanFunction for ConstantMean {
    fn n_parameters(&self) -> usize {
        self.c.len()
    }

    fn n_outputs(&self) -> usize {
        self.c.len()
    }

    fn parameters(&self) -> DVector<f64> {
        self.c.clone()
    }

    fn reparameterize(
        &self,
        params: &[f64],
    ) -> Result<Self, MeanFunctionError> {
        use std::cmp::Ordering;
        match params.len().cmp(&self.c.len()) {
            Ordering::Equal => Self::new(DVector::from_column_slice(params)),
            Ordering::Greater => Err(MeanFunctionError::ExtraneousParameters(
                params.len() - self.c.len(),
            )),
            Ordering::Less => Err(MeanFunctionError::MissingParameters(
                self.c.len() - params.len(),
            )),
        }
    }

    fn mean(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        DMatrix::from_fn(x.nrows(), self.c.len(), |_, j| self.c[j])
    }

    fn mean_gradient(&self, x: &DMatrix<f64>) -> Vec<DMatrix<f64>> {
        let n = x.nrows();
        let p = self.c.len();
        (0..p)
            .map(|k| {
                DMatrix::from_fn(
                    n,
                    p,
                    |_, j| if j == k { 1.0 } else { 0.0 },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dvector;

    #[test]
    fn zero_mean() {
        let mean_fn = ZeroMean::new(2).unwrap();
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 2.0]);
        assert_eq!(mean_fn.mean(&x), DMatrix::zeros(3, 2));
        assert_eq!(mean_fn.n_parameters(), 0);
        assert!(mean_fn.mean_gradient(&x).is_empty());
        assert!(ZeroMean::new(0).is_err());
    }

    #[test]
    fn constant_mean() {
        let mean_fn = ConstantMean::new(dvector![1.5, -0.5]).unwrap();
        let x = DMatrix::from_column_slice(3, 1, &[0.0, 1.0, 2.0]);

        let m = mean_fn.mean(&x);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        for i in 0..3 {
            assert::close(m[(i, 0)], 1.5, 1E-12);
            assert::close(m[(i, 1)], -0.5, 1E-12);
        }

        let grad = mean_fn.mean_gradient(&x);
        assert_eq!(grad.len(), 2);
        assert_eq!(grad[0].column(0).sum(), 3.0);
        assert_eq!(grad[0].column(1).sum(), 0.0);
        assert_eq!(grad[1].column(1).sum(), 3.0);
    }

    #[test]
    fn constant_mean_reparameterize() {
        let mean_fn = ConstantMean::zeros(2).unwrap();
        let rebuilt = mean_fn.reparameterize(&[2.0, 3.0]).unwrap();
        assert_eq!(rebuilt.constants(), &dvector![2.0, 3.0]);
        assert!(mean_fn.reparameterize(&[1.0]).is_err());
        assert!(mean_fn.reparameterize(&[1.0, 2.0, 3.0]).is_err());
        assert!(ConstantMean::new(dvector![f64::NAN]).is_err());
    }
}
