use super::{CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{dvector, DMatrix, DVector, Dim, Matrix};
use std::f64;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Constant kernel
///
/// Returns the same value for every pair of points. Multiplying another
/// kernel by a `ConstantKernel` scales its signal variance.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct ConstantKernel {
    value: f64,
}

impl ConstantKernel {
    /// Create a new constant kernel with the given value
    pub fn new(value: f64) -> Result<Self, KernelError> {
        if value > 0.0 && value.is_finite() {
            Ok(Self { value })
        } else {
            Err(KernelError::ParameterOutOfBounds {
                name: "value".to_string(),
                given: value,
                bounds: (0.0, f64::INFINITY),
            })
        }
    }

    /// Create a new `ConstantKernel` without checking the parameter
    #[must_use]
    pub fn new_unchecked(value: f64) -> Self {
        Self { value }
    }

    /// The constant value
    #[must_use]
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Default for ConstantKernel {
    fn default() -> Self {
        Self { value: 1.0 }
    }
}

impl Kernel for ConstantKernel {
    fn n_parameters(&self) -> usize {
        1
    }

    fn covariance<R1, R2, C1, C2, S1, S2>(
        &self,
        x1: &Matrix<f64, R1, C1, S1>,
        x2: &Matrix<f64, R2, C2, S2>,
    ) -> DMatrix<f64>
    where
        R1: Dim,
        R2: Dim,
        C1: Dim,
        C2: Dim,
        S1: Storage<f64, R1, C1>,
        S2: Storage<f64, R2, C2>,
        ShapeConstraint: SameNumberOfColumns<C1, C2>,
    {
        DMatrix::from_element(x1.nrows(), x2.nrows(), self.value)
    }

    fn is_stationary(&self) -> bool {
        true
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        DVector::from_element(x.nrows(), self.value)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.value.ln()]
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, KernelError> {
        match params {
            [] => Err(KernelError::MissingParameters(1)),
            [value] => Self::new(value.exp()),
            _ => Err(KernelError::ExtraneousParameters(params.len() - 1)),
        }
    }

    fn covariance_with_gradient<R, C, S>(
        &self,
        x: &Matrix<f64, R, C, S>,
    ) -> Result<(DMatrix<f64>, CovGrad), CovGradError>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        let cov = self.covariance(x, x);
        // d/d ln v of a constant-v matrix is the matrix itself
        let grad = CovGrad::new(&[cov.clone()])?;
        Ok((cov, grad))
    }
}
