use super::{CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{dvector, DMatrix, DVector, Dim, Matrix};
use std::f64;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

/// Linear (dot-product) kernel
///
/// ```math
///     K(\mathbf{x}, \mathbf{x'}) = \sigma^2 \langle \mathbf{x}, \mathbf{x'} \rangle
/// ```
///
/// Not stationary; a GP with this kernel is Bayesian linear regression
/// through the origin.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct LinearKernel {
    variance: f64,
}

impl LinearKernel {
    /// Create a new linear kernel with the given variance
    pub fn new(variance: f64) -> Result<Self, KernelError> {
        if variance > 0.0 && variance.is_finite() {
            Ok(Self { variance })
        } else {
            Err(KernelError::ParameterOutOfBounds {
                name: "variance".to_string(),
                given: variance,
                bounds: (0.0, f64::INFINITY),
            })
        }
    }

    /// Create a new `LinearKernel` without checking the parameter
    #[must_use]
    pub fn new_unchecked(variance: f64) -> Self {
        Self { variance }
    }

    /// The variance
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.variance
    }
}

impl Default for LinearKernel {
    fn default() -> Self {
        Self { variance: 1.0 }
    }
}

impl Kernel for LinearKernel {
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
        let m = x1.nrows();
        let n = x2.nrows();

        let mut dm: DMatrix<f64> = DMatrix::zeros(m, n);
        for i in 0..m {
            for j in 0..n {
                dm[(i, j)] = self.variance * x1.row(i).dot(&x2.row(j));
            }
        }
        dm
    }

    fn is_stationary(&self) -> bool {
        false
    }

    fn diag<R, C, S>(&self, x: &Matrix<f64, R, C, S>) -> DVector<f64>
    where
        R: Dim,
        C: Dim,
        S: Storage<f64, R, C>,
    {
        DVector::from_iterator(
            x.nrows(),
            (0..x.nrows()).map(|i| self.variance * x.row(i).norm_squared()),
        )
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.variance.ln()]
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
        // linear in σ², so d/d ln σ² is the covariance itself
        let grad = CovGrad::new(&[cov.clone()])?;
        Ok((cov, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_kernel_values() {
        let kernel = LinearKernel::new(2.0).unwrap();
        let x = DMatrix::from_column_slice(3, 1, &[1.0, 2.0, 3.0]);

        let cov = kernel.covariance(&x, &x);
        let expected_cov = DMatrix::from_row_slice(
            3,
            3,
            &[2.0, 4.0, 6.0, 4.0, 8.0, 12.0, 6.0, 12.0, 18.0],
        );
        assert!(cov.relative_eq(&expected_cov, 1E-12, 1E-12));

        let diag = kernel.diag(&x);
        let expected_diag = DVector::from_column_slice(&[2.0, 8.0, 18.0]);
        assert!(diag.relative_eq(&expected_diag, 1E-12, 1E-12));

        assert!(!kernel.is_stationary());
    }

    #[test]
    fn linear_kernel_gradient() -> Result<(), CovGradError> {
        let kernel = LinearKernel::new(0.5).unwrap();
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);

        let (cov, grad) = kernel.covariance_with_gradient(&x)?;
        assert!(grad[0].relative_eq(&cov, 1E-12, 1E-12));

        let expected_cov =
            DMatrix::from_row_slice(2, 2, &[2.5, 5.5, 5.5, 12.5]);
        assert!(cov.relative_eq(&expected_cov, 1E-12, 1E-12));
        Ok(())
    }

    #[test]
    fn parameters_roundtrip() {
        let kernel = LinearKernel::new(0.25).unwrap();
        let rebuilt = kernel
            .reparameterize(kernel.parameters().as_slice())
            .unwrap();
        assert::close(rebuilt.variance(), 0.25, 1E-12);
    }
}
