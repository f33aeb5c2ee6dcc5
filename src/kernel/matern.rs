use super::{scaled_sqdist, CovGrad, CovGradError, Kernel, KernelError};
use nalgebra::base::constraint::{SameNumberOfColumns, ShapeConstraint};
use nalgebra::base::storage::Storage;
use nalgebra::{dvector, DMatrix, DVector, Dim, Matrix};
use std::f64;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

const SQRT_5: f64 = 2.236_067_977_499_789_6;

/// Matérn kernel with smoothness ν = 5/2
///
/// ```math
///     K(r) = \left(1 + \frac{\sqrt{5}r}{l} + \frac{5r^2}{3l^2}\right)
///            \exp\left(-\frac{\sqrt{5}r}{l}\right)
/// ```
///
/// Sample paths are twice differentiable, making this the usual less-smooth
/// alternative to the RBF kernel.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct Matern52Kernel {
    length_scale: f64,
}

impl Matern52Kernel {
    /// Create a new Matérn 5/2 kernel with the given length scale
    pub fn new(length_scale: f64) -> Result<Self, KernelError> {
        if length_scale <= 0.0 {
            Err(KernelError::ParameterOutOfBounds {
                name: "length_scale".to_string(),
                given: length_scale,
                bounds: (0.0, f64::INFINITY),
            })
        } else {
            Ok(Self { length_scale })
        }
    }

    /// Create a new `Matern52Kernel` without checking parameters
    #[must_use]
    pub fn new_unchecked(length_scale: f64) -> Self {
        Self { length_scale }
    }

    /// The length scale
    #[must_use]
    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    // k(s) with s = √5 r / l
    #[inline]
    fn cov_from_s(s: f64) -> f64 {
        (1.0 + s + s * s / 3.0) * (-s).exp()
    }
}

impl Default for Matern52Kernel {
    fn default() -> Self {
        Self { length_scale: 1.0 }
    }
}

impl Kernel for Matern52Kernel {
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
                let d2 =
                    scaled_sqdist(&x1.row(i), &x2.row(j), self.length_scale);
                let s = SQRT_5 * d2.sqrt();
                dm[(i, j)] = Self::cov_from_s(s);
            }
        }

        dm
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
        DVector::repeat(x.nrows(), 1.0)
    }

    fn parameters(&self) -> DVector<f64> {
        dvector![self.length_scale.ln()]
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
        let n = x.nrows();

        let mut dm = DMatrix::zeros(n, n);
        let mut grad = CovGrad::zeros(n, 1);

        for i in 0..n {
            for j in 0..i {
                let d2 =
                    scaled_sqdist(&x.row(i), &x.row(j), self.length_scale);
                let s = SQRT_5 * d2.sqrt();
                let cov_ij = Self::cov_from_s(s);

                dm[(i, j)] = cov_ij;
                dm[(j, i)] = cov_ij;

                // d/d ln l of (1 + s + s²/3) e⁻ˢ with s ∝ 1/l is
                // (s²/3)(1 + s) e⁻ˢ
                let dc_dl = s * s / 3.0 * (1.0 + s) * (-s).exp();
                grad[(i, j, 0)] = dc_dl;
                grad[(j, i, 0)] = dc_dl;
            }
            dm[(i, i)] = 1.0;
        }

        Ok((dm, grad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matern52_simple() {
        let kernel = Matern52Kernel::default();
        assert::close(kernel.parameters()[0], 0.0, 1E-10);
        assert_eq!(
            kernel,
            kernel
                .reparameterize(&[0.0])
                .expect("Should create kernel from params")
        );
        assert!(kernel.is_stationary());
    }

    #[test]
    fn matern52_unit_diag() {
        let xs = DVector::from_column_slice(&[0.0, 0.5, 1.5, 4.0]);
        let kernel = Matern52Kernel::new(2.0).unwrap();

        let cov = kernel.covariance(&xs, &xs);
        for i in 0..4 {
            assert::close(cov[(i, i)], 1.0, 1E-12);
        }
        assert!(cov.relative_eq(&cov.transpose(), 1E-12, 1E-12));
        // farther pairs are less correlated
        assert!(cov[(0, 1)] > cov[(0, 2)]);
        assert!(cov[(0, 2)] > cov[(0, 3)]);
    }

    #[test]
    fn matern52_gradient_matches_finite_difference()
    -> Result<(), CovGradError> {
        let x = DMatrix::from_column_slice(4, 1, &[-1.5, 0.0, 0.7, 2.2]);
        let kernel = Matern52Kernel::new(1.3).unwrap();

        let (cov, grad) = kernel.covariance_with_gradient(&x)?;
        assert!(cov.relative_eq(&kernel.covariance(&x, &x), 1E-12, 1E-12));

        let h = 1E-6;
        let theta = kernel.parameters()[0];
        let hi = kernel.reparameterize(&[theta + h]).unwrap();
        let lo = kernel.reparameterize(&[theta - h]).unwrap();
        let fd = (hi.covariance(&x, &x) - lo.covariance(&x, &x))
            .map(|e| e / (2.0 * h));

        assert!(grad[0].relative_eq(&fd, 1E-6, 1E-6));
        Ok(())
    }
}
