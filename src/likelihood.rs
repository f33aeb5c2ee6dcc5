//! Observation likelihoods

use nalgebra::{dvector, DVector};
use std::fmt;

#[cfg(feature = "serde1")]
use serde::{Deserialize, Serialize};

use crate::consts::LN_2PI;

/// Gaussian observation model with homoscedastic noise variance
///
/// The trainable parameter is `ln variance`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde1", serde(rename_all = "snake_case"))]
pub struct GaussianLikelihood {
    variance: f64,
}

impl GaussianLikelihood {
    /// Create a new Gaussian likelihood with the given noise variance
    pub fn new(variance: f64) -> Result<Self, LikelihoodError> {
        if !variance.is_finite() {
            Err(LikelihoodError::VarianceNotFinite { variance })
        } else if variance <= 0.0 {
            Err(LikelihoodError::VarianceTooLow { variance })
        } else {
            Ok(Self { variance })
        }
    }

    /// Create a new `GaussianLikelihood` without checking the parameter
    #[must_use]
    pub fn new_unchecked(variance: f64) -> Self {
        Self { variance }
    }

    /// The noise variance
    #[must_use]
    pub fn variance(&self) -> f64 {
        self.variance
    }

    /// Number of trainable parameters
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        1
    }

    /// Return the log-scale parameter vector
    #[must_use]
    pub fn parameters(&self) -> DVector<f64> {
        dvector![self.variance.ln()]
    }

    /// Create a new likelihood from the given log-scale parameters
    pub fn reparameterize(
        &self,
        params: &[f64],
    ) -> Result<Self, LikelihoodError> {
        match params {
            [] => Err(LikelihoodError::MissingParameters(1)),
            [value] => Self::new(value.exp()),
            _ => Err(LikelihoodError::ExtraneousParameters(params.len() - 1)),
        }
    }

    /// E_q[ln N(y | f, σ²)] where q(f) is Gaussian with mean `f_mean` and
    /// variance `f_var`
    #[must_use]
    pub fn variational_expectation(
        &self,
        y: f64,
        f_mean: f64,
        f_var: f64,
    ) -> f64 {
        let r = y - f_mean;
        -0.5 * LN_2PI
            - 0.5 * self.variance.ln()
            - (r * r + f_var) / (2.0 * self.variance)
    }

    /// Push a latent predictive mean and variance through the observation
    /// model
    #[must_use]
    pub fn predict_mean_and_var(
        &self,
        f_mean: f64,
        f_var: f64,
    ) -> (f64, f64) {
        (f_mean, f_var + self.variance)
    }
}

/// Errors from likelihood construction
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde1", derive(Serialize, Deserialize))]
pub enum LikelihoodError {
    /// The variance parameter is less than or equal to zero
    VarianceTooLow {
        /// Value given
        variance: f64,
    },
    /// The variance parameter is infinite or NaN
    VarianceNotFinite {
        /// Value given
        variance: f64,
    },
    /// Too many parameters provided
    ExtraneousParameters(usize),
    /// Too few parameters provided
    MissingParameters(usize),
}

impl std::error::Error for LikelihoodError {}

impl fmt::Display for LikelihoodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VarianceTooLow { variance } => {
                writeln!(f, "Noise variance must be positive, given: {variance}")
            }
            Self::VarianceNotFinite { variance } => {
                writeln!(f, "Noise variance is not finite: {variance}")
            }
            Self::ExtraneousParameters(n) => {
                writeln!(f, "{n} extra parameters provided to likelihood")
            }
            Self::MissingParameters(n) => {
                writeln!(f, "Missing {n} parameters")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::HALF_LN_2PI;

    #[test]
    fn bad_variances_are_rejected() {
        assert!(GaussianLikelihood::new(0.0).is_err());
        assert!(GaussianLikelihood::new(-1.0).is_err());
        assert!(GaussianLikelihood::new(f64::INFINITY).is_err());
        assert!(GaussianLikelihood::new(1.0).is_ok());
    }

    #[test]
    fn parameters_roundtrip() {
        let lik = GaussianLikelihood::new(0.25).unwrap();
        let rebuilt = lik.reparameterize(lik.parameters().as_slice()).unwrap();
        assert::close(rebuilt.variance(), 0.25, 1E-12);
        assert!(lik.reparameterize(&[]).is_err());
        assert!(lik.reparameterize(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn variational_expectation_at_zero_var_is_log_density() {
        let lik = GaussianLikelihood::new(2.0).unwrap();
        // with f_var = 0 this is ln N(y | f_mean, σ²)
        let expected =
            -HALF_LN_2PI - 0.5 * 2.0_f64.ln() - 0.5_f64.powi(2) / (2.0 * 2.0);
        assert::close(
            lik.variational_expectation(1.0, 0.5, 0.0),
            expected,
            1E-12,
        );
        // extra marginal variance only subtracts v/2σ²
        assert::close(
            lik.variational_expectation(1.0, 0.5, 0.8),
            expected - 0.8 / 4.0,
            1E-12,
        );
    }

    #[test]
    fn predictive_adds_noise() {
        let lik = GaussianLikelihood::new(0.3).unwrap();
        let (m, v) = lik.predict_mean_and_var(1.2, 0.5);
        assert::close(m, 1.2, 1E-12);
        assert::close(v, 0.8, 1E-12);
    }
}
