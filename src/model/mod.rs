//! Gaussian process regression models
//!
//! Six model types share the [`GpModel`] contract: exact regression
//! ([`GpRegression`]), a variational model with the optimum collapsed
//! analytically ([`VariationalGp`]), sparse variational models in natural
//! and whitened parameterizations ([`SparseVariationalGp`]), the collapsed
//! sparse regression bound ([`SparseGpRegression`]), and the FITC
//! approximation ([`FitcRegression`]). Configured with the same kernel,
//! likelihood, and inducing points pinned at the training inputs, their
//! objectives agree with the exact evidence up to jitter-level error.

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::GpError;

mod mle;
pub use mle::OptimizeParams;

mod prediction;
pub use prediction::Prediction;

mod gpr;
pub use gpr::GpRegression;
mod vgp;
pub use vgp::VariationalGp;
mod svgp;
pub use svgp::SparseVariationalGp;
mod sgpr;
pub use sgpr::SparseGpRegression;
mod fitc;
pub use fitc::FitcRegression;

/// A regression model fit by maximizing a marginal-likelihood-like
/// objective
///
/// The flat parameter vector is ordered mean-function parameters, kernel
/// parameters (log scale), `ln` noise variance, then inducing locations if
/// the model has a trainable inducing set.
pub trait GpModel: Clone {
    /// The quantity maximized during fitting — the exact log marginal
    /// likelihood or an evidence lower bound — at the current parameters
    fn objective(&self) -> f64;

    /// Flat trainable parameter vector
    fn parameters(&self) -> DVector<f64>;

    /// Rebuild the model, refitting internal state, from a flat parameter
    /// vector
    fn reparameterize(&self, params: &[f64]) -> Result<Self, GpError>;

    /// Gradient of the objective with respect to the flat parameter vector
    fn grad_objective(&self) -> Result<DVector<f64>, GpError> {
        mle::central_difference(self)
    }

    /// Latent posterior mean and variance for each output column at the
    /// rows of `xs`
    fn predict(&self, xs: &DMatrix<f64>) -> Result<Prediction, GpError>;

    /// Maximize the objective with an iteration-capped quasi-Newton run
    fn optimize(self, max_iters: u64) -> Result<Self, GpError> {
        mle::maximize(
            self,
            &OptimizeParams::default().with_max_iters(max_iters),
        )
    }

    /// Maximize the objective with full control over the optimizer
    fn optimize_with(self, params: &OptimizeParams) -> Result<Self, GpError> {
        mle::maximize(self, params)
    }
}

/// Lower Cholesky factor of a symmetric positive-definite matrix
pub(crate) fn cholesky_lower(
    mat: DMatrix<f64>,
) -> Result<DMatrix<f64>, GpError> {
    Cholesky::new(mat)
        .map(|ch| ch.l())
        .ok_or(GpError::CholeskyFailed)
}

/// Solve L x = b for lower-triangular L
pub(crate) fn solve_lower(
    l: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> Result<DMatrix<f64>, GpError> {
    l.solve_lower_triangular(b).ok_or(GpError::CholeskyFailed)
}

/// Solve (L Lᵀ) x = b given the lower factor L
pub(crate) fn solve_chol(
    l: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> Result<DMatrix<f64>, GpError> {
    let y = solve_lower(l, b)?;
    l.transpose()
        .solve_upper_triangular(&y)
        .ok_or(GpError::CholeskyFailed)
}

/// ln det(L Lᵀ) from the lower factor L
pub(crate) fn ln_det_chol(l: &DMatrix<f64>) -> f64 {
    2.0 * l.diagonal().map(f64::ln).sum()
}

/// Squared norm of each column
pub(crate) fn col_norms_sq(m: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        m.ncols(),
        m.column_iter().map(|c| c.norm_squared()),
    )
}

/// Reject flat parameter vectors of the wrong length
pub(crate) fn check_parameter_count(
    params: &[f64],
    expected: usize,
) -> Result<(), GpError> {
    if params.len() == expected {
        Ok(())
    } else {
        Err(GpError::ParameterCount {
            expected,
            given: params.len(),
        })
    }
}

/// Concatenate component parameter vectors into one flat vector
pub(crate) fn pack_parameters(parts: &[DVector<f64>]) -> DVector<f64> {
    let len = parts.iter().map(|p| p.len()).sum();
    DVector::from_iterator(
        len,
        parts.iter().flat_map(|p| p.iter().copied()),
    )
}
