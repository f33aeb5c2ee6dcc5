//! Crate-wide error type

use std::fmt;

use crate::inducing::InducingPointsError;
use crate::kernel::{CovGradError, KernelError};
use crate::likelihood::LikelihoodError;
use crate::mean_function::MeanFunctionError;

/// Errors from building, fitting, or predicting with a Gaussian process
/// model
#[derive(Debug, Clone, PartialEq)]
pub enum GpError {
    /// An invalid kernel or kernel parameter vector
    Kernel(KernelError),
    /// The covariance gradient could not be computed
    CovGrad(CovGradError),
    /// An invalid mean function or mean-function parameter vector
    MeanFunction(MeanFunctionError),
    /// An invalid likelihood or likelihood parameter vector
    Likelihood(LikelihoodError),
    /// An invalid inducing point set
    Inducing(InducingPointsError),
    /// A covariance matrix was not positive definite
    CholeskyFailed,
    /// Rows or columns of the supplied data do not line up
    DataMismatch {
        /// What disagreed
        what: &'static str,
        /// Number of rows/columns expected
        expected: usize,
        /// Number of rows/columns given
        given: usize,
    },
    /// A flat parameter vector of the wrong length was supplied
    ParameterCount {
        /// Length the model expects
        expected: usize,
        /// Length given
        given: usize,
    },
    /// The optimizer failed to run
    Optimize(String),
}

impl std::error::Error for GpError {}

impl fmt::Display for GpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel(e) => write!(f, "kernel error: {e}"),
            Self::CovGrad(e) => write!(f, "covariance gradient error: {e}"),
            Self::MeanFunction(e) => write!(f, "mean function error: {e}"),
            Self::Likelihood(e) => write!(f, "likelihood error: {e}"),
            Self::Inducing(e) => write!(f, "inducing point error: {e}"),
            Self::CholeskyFailed => write!(
                f,
                "covariance matrix is not positive definite; consider more \
                 noise or jitter"
            ),
            Self::DataMismatch {
                what,
                expected,
                given,
            } => write!(
                f,
                "data mismatch in {what}: expected {expected}, given {given}"
            ),
            Self::ParameterCount { expected, given } => write!(
                f,
                "parameter vector has length {given} but the model has \
                 {expected} parameters"
            ),
            Self::Optimize(msg) => write!(f, "optimization failed: {msg}"),
        }
    }
}

impl From<KernelError> for GpError {
    fn from(e: KernelError) -> Self {
        Self::Kernel(e)
    }
}

impl From<CovGradError> for GpError {
    fn from(e: CovGradError) -> Self {
        Self::CovGrad(e)
    }
}

impl From<MeanFunctionError> for GpError {
    fn from(e: MeanFunctionError) -> Self {
        Self::MeanFunction(e)
    }
}

impl From<LikelihoodError> for GpError {
    fn from(e: LikelihoodError) -> Self {
        Self::Likelihood(e)
    }
}

impl From<InducingPointsError> for GpError {
    fn from(e: InducingPointsError) -> Self {
        Self::Inducing(e)
    }
}
