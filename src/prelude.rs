//! Re-imports for convenience

#[doc(no_inline)]
pub use crate::inducing::InducingPoints;
#[doc(no_inline)]
pub use crate::kernel::{
    AddKernel, ConstantKernel, Kernel, LinearKernel, Matern52Kernel,
    ProductKernel, RBFKernel, WhiteKernel,
};
#[doc(no_inline)]
pub use crate::likelihood::GaussianLikelihood;
#[doc(no_inline)]
pub use crate::mean_function::{ConstantMean, MeanFunction, ZeroMean};
#[doc(no_inline)]
pub use crate::model::{
    FitcRegression, GpModel, GpRegression, OptimizeParams, Prediction,
    SparseGpRegression, SparseVariationalGp, VariationalGp,
};
#[doc(no_inline)]
pub use crate::GpError;
