//! Gaussian process regression with exact, variational, and sparse
//! inference
//!
//! The crate provides one prior (a kernel plus a mean function), one
//! observation model (a Gaussian likelihood), and six ways of fitting the
//! resulting regression problem: exact regression, a collapsed variational
//! model, sparse variational models in natural and whitened
//! parameterizations, the collapsed sparse regression bound, and the FITC
//! approximation. Configured identically, with inducing points pinned at
//! the training inputs, the six fits are mathematically equivalent — a
//! property the integration tests lean on heavily.
//!
//! ```
//! use gpr::prelude::*;
//! use nalgebra::DMatrix;
//!
//! let x = DMatrix::from_column_slice(5, 1, &[-4.0, -3.0, -2.0, -1.0, 1.0]);
//! let y = x.map(f64::sin);
//!
//! let kernel = ConstantKernel::new(1.0).unwrap()
//!     * RBFKernel::new(1.0).unwrap();
//! let model = GpRegression::train(
//!     kernel,
//!     ZeroMean::new(1).unwrap(),
//!     GaussianLikelihood::new(1E-10).unwrap(),
//!     x.clone(),
//!     y.clone(),
//! )
//! .unwrap();
//!
//! let pred = model.predict(&x).unwrap();
//! assert!((pred.mean() - &y).norm() < 1E-4);
//! ```

pub mod consts;
mod error;
pub mod inducing;
pub mod kernel;
pub mod likelihood;
pub mod mean_function;
pub mod model;
pub mod prelude;

pub use error::GpError;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
