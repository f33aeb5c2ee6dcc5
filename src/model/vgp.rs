//! Variational Gaussian process regression
//!
//! With a Gaussian likelihood the optimal full-rank variational posterior
//! is available in closed form, so the evidence lower bound is evaluated
//! at the collapsed optimum instead of optimizing variational parameters
//! by gradient. At that optimum the bound equals the exact evidence; the
//! computation still goes through the explicit expected-log-likelihood
//! minus KL decomposition.

use nalgebra::{DMatrix, DVector};

use super::{
    check_parameter_count, cholesky_lower, col_norms_sq, ln_det_chol,
    pack_parameters, solve_chol, solve_lower, GpModel, Prediction,
};
use crate::kernel::Kernel;
use crate::likelihood::GaussianLikelihood;
use crate::mean_function::MeanFunction;
use crate::GpError;

/// Variational GP regression with the variational optimum collapsed
/// analytically
#[derive(Clone)]
pub struct VariationalGp<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    kernel: K,
    mean_fn: M,
    likelihood: GaussianLikelihood,
    x_train: DMatrix<f64>,
    y_train: DMatrix<f64>,
    /// Lower Cholesky factor of K + σ²I
    l_w: DMatrix<f64>,
    /// Dual coefficients (K + σ²I)⁻¹ (Y − m(X))
    wr: DMatrix<f64>,
    /// Variational posterior mean at the training inputs
    q_mean: DMatrix<f64>,
    /// Variational posterior variance at the training inputs (shared
    /// across output columns)
    q_var: DVector<f64>,
    elbo: f64,
}

impl<K, M> VariationalGp<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    /// Fit the collapsed variational posterior for the given data and
    /// parameters
    pub fn train(
        kernel: K,
        mean_fn: M,
        likelihood: GaussianLikelihood,
        x_train: DMatrix<f64>,
        y_train: DMatrix<f64>,
    ) -> Result<Self, GpError> {
        if y_train.nrows() != x_train.nrows() {
            return Err(GpError::DataMismatch {
                what: "y_train rows",
                expected: x_train.nrows(),
                given: y_train.nrows(),
            });
        }
        if mean_fn.n_outputs() != y_train.ncols() {
            return Err(GpError::DataMismatch {
                what: "mean function outputs",
                expected: y_train.ncols(),
                given: mean_fn.n_outputs(),
            });
        }

        let n = x_train.nrows();
        let s2 = likelihood.variance();

        let k = kernel.covariance(&x_train, &x_train);
        let mut w = k.clone();
        for i in 0..n {
            w[(i, i)] += s2;
        }
        let l_w = cholesky_lower(w)?;

        let resid = &y_train - mean_fn.mean(&x_train);
        let wr = solve_chol(&l_w, &resid)?;

        // optimal q is the conditional posterior of the latent values
        let kwr = &k * &wr;
        let q_mean = mean_fn.mean(&x_train) + &kwr;
        let v = solve_lower(&l_w, &k)?;
        let q_var = kernel.diag(&x_train) - col_norms_sq(&v);

        // expected log likelihood under the q marginals
        let mut ell = 0.0;
        for j in 0..y_train.ncols() {
            for i in 0..n {
                ell += likelihood.variational_expectation(
                    y_train[(i, j)],
                    q_mean[(i, j)],
                    q_var[i],
                );
            }
        }

        // KL(q ‖ prior), one term per output column. Every piece reduces
        // to the noise-augmented factorization, so no jitter is needed.
        let w_inv_k = solve_chol(&l_w, &k)?;
        let tr_wk = w_inv_k.trace();
        let ln_det_w = ln_det_chol(&l_w);
        let nf = n as f64;
        let mut kl = 0.0;
        for j in 0..y_train.ncols() {
            let quad = wr.column(j).dot(&kwr.column(j));
            kl += 0.5
                * ((nf - tr_wk) + quad - nf + ln_det_w - nf * s2.ln());
        }

        let elbo = ell - kl;

        Ok(VariationalGp {
            kernel,
            mean_fn,
            likelihood,
            x_train,
            y_train,
            l_w,
            wr,
            q_mean,
            q_var,
            elbo,
        })
    }

    /// Return the kernel being used in this model
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Return the observation likelihood
    pub fn likelihood(&self) -> &GaussianLikelihood {
        &self.likelihood
    }

    /// The evidence lower bound at the collapsed variational optimum
    pub fn elbo(&self) -> f64 {
        self.elbo
    }

    /// Variational posterior mean at the training inputs
    pub fn q_mean(&self) -> &DMatrix<f64> {
        &self.q_mean
    }

    /// Variational posterior variance at the training inputs
    pub fn q_var(&self) -> &DVector<f64> {
        &self.q_var
    }
}

impl<K, M> GpModel for VariationalGp<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    fn objective(&self) -> f64 {
        self.elbo
    }

    fn parameters(&self) -> DVector<f64> {
        pack_parameters(&[
            self.mean_fn.parameters(),
            self.kernel.parameters(),
            self.likelihood.parameters(),
        ])
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, GpError> {
        let n_mean = self.mean_fn.n_parameters();
        let n_kernel = self.kernel.n_parameters();
        check_parameter_count(
            params,
            n_mean + n_kernel + self.likelihood.n_parameters(),
        )?;
        let (mean_par, rest) = params.split_at(n_mean);
        let (kernel_par, lik_par) = rest.split_at(n_kernel);

        Self::train(
            self.kernel.reparameterize(kernel_par)?,
            self.mean_fn.reparameterize(mean_par)?,
            self.likelihood.reparameterize(lik_par)?,
            self.x_train.clone(),
            self.y_train.clone(),
        )
    }

    fn predict(&self, xs: &DMatrix<f64>) -> Result<Prediction, GpError> {
        let k_trans = self.kernel.covariance(xs, &self.x_train);
        let mean = self.mean_fn.mean(xs) + &k_trans * &self.wr;
        let v = solve_lower(&self.l_w, &k_trans.transpose())?;
        let var_col = self.kernel.diag(xs) - col_norms_sq(&v);
        let var = DMatrix::from_fn(xs.nrows(), self.y_train.ncols(), |i, _| {
            var_col[i]
        });
        Ok(Prediction::new(mean, var, self.likelihood.variance()))
    }
}
