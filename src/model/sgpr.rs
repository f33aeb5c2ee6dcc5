//! Collapsed sparse Gaussian process regression
//!
//! The variational distribution over the inducing variables is integrated
//! out analytically (Titsias 2009), leaving a closed-form lower bound on
//! the evidence with a trace correction for the discarded conditional
//! covariance.

use nalgebra::{DMatrix, DVector};

use super::{
    check_parameter_count, cholesky_lower, col_norms_sq, pack_parameters,
    solve_lower, GpModel, Prediction,
};
use crate::consts::{DEFAULT_JITTER, HALF_LN_2PI};
use crate::inducing::InducingPoints;
use crate::kernel::Kernel;
use crate::likelihood::GaussianLikelihood;
use crate::mean_function::MeanFunction;
use crate::GpError;

/// Sparse GP regression with the collapsed variational bound
#[derive(Clone)]
pub struct SparseGpRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    kernel: K,
    mean_fn: M,
    likelihood: GaussianLikelihood,
    inducing: InducingPoints,
    x_train: DMatrix<f64>,
    y_train: DMatrix<f64>,
    /// Lower Cholesky factor of K_uu + jitter I
    luu: DMatrix<f64>,
    /// Lower Cholesky factor of B = I + A Aᵀ with A = L⁻¹ K_uf / σ
    lb: DMatrix<f64>,
    /// L_B⁻¹ A (Y − m(X)) / σ
    c: DMatrix<f64>,
    bound: f64,
}

impl<K, M> SparseGpRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    /// Fit the collapsed bound for the given data and parameters
    pub fn train(
        kernel: K,
        mean_fn: M,
        likelihood: GaussianLikelihood,
        inducing: InducingPoints,
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
        if inducing.z().ncols() != x_train.ncols() {
            return Err(GpError::DataMismatch {
                what: "inducing point columns",
                expected: x_train.ncols(),
                given: inducing.z().ncols(),
            });
        }

        let n = x_train.nrows() as f64;
        let p = y_train.ncols() as f64;
        let m_pts = inducing.n_points();
        let s2 = likelihood.variance();
        let sigma = s2.sqrt();
        let z = inducing.z();

        let mut kuu = kernel.covariance(z, z);
        for i in 0..m_pts {
            kuu[(i, i)] += DEFAULT_JITTER;
        }
        let luu = cholesky_lower(kuu)?;
        let kuf = kernel.covariance(z, &x_train);
        let a = solve_lower(&luu, &kuf)?.map(|e| e / sigma);

        let aat = &a * a.transpose();
        let b = DMatrix::identity(m_pts, m_pts) + &aat;
        let lb = cholesky_lower(b)?;

        let resid = &y_train - mean_fn.mean(&x_train);
        let aerr = &a * &resid;
        let c = solve_lower(&lb, &aerr)?.map(|e| e / sigma);

        let kdiag = kernel.diag(&x_train);
        let half_ln_det_b: f64 = lb.diagonal().map(f64::ln).sum();

        let bound = -n * p * HALF_LN_2PI
            - p * half_ln_det_b
            - 0.5 * n * p * s2.ln()
            - 0.5 * resid.norm_squared() / s2
            + 0.5 * c.norm_squared()
            - 0.5 * p * kdiag.sum() / s2
            + 0.5 * p * aat.trace();

        Ok(SparseGpRegression {
            kernel,
            mean_fn,
            likelihood,
            inducing,
            x_train,
            y_train,
            luu,
            lb,
            c,
            bound,
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

    /// Return the inducing point set
    pub fn inducing(&self) -> &InducingPoints {
        &self.inducing
    }

    /// The collapsed lower bound on the log marginal likelihood
    pub fn bound(&self) -> f64 {
        self.bound
    }
}

impl<K, M> GpModel for SparseGpRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    fn objective(&self) -> f64 {
        self.bound
    }

    fn parameters(&self) -> DVector<f64> {
        pack_parameters(&[
            self.mean_fn.parameters(),
            self.kernel.parameters(),
            self.likelihood.parameters(),
            self.inducing.parameters(),
        ])
    }

    fn reparameterize(&self, params: &[f64]) -> Result<Self, GpError> {
        let n_mean = self.mean_fn.n_parameters();
        let n_kernel = self.kernel.n_parameters();
        let n_lik = self.likelihood.n_parameters();
        check_parameter_count(
            params,
            n_mean + n_kernel + n_lik + self.inducing.n_parameters(),
        )?;
        let (mean_par, rest) = params.split_at(n_mean);
        let (kernel_par, rest) = rest.split_at(n_kernel);
        let (lik_par, z_par) = rest.split_at(n_lik);

        Self::train(
            self.kernel.reparameterize(kernel_par)?,
            self.mean_fn.reparameterize(mean_par)?,
            self.likelihood.reparameterize(lik_par)?,
            self.inducing.reparameterize(z_par)?,
            self.x_train.clone(),
            self.y_train.clone(),
        )
    }

    fn predict(&self, xs: &DMatrix<f64>) -> Result<Prediction, GpError> {
        let kus = self.kernel.covariance(self.inducing.z(), xs);
        let tmp1 = solve_lower(&self.luu, &kus)?;
        let tmp2 = solve_lower(&self.lb, &tmp1)?;
        let mean = self.mean_fn.mean(xs) + tmp2.transpose() * &self.c;
        let var_col = self.kernel.diag(xs) - col_norms_sq(&tmp1)
            + col_norms_sq(&tmp2);
        let var = DMatrix::from_fn(xs.nrows(), self.y_train.ncols(), |i, _| {
            var_col[i]
        });
        Ok(Prediction::new(mean, var, self.likelihood.variance()))
    }
}
