//! Sparse variational Gaussian process regression
//!
//! The posterior over the inducing variables is restricted to a Gaussian
//! `q(u)`; with a Gaussian likelihood the optimal `q` is available in
//! closed form, so every objective evaluation collapses it analytically
//! and then evaluates the explicit bound. The `whiten` flag switches to
//! the reparameterization `v = L⁻¹(u − m(Z))` with a standard-normal
//! prior, which shares semantics with the natural parameterization but
//! not linear algebra.

use nalgebra::{DMatrix, DVector};

use super::{
    check_parameter_count, cholesky_lower, col_norms_sq, ln_det_chol,
    pack_parameters, solve_chol, solve_lower, GpModel, Prediction,
};
use crate::consts::DEFAULT_JITTER;
use crate::inducing::InducingPoints;
use crate::kernel::Kernel;
use crate::likelihood::GaussianLikelihood;
use crate::mean_function::MeanFunction;
use crate::GpError;

/// Sparse variational GP regression with the optimal `q(u)` collapsed
/// analytically
#[derive(Clone)]
pub struct SparseVariationalGp<K, M>
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
    whiten: bool,
    /// Lower Cholesky factor of K_uu + jitter I
    luu: DMatrix<f64>,
    /// L⁻¹ K_uf
    a: DMatrix<f64>,
    /// Lower Cholesky factor of B = I + σ⁻² A Aᵀ
    lb: DMatrix<f64>,
    /// Variational mean: μ_v when whitened, μ_u otherwise
    q_mu: DMatrix<f64>,
    /// Lower Cholesky factor of the variational covariance (S_v when
    /// whitened, S_u otherwise)
    q_sqrt: DMatrix<f64>,
    elbo: f64,
}

impl<K, M> SparseVariationalGp<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    /// Fit the collapsed variational posterior over the inducing variables
    ///
    /// # Arguments
    /// * `kernel` - Covariance kernel
    /// * `mean_fn` - Prior mean function, one output per column of `y_train`
    /// * `likelihood` - Gaussian observation model
    /// * `inducing` - Inducing point set
    /// * `x_train` - Input locations, one per row
    /// * `y_train` - Observed outputs, one column per output dimension
    /// * `whiten` - Use the whitened parameterization of `q`
    #[allow(clippy::many_single_char_names)]
    pub fn train(
        kernel: K,
        mean_fn: M,
        likelihood: GaussianLikelihood,
        inducing: InducingPoints,
        x_train: DMatrix<f64>,
        y_train: DMatrix<f64>,
        whiten: bool,
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

        let n = x_train.nrows();
        let p = y_train.ncols();
        let m_pts = inducing.n_points();
        let s2 = likelihood.variance();
        let z = inducing.z();

        let mut kuu = kernel.covariance(z, z);
        for i in 0..m_pts {
            kuu[(i, i)] += DEFAULT_JITTER;
        }
        let luu = cholesky_lower(kuu)?;
        let kuf = kernel.covariance(z, &x_train);
        let a = solve_lower(&luu, &kuf)?;

        let b = DMatrix::identity(m_pts, m_pts)
            + &a * a.transpose() * (1.0 / s2);
        let lb = cholesky_lower(b)?;

        let resid = &y_train - mean_fn.mean(&x_train);
        let ar = &a * &resid;
        // optimal whitened mean and covariance of q
        let mu_v = solve_chol(&lb, &ar)?.map(|e| e / s2);
        let b_inv = solve_chol(&lb, &DMatrix::identity(m_pts, m_pts))?;

        let m_z = mean_fn.mean(z);
        let (q_mu, q_cov) = if whiten {
            (mu_v.clone(), b_inv)
        } else {
            (&m_z + &luu * &mu_v, &luu * b_inv * luu.transpose())
        };
        let q_sqrt = cholesky_lower(q_cov.clone())?;

        // marginals of q(f) at the training inputs
        let kdiag = kernel.diag(&x_train);
        let m_x = mean_fn.mean(&x_train);
        let (mean_f, var_f) = if whiten {
            let mean_f = &m_x + a.transpose() * &q_mu;
            let t = solve_lower(&lb, &a)?;
            let var_f = &kdiag - col_norms_sq(&a) + col_norms_sq(&t);
            (mean_f, var_f)
        } else {
            let d = &q_mu - &m_z;
            let c = solve_chol(&luu, &d)?;
            let mean_f = &m_x + kuf.transpose() * &c;
            let w = luu
                .transpose()
                .solve_upper_triangular(&a)
                .ok_or(GpError::CholeskyFailed)?;
            let sw = q_sqrt.transpose() * &w;
            let var_f = &kdiag - col_norms_sq(&a) + col_norms_sq(&sw);
            (mean_f, var_f)
        };

        let mut ell = 0.0;
        for j in 0..p {
            for i in 0..n {
                ell += likelihood.variational_expectation(
                    y_train[(i, j)],
                    mean_f[(i, j)],
                    var_f[i],
                );
            }
        }

        let mf = m_pts as f64;
        let mut kl = 0.0;
        if whiten {
            // KL(q(v) ‖ N(0, I))
            let tr = q_cov.trace();
            let ln_det_q = ln_det_chol(&q_sqrt);
            for j in 0..p {
                kl += 0.5
                    * (tr + q_mu.column(j).norm_squared() - mf - ln_det_q);
            }
        } else {
            // KL(q(u) ‖ N(m(Z), K_uu))
            let tr = solve_chol(&luu, &q_cov)?.trace();
            let ln_det_kuu = ln_det_chol(&luu);
            let ln_det_q = ln_det_chol(&q_sqrt);
            let d = &q_mu - &m_z;
            let kd = solve_chol(&luu, &d)?;
            for j in 0..p {
                let quad = d.column(j).dot(&kd.column(j));
                kl += 0.5 * (tr + quad - mf + ln_det_kuu - ln_det_q);
            }
        }

        let elbo = ell - kl;

        Ok(SparseVariationalGp {
            kernel,
            mean_fn,
            likelihood,
            inducing,
            x_train,
            y_train,
            whiten,
            luu,
            a,
            lb,
            q_mu,
            q_sqrt,
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

    /// Return the inducing point set
    pub fn inducing(&self) -> &InducingPoints {
        &self.inducing
    }

    /// Whether the whitened parameterization is in use
    pub fn is_whitened(&self) -> bool {
        self.whiten
    }

    /// The evidence lower bound at the collapsed variational optimum
    pub fn elbo(&self) -> f64 {
        self.elbo
    }
}

impl<K, M> GpModel for SparseVariationalGp<K, M>
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
            self.whiten,
        )
    }

    fn predict(&self, xs: &DMatrix<f64>) -> Result<Prediction, GpError> {
        let kus = self.kernel.covariance(self.inducing.z(), xs);
        let a_s = solve_lower(&self.luu, &kus)?;
        let kdiag = self.kernel.diag(xs);

        let (mean, var_col) = if self.whiten {
            let mean = self.mean_fn.mean(xs) + a_s.transpose() * &self.q_mu;
            let t = solve_lower(&self.lb, &a_s)?;
            let var_col =
                &kdiag - col_norms_sq(&a_s) + col_norms_sq(&t);
            (mean, var_col)
        } else {
            let m_z = self.mean_fn.mean(self.inducing.z());
            let d = &self.q_mu - m_z;
            let c = solve_chol(&self.luu, &d)?;
            let mean = self.mean_fn.mean(xs) + kus.transpose() * &c;
            let w = self
                .luu
                .transpose()
                .solve_upper_triangular(&a_s)
                .ok_or(GpError::CholeskyFailed)?;
            let sw = self.q_sqrt.transpose() * &w;
            let var_col =
                &kdiag - col_norms_sq(&a_s) + col_norms_sq(&sw);
            (mean, var_col)
        };

        let var = DMatrix::from_fn(xs.nrows(), self.y_train.ncols(), |i, _| {
            var_col[i]
        });
        Ok(Prediction::new(mean, var, self.likelihood.variance()))
    }
}
