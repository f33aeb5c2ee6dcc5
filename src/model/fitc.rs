//! FITC (fully independent training conditional) regression
//!
//! The Nyström approximation Q_ff of the kernel is corrected on its
//! diagonal, so each training point carries its own effective noise
//! `diag(K_ff − Q_ff) + σ²` and the approximate marginal likelihood is a
//! Gaussian with covariance `Q_ff + diag(ν)` evaluated through a Woodbury
//! factorization.

use itertools::izip;
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

/// GP regression under the FITC approximation
#[derive(Clone)]
pub struct FitcRegression<K, M>
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
    /// Lower Cholesky factor of B = I + W Wᵀ with W = L⁻¹ K_uf diag(ν)^(-1/2)
    lb: DMatrix<f64>,
    /// L_B⁻¹ W diag(ν)^(-1/2) (Y − m(X))
    beta: DMatrix<f64>,
    /// Per-point effective noise ν = diag(K_ff − Q_ff) + σ²
    nu: DVector<f64>,
    ln_m: f64,
}

impl<K, M> FitcRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    /// Fit the FITC factorization for the given data and parameters
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
        let v = solve_lower(&luu, &kuf)?;

        let kdiag = kernel.diag(&x_train);
        let qdiag = col_norms_sq(&v);
        let nu: DVector<f64> = DVector::from_iterator(
            n,
            izip!(kdiag.iter(), qdiag.iter()).map(|(kd, qd)| kd - qd + s2),
        );

        let mut w = v;
        for i in 0..n {
            let scale = 1.0 / nu[i].sqrt();
            for r in 0..m_pts {
                w[(r, i)] *= scale;
            }
        }

        let b = DMatrix::identity(m_pts, m_pts) + &w * w.transpose();
        let lb = cholesky_lower(b)?;

        let resid = &y_train - mean_fn.mean(&x_train);
        let mut rtilde = resid;
        for j in 0..p {
            for i in 0..n {
                rtilde[(i, j)] /= nu[i].sqrt();
            }
        }

        let bvec = &w * &rtilde;
        let beta = solve_lower(&lb, &bvec)?;

        let nf = n as f64;
        let pf = p as f64;
        let half_ln_det_b: f64 = lb.diagonal().map(f64::ln).sum();
        let ln_m = -nf * pf * HALF_LN_2PI
            - 0.5 * pf * nu.map(f64::ln).sum()
            - pf * half_ln_det_b
            - 0.5 * (rtilde.norm_squared() - beta.norm_squared());

        Ok(FitcRegression {
            kernel,
            mean_fn,
            likelihood,
            inducing,
            x_train,
            y_train,
            luu,
            lb,
            beta,
            nu,
            ln_m,
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

    /// The FITC approximation to the log marginal likelihood
    pub fn ln_m(&self) -> f64 {
        self.ln_m
    }

    /// Per-point effective noise `diag(K_ff − Q_ff) + σ²`
    pub fn noise_diag(&self) -> &DVector<f64> {
        &self.nu
    }
}

impl<K, M> GpModel for FitcRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    fn objective(&self) -> f64 {
        self.ln_m
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
        let mean = self.mean_fn.mean(xs) + tmp2.transpose() * &self.beta;
        let var_col = self.kernel.diag(xs) - col_norms_sq(&tmp1)
            + col_norms_sq(&tmp2);
        let var = DMatrix::from_fn(xs.nrows(), self.y_train.ncols(), |i, _| {
            var_col[i]
        });
        Ok(Prediction::new(mean, var, self.likelihood.variance()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{ConstantKernel, ProductKernel, RBFKernel};
    use crate::mean_function::ConstantMean;
    use crate::model::GpRegression;
    use nalgebra::dvector;

    type ScaledRbf = ProductKernel<ConstantKernel, RBFKernel>;

    fn scaled_rbf(variance: f64, length_scale: f64) -> ScaledRbf {
        ConstantKernel::new_unchecked(variance)
            * RBFKernel::new_unchecked(length_scale)
    }

    fn sin_data() -> (DMatrix<f64>, DMatrix<f64>) {
        let x_train: DMatrix<f64> =
            DMatrix::from_column_slice(5, 1, &[-4.0, -3.0, -2.0, -1.0, 1.0]);
        let y_train = x_train.map(f64::sin);
        (x_train, y_train)
    }

    #[test]
    fn inducing_at_data_recovers_exact_evidence() {
        let (x_train, y_train) = sin_data();
        let gpr = GpRegression::train(
            scaled_rbf(1.2, 0.9),
            ConstantMean::new(dvector![0.1]).unwrap(),
            GaussianLikelihood::new(0.25).unwrap(),
            x_train.clone(),
            y_train.clone(),
        )
        .unwrap();
        let fitc = FitcRegression::train(
            scaled_rbf(1.2, 0.9),
            ConstantMean::new(dvector![0.1]).unwrap(),
            GaussianLikelihood::new(0.25).unwrap(),
            InducingPoints::fixed(x_train.clone()).unwrap(),
            x_train.clone(),
            y_train,
        )
        .unwrap();

        assert::close(fitc.ln_m(), gpr.ln_m(), 1E-3);

        // with inducing points at the data the diagonal correction
        // collapses to the plain noise variance
        for i in 0..5 {
            assert::close(fitc.noise_diag()[i], 0.25, 1E-5);
        }

        let xs = DMatrix::from_column_slice(4, 1, &[-4.5, -2.2, 0.0, 2.0]);
        let pf = fitc.predict(&xs).unwrap();
        let pg = gpr.predict(&xs).unwrap();
        assert!(pf.mean().relative_eq(pg.mean(), 1E-4, 1E-4));
        assert!(pf.y_var().relative_eq(&pg.y_var(), 1E-4, 1E-4));
    }

    #[test]
    fn subset_inducing_points_have_heteroscedastic_correction() {
        let (x_train, y_train) = sin_data();
        let z = DMatrix::from_column_slice(2, 1, &[-4.0, -1.0]);

        let fitc = FitcRegression::train(
            scaled_rbf(1.0, 1.0),
            ConstantMean::zeros(1).unwrap(),
            GaussianLikelihood::new(0.25).unwrap(),
            InducingPoints::fixed(z).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        let nu = fitc.noise_diag();
        // at an inducing location the correction vanishes
        assert::close(nu[0], 0.25, 1E-4);
        // away from the inducing set the correction is strictly positive
        assert!(nu[2] > 0.25 + 1E-3);
        assert!(fitc.ln_m().is_finite());
    }

    #[test]
    fn identical_columns_double_the_objective() {
        let (x_train, y_train) = sin_data();
        let mut y2 = DMatrix::zeros(5, 2);
        y2.set_column(0, &y_train.column(0));
        y2.set_column(1, &y_train.column(0));

        let single = FitcRegression::train(
            scaled_rbf(1.0, 1.0),
            ConstantMean::zeros(1).unwrap(),
            GaussianLikelihood::new(0.25).unwrap(),
            InducingPoints::fixed(x_train.clone()).unwrap(),
            x_train.clone(),
            y_train,
        )
        .unwrap();
        let double = FitcRegression::train(
            scaled_rbf(1.0, 1.0),
            ConstantMean::zeros(2).unwrap(),
            GaussianLikelihood::new(0.25).unwrap(),
            InducingPoints::fixed(x_train.clone()).unwrap(),
            x_train,
            y2,
        )
        .unwrap();

        assert::close(double.ln_m(), 2.0 * single.ln_m(), 1E-8);
    }
}
