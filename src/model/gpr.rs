//! Exact Gaussian process regression

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use super::{
    check_parameter_count, cholesky_lower, col_norms_sq, pack_parameters,
    solve_chol, solve_lower, GpModel, Prediction,
};
use crate::consts::{DEFAULT_JITTER, HALF_LN_2PI};
use crate::kernel::Kernel;
use crate::likelihood::GaussianLikelihood;
use crate::mean_function::MeanFunction;
use crate::GpError;

/// Gaussian process regression with a Gaussian likelihood and closed-form
/// marginal likelihood
///
/// Output columns are modeled as independent draws from the same prior, so
/// one factorization serves every column.
#[derive(Clone)]
pub struct GpRegression<K, M>
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
    l: DMatrix<f64>,
    /// Residuals Y − m(X)
    resid: DMatrix<f64>,
    /// Dual coefficients (K + σ²I)⁻¹ (Y − m(X))
    alpha: DMatrix<f64>,
}

impl<K, M> GpRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    /// Fit the decomposition for the given data and parameters
    ///
    /// # Arguments
    /// * `kernel` - Covariance kernel
    /// * `mean_fn` - Prior mean function, one output per column of `y_train`
    /// * `likelihood` - Gaussian observation model
    /// * `x_train` - Input locations, one per row
    /// * `y_train` - Observed outputs, one column per output dimension
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

        let mut w = kernel.covariance(&x_train, &x_train);
        let s2 = likelihood.variance();
        for i in 0..w.nrows() {
            w[(i, i)] += s2;
        }
        let l = cholesky_lower(w)?;

        let resid = &y_train - mean_fn.mean(&x_train);
        let alpha = solve_chol(&l, &resid)?;

        Ok(GpRegression {
            kernel,
            mean_fn,
            likelihood,
            x_train,
            y_train,
            l,
            resid,
            alpha,
        })
    }

    /// Return the kernel being used in this model
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Return the mean function being used in this model
    pub fn mean_fn(&self) -> &M {
        &self.mean_fn
    }

    /// Return the observation likelihood
    pub fn likelihood(&self) -> &GaussianLikelihood {
        &self.likelihood
    }

    /// The log marginal likelihood, summed over output columns
    pub fn ln_m(&self) -> f64 {
        let n = self.x_train.nrows() as f64;
        let p = self.y_train.ncols() as f64;
        let half_ln_det: f64 = self.l.diagonal().map(f64::ln).sum();
        let fit: f64 = self
            .resid
            .column_iter()
            .zip(self.alpha.column_iter())
            .map(|(r, a)| r.dot(&a))
            .sum();
        -0.5 * fit - p * half_ln_det - n * p * HALF_LN_2PI
    }

    /// Posterior mean and full latent covariance at the rows of `xs`
    pub fn predict_full(
        &self,
        xs: &DMatrix<f64>,
    ) -> Result<(DMatrix<f64>, DMatrix<f64>), GpError> {
        let k_trans = self.kernel.covariance(xs, &self.x_train);
        let mean = self.mean_fn.mean(xs) + &k_trans * &self.alpha;
        let v = solve_lower(&self.l, &k_trans.transpose())?;
        let cov = self.kernel.covariance(xs, xs) - v.transpose() * &v;
        Ok((mean, cov))
    }

    /// Draw latent function values at the rows of `xs` from the posterior
    pub fn sample_f<R: Rng>(
        &self,
        xs: &DMatrix<f64>,
        n_draws: usize,
        rng: &mut R,
    ) -> Result<Vec<DMatrix<f64>>, GpError> {
        let (mean, mut cov) = self.predict_full(xs)?;
        for i in 0..cov.nrows() {
            cov[(i, i)] += DEFAULT_JITTER;
        }
        let lc = cholesky_lower(cov)?;

        let draws = (0..n_draws)
            .map(|_| {
                let eps: DMatrix<f64> =
                    DMatrix::from_fn(mean.nrows(), mean.ncols(), |_, _| {
                        rng.sample(StandardNormal)
                    });
                &mean + &lc * eps
            })
            .collect();
        Ok(draws)
    }
}

impl<K, M> GpModel for GpRegression<K, M>
where
    K: Kernel,
    M: MeanFunction,
{
    fn objective(&self) -> f64 {
        self.ln_m()
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

    // GPML equation 5.9 assembled from the kernel's covariance gradient,
    // plus the mean-function and noise components
    fn grad_objective(&self) -> Result<DVector<f64>, GpError> {
        let n = self.x_train.nrows();
        let p = self.y_train.ncols() as f64;
        let (_, k_grad) = self.kernel.covariance_with_gradient(&self.x_train)?;
        let w_inv = solve_chol(&self.l, &DMatrix::identity(n, n))?;

        let mut parts =
            Vec::with_capacity(self.parameters().len());

        for slice in self.mean_fn.mean_gradient(&self.x_train) {
            parts.push(slice.component_mul(&self.alpha).sum());
        }

        for t in 0..k_grad.n_slices() {
            let g = &k_grad[t];
            let quad: f64 = self
                .alpha
                .column_iter()
                .map(|a| {
                    let a = a.clone_owned();
                    a.dot(&(g * &a))
                })
                .sum();
            let tr = w_inv.component_mul(g).sum();
            parts.push(0.5 * quad - 0.5 * p * tr);
        }

        let s2 = self.likelihood.variance();
        parts.push(
            0.5 * s2 * (self.alpha.norm_squared() - p * w_inv.trace()),
        );

        Ok(DVector::from_vec(parts))
    }

    fn predict(&self, xs: &DMatrix<f64>) -> Result<Prediction, GpError> {
        let k_trans = self.kernel.covariance(xs, &self.x_train);
        let mean = self.mean_fn.mean(xs) + &k_trans * &self.alpha;
        let v = solve_lower(&self.l, &k_trans.transpose())?;
        let var_col = self.kernel.diag(xs) - col_norms_sq(&v);
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
    use crate::mean_function::{ConstantMean, ZeroMean};
    use crate::model::mle;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

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

    fn arange(start: f64, stop: f64, step_size: f64) -> DMatrix<f64> {
        let size = ((stop - start) / step_size).floor() as usize;
        let it = (0..size).map(|i| start + (i as f64) * step_size);
        DMatrix::from_iterator(size, 1, it)
    }

    #[test]
    fn simple() {
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(1E-10).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        let xs: DMatrix<f64> = arange(-5.0, 5.0, 1.0);
        let pred = gp.predict(&xs).unwrap();

        let expected_mean: DMatrix<f64> = DMatrix::from_column_slice(
            10,
            1,
            &[
                0.61409752,
                0.7568025,
                -0.14112001,
                -0.90929743,
                -0.84147098,
                0.08533365,
                0.84147098,
                0.5639856,
                0.12742202,
                0.01047683,
            ],
        );

        assert!(pred.mean().relative_eq(&expected_mean, 1E-7, 1E-7));

        // variance vanishes at the training points and grows away from them
        let var = pred.var();
        assert!(var[(1, 0)] < 1E-6);
        assert!(var[(4, 0)] < 1E-6);
        assert!(var[(0, 0)] > 0.1);
        assert!(var[(9, 0)] > 0.9);
    }

    #[test]
    fn predict_full_cov() {
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(1E-10).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        let xs: DMatrix<f64> = arange(-5.0, 5.0, 1.0);
        let (mean, cov) = gp.predict_full(&xs).unwrap();
        let pred = gp.predict(&xs).unwrap();

        assert!(mean.relative_eq(pred.mean(), 1E-10, 1E-10));
        // the diagonal of the full covariance is the per-point variance
        for i in 0..xs.nrows() {
            assert::close(cov[(i, i)], pred.var()[(i, 0)], 1E-9);
        }
        assert!(cov.relative_eq(&cov.transpose(), 1E-9, 1E-9));
    }

    #[test]
    fn log_marginal() {
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(1E-10).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        assert::close(gp.ln_m(), -5.029_140_041_070_2, 1E-7);

        let grad = gp.grad_objective().unwrap();
        // kernel variance and length-scale components
        assert::close(grad[0], -2.382_220_635_221_591, 1E-7);
        assert::close(grad[1], 2.068_285_412_616_592, 1E-7);
        // the noise component is negligible at σ² = 1e-10
        assert!(grad[2].abs() < 1E-6);
    }

    #[test]
    fn ln_m_at_optimum() {
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.105_063_230_887_187_5, 1.994_892_058_623_660_7),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(1E-10).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        assert::close(gp.ln_m(), -3.414_870_08, 1E-7);
    }

    #[test]
    fn optimize_gp() {
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(1E-10).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        let gp = gp.optimize(500).expect("Failed to optimize");
        let opt = gp.kernel().parameters().map(f64::exp);

        assert::close(opt[0], 1.105_063_230_887_187_5, 1E-3);
        assert::close(opt[1], 1.994_892_058_623_660_7, 1E-3);
        assert::close(gp.ln_m(), -3.414_870_08, 1E-5);
    }

    #[test]
    fn analytic_gradient_matches_finite_difference() {
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.2, 0.8),
            ConstantMean::zeros(1).unwrap(),
            GaussianLikelihood::new(0.5).unwrap(),
            x_train,
            y_train,
        )
        .unwrap();

        let analytic = gp.grad_objective().unwrap();
        let fd = mle::central_difference(&gp).unwrap();

        assert_eq!(analytic.len(), 4);
        assert!(analytic.relative_eq(&fd, 1E-5, 1E-6));
    }

    #[test]
    fn identical_columns_double_the_evidence() {
        let (x_train, y_train) = sin_data();
        let mut y2 = DMatrix::zeros(5, 2);
        y2.set_column(0, &y_train.column(0));
        y2.set_column(1, &y_train.column(0));

        let single = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(0.1).unwrap(),
            x_train.clone(),
            y_train,
        )
        .unwrap();
        let double = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(2).unwrap(),
            GaussianLikelihood::new(0.1).unwrap(),
            x_train,
            y2,
        )
        .unwrap();

        assert::close(double.ln_m(), 2.0 * single.ln_m(), 1E-9);
    }

    #[test]
    fn posterior_samples_track_the_mean() {
        let mut rng = StdRng::seed_from_u64(0x6370);
        let (x_train, y_train) = sin_data();
        let gp = GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(0.1).unwrap(),
            x_train.clone(),
            y_train,
        )
        .unwrap();

        let draws = gp.sample_f(&x_train, 1000, &mut rng).unwrap();
        assert_eq!(draws.len(), 1000);

        let pred = gp.predict(&x_train).unwrap();
        let mut est = DMatrix::zeros(5, 1);
        for d in &draws {
            est += d;
        }
        est /= 1000.0;

        for i in 0..5 {
            assert::close(est[(i, 0)], pred.mean()[(i, 0)], 0.1);
        }
    }

    #[test]
    fn shape_mismatches_are_rejected() {
        let (x_train, y_train) = sin_data();
        // wrong number of mean outputs
        assert!(GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(2).unwrap(),
            GaussianLikelihood::new(0.1).unwrap(),
            x_train.clone(),
            y_train.clone(),
        )
        .is_err());
        // wrong number of target rows
        let y_short = DMatrix::zeros(3, 1);
        assert!(GpRegression::train(
            scaled_rbf(1.0, 1.0),
            ZeroMean::new(1).unwrap(),
            GaussianLikelihood::new(0.1).unwrap(),
            x_train,
            y_short,
        )
        .is_err());
    }
}
