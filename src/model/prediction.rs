use nalgebra::DMatrix;

/// Posterior prediction at a set of test inputs
///
/// Holds the latent mean and per-point latent variance for each output
/// column. Observation-space quantities add the model's noise variance.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    mean: DMatrix<f64>,
    var: DMatrix<f64>,
    noise_variance: f64,
}

impl Prediction {
    pub(crate) fn new(
        mean: DMatrix<f64>,
        var: DMatrix<f64>,
        noise_variance: f64,
    ) -> Self {
        Self {
            mean,
            var,
            noise_variance,
        }
    }

    /// Posterior mean of the latent function, one column per output
    #[must_use]
    pub fn mean(&self) -> &DMatrix<f64> {
        &self.mean
    }

    /// Posterior variance of the latent function at each point
    #[must_use]
    pub fn var(&self) -> &DMatrix<f64> {
        &self.var
    }

    /// Posterior standard deviation of the latent function at each point
    #[must_use]
    pub fn std(&self) -> DMatrix<f64> {
        self.var.map(f64::sqrt)
    }

    /// Predictive variance of observations: latent variance plus noise
    #[must_use]
    pub fn y_var(&self) -> DMatrix<f64> {
        self.var.map(|v| v + self.noise_variance)
    }
}
