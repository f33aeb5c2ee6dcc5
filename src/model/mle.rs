//! Optimizer plumbing shared by every model type

use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient, State};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::DVector;

use super::GpModel;
use crate::GpError;

/// Parameters controlling the quasi-Newton maximization
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeParams {
    max_iters: u64,
    tolerance_grad: f64,
    memory: usize,
}

impl OptimizeParams {
    /// Set the iteration cap
    #[must_use]
    pub fn with_max_iters(self, max_iters: u64) -> Self {
        Self { max_iters, ..self }
    }

    /// Set the gradient-norm termination tolerance
    #[must_use]
    pub fn with_tolerance_grad(self, tolerance_grad: f64) -> Self {
        Self {
            tolerance_grad,
            ..self
        }
    }

    /// Set the number of curvature pairs kept by L-BFGS
    #[must_use]
    pub fn with_memory(self, memory: usize) -> Self {
        Self { memory, ..self }
    }
}

impl Default for OptimizeParams {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            tolerance_grad: 1E-8,
            memory: 10,
        }
    }
}

/// argmin problem minimizing the negated model objective
pub(crate) struct MleOp<M> {
    model: M,
}

impl<M: GpModel> CostFunction for MleOp<M> {
    type Param = DVector<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        // an infeasible proposal is a rejected step, not a failed run
        let obj = self
            .model
            .reparameterize(param.as_slice())
            .map(|m| m.objective())
            .unwrap_or(f64::NEG_INFINITY);
        if obj.is_nan() {
            Ok(f64::INFINITY)
        } else {
            Ok(-obj)
        }
    }
}

impl<M: GpModel> Gradient for MleOp<M> {
    type Param = DVector<f64>;
    type Gradient = DVector<f64>;

    fn gradient(
        &self,
        param: &Self::Param,
    ) -> Result<Self::Gradient, ArgminError> {
        let grad = self
            .model
            .reparameterize(param.as_slice())
            .and_then(|m| m.grad_objective())
            .unwrap_or_else(|_| DVector::zeros(param.len()));
        Ok(grad.map(|g| if g.is_nan() { 0.0 } else { -g }))
    }
}

/// Run an iteration-capped L-BFGS maximization of the model objective
///
/// A run that dies in the line search close to stationarity is retried
/// once with a loosened gradient tolerance so it terminates before the
/// region where cost differences fall below float resolution.
pub(crate) fn maximize<M: GpModel>(
    model: M,
    params: &OptimizeParams,
) -> Result<M, GpError> {
    let run = |tolerance_grad: f64| -> Result<DVector<f64>, String> {
        let op = MleOp {
            model: model.clone(),
        };
        let linesearch = MoreThuenteLineSearch::new();
        let solver = LBFGS::new(linesearch, params.memory)
            .with_tolerance_grad(tolerance_grad)
            .map_err(|e| e.to_string())?;

        let res = Executor::new(op, solver)
            .configure(|state| {
                state.param(model.parameters()).max_iters(params.max_iters)
            })
            .run()
            .map_err(|e| e.to_string())?;

        res.state()
            .get_best_param()
            .cloned()
            .ok_or_else(|| "no parameters visited".to_string())
    };

    let best = run(params.tolerance_grad)
        .or_else(|_| run(params.tolerance_grad * 100.0))
        .map_err(GpError::Optimize)?;
    model.reparameterize(best.as_slice())
}

/// Central finite difference of the model objective, used by models whose
/// bounds have no analytic gradient implementation
pub(crate) fn central_difference<M: GpModel>(
    model: &M,
) -> Result<DVector<f64>, GpError> {
    let theta = model.parameters();
    let mut grad = DVector::zeros(theta.len());
    let step = f64::EPSILON.cbrt();

    for i in 0..theta.len() {
        let h = step * theta[i].abs().max(1.0);
        let hi = theta[i] + h;
        let lo = theta[i] - h;

        let mut t = theta.clone();
        t[i] = hi;
        let f_hi = model.reparameterize(t.as_slice())?.objective();
        t[i] = lo;
        let f_lo = model.reparameterize(t.as_slice())?.objective();

        grad[i] = (f_hi - f_lo) / (hi - lo);
    }

    Ok(grad)
}
