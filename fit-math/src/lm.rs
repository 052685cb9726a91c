//! Levenberg-Marquardt solver for small nonlinear least-squares problems.
//!
//! Minimizes `sum(r_i(p)^2)` for a problem that supplies its residuals and an
//! analytic Jacobian. The damped normal equations `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`
//! are solved through an SVD pseudo-inverse, so a parameter the residuals do not
//! depend on receives a zero step instead of making the system singular.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Singular values below this fraction of the largest one are treated as zero.
const SINGULAR_VALUE_RTOL: f64 = 1e-12;

/// A nonlinear least-squares problem with an analytic Jacobian.
pub trait LeastSquaresProblem {
    /// Number of parameters n.
    fn param_count(&self) -> usize;

    /// Number of residuals m.
    fn residual_count(&self) -> usize;

    /// Fill the residual vector r(p), len = m.
    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>);

    /// Fill the Jacobian J(p) with shape m x n, where `out[(i, k)] = ∂r_i/∂p_k`.
    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>);
}

/// Tolerances, damping schedule and budgets for [`levenberg_marquardt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LmConfig {
    /// Stop when an accepted step reduces the cost by less than this fraction.
    pub ftol: f64,
    /// Stop when the step length is below `xtol * (xtol + ‖p‖)`.
    pub xtol: f64,
    /// Stop when the largest gradient component is at or below this value.
    pub gtol: f64,
    /// Maximum number of Jacobian evaluations (outer iterations).
    pub max_iterations: usize,
    /// Maximum number of residual evaluations, including rejected trial steps.
    pub max_evaluations: usize,
    /// Initial damping parameter.
    pub initial_lambda: f64,
    /// Factor applied to lambda after a rejected step.
    pub lambda_up: f64,
    /// Factor applied to lambda after an accepted step.
    pub lambda_down: f64,
    /// Give up once lambda grows past this value without an accepted step.
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            max_iterations: 100,
            max_evaluations: 400,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            max_lambda: 1e16,
        }
    }
}

impl LmConfig {
    /// Check that tolerances and damping factors are usable.
    ///
    /// Returns a description of the first offending field.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("ftol", self.ftol), ("xtol", self.xtol), ("gtol", self.gtol)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{name} must be finite and non-negative, got {value}"));
            }
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1".to_string());
        }
        if self.max_evaluations < 2 {
            return Err(format!(
                "max_evaluations must be at least 2, got {}",
                self.max_evaluations
            ));
        }
        if !(self.initial_lambda.is_finite() && self.initial_lambda > 0.0) {
            return Err(format!(
                "initial_lambda must be positive, got {}",
                self.initial_lambda
            ));
        }
        if !(self.lambda_up.is_finite() && self.lambda_up > 1.0) {
            return Err(format!("lambda_up must exceed 1, got {}", self.lambda_up));
        }
        if !(self.lambda_down > 0.0 && self.lambda_down < 1.0) {
            return Err(format!(
                "lambda_down must lie in (0, 1), got {}",
                self.lambda_down
            ));
        }
        if self.max_lambda.is_nan() || self.max_lambda <= self.initial_lambda {
            return Err(format!(
                "max_lambda must exceed initial_lambda, got {}",
                self.max_lambda
            ));
        }
        Ok(())
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LmTermination {
    /// Relative cost reduction fell below `ftol` (or the cost reached zero).
    CostConverged,
    /// Step length fell below `xtol`.
    StepConverged,
    /// Both the cost and step criteria were met on the same step.
    CostAndStepConverged,
    /// Gradient fell below `gtol`.
    GradientConverged,
    /// `max_iterations` exhausted.
    MaxIterations,
    /// `max_evaluations` exhausted.
    MaxEvaluations,
    /// Damping grew past `max_lambda` without finding a better point.
    DampingExhausted,
    /// The damped normal equations could not be solved.
    SolveFailed,
}

impl LmTermination {
    /// True when the stop was caused by a tolerance rather than a budget or failure.
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Self::CostConverged
                | Self::StepConverged
                | Self::CostAndStepConverged
                | Self::GradientConverged
        )
    }
}

/// Outcome of a Levenberg-Marquardt run.
#[derive(Debug, Clone)]
pub struct LmReport {
    /// Best parameters found.
    pub params: DVector<f64>,
    /// Residuals at `params`.
    pub residuals: DVector<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    /// Outer iterations (Jacobian evaluations) performed.
    pub iterations: usize,
    /// Residual evaluations performed, including rejected trial steps.
    pub evaluations: usize,
    pub termination: LmTermination,
}

/// Run Levenberg-Marquardt from `initial` until a tolerance or budget in `config` is hit.
///
/// The returned parameters are always the best point visited; a budget or
/// damping failure is reported through [`LmReport::termination`], never as an error.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    initial: DVector<f64>,
    config: &LmConfig,
) -> LmReport {
    let n = problem.param_count();
    let m = problem.residual_count();

    let mut params = initial;
    let mut residuals = DVector::zeros(m);
    problem.residuals(&params, &mut residuals);
    let mut cost = residuals.norm_squared();
    let mut evaluations = 1;
    let mut iterations = 0;
    let mut lambda = config.initial_lambda;

    // Buffers reused across iterations
    let mut jacobian = DMatrix::zeros(m, n);
    let mut trial_residuals = DVector::zeros(m);

    let termination = 'outer: loop {
        if cost == 0.0 {
            break LmTermination::CostConverged;
        }
        if iterations >= config.max_iterations {
            break LmTermination::MaxIterations;
        }
        iterations += 1;

        problem.jacobian(&params, &mut jacobian);
        let hessian = jacobian.tr_mul(&jacobian);
        let gradient = jacobian.tr_mul(&residuals);

        if gradient.amax() <= config.gtol {
            break LmTermination::GradientConverged;
        }

        let descent = -&gradient;

        loop {
            if evaluations >= config.max_evaluations {
                break 'outer LmTermination::MaxEvaluations;
            }

            let mut damped = hessian.clone();
            for i in 0..n {
                damped[(i, i)] *= 1.0 + lambda;
            }

            let Some(step) = solve_pseudo_inverse(damped, &descent) else {
                break 'outer LmTermination::SolveFailed;
            };

            let trial = &params + &step;
            problem.residuals(&trial, &mut trial_residuals);
            evaluations += 1;
            let trial_cost = trial_residuals.norm_squared();

            let step_norm = step.norm();
            let step_small = step_norm <= config.xtol * (config.xtol + params.norm());

            if trial_cost.is_finite() && trial_cost < cost {
                let reduction = (cost - trial_cost) / cost;
                trace!(
                    "lm iter {iterations}: cost {cost:.6e} -> {trial_cost:.6e}, |step| {step_norm:.3e}, lambda {lambda:.3e}"
                );

                params = trial;
                std::mem::swap(&mut residuals, &mut trial_residuals);
                cost = trial_cost;
                lambda = (lambda * config.lambda_down).max(f64::MIN_POSITIVE);

                match (reduction <= config.ftol, step_small) {
                    (true, true) => break 'outer LmTermination::CostAndStepConverged,
                    (true, false) => break 'outer LmTermination::CostConverged,
                    (false, true) => break 'outer LmTermination::StepConverged,
                    (false, false) => break,
                }
            }

            // No trial point inside this trust region is better
            if step_small {
                break 'outer LmTermination::StepConverged;
            }

            lambda *= config.lambda_up;
            if lambda > config.max_lambda {
                break 'outer LmTermination::DampingExhausted;
            }
        }
    };

    debug!(
        "lm finished: {termination:?} after {iterations} iterations, {evaluations} evaluations, cost {cost:.6e}"
    );

    LmReport {
        params,
        residuals,
        cost,
        iterations,
        evaluations,
        termination,
    }
}

/// Solve `a x = b` through the SVD pseudo-inverse of `a`.
fn solve_pseudo_inverse(a: DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = a.svd(true, true);
    let max_singular = svd.singular_values.max();
    if !max_singular.is_finite() || max_singular <= 0.0 {
        return None;
    }

    let x = svd.solve(b, max_singular * SINGULAR_VALUE_RTOL).ok()?;
    x.iter().all(|v| v.is_finite()).then_some(x)
}
