//! Least-squares circle fit for contour points.
//!
//! Fits the circle that minimizes the spread of point-to-center distances. The
//! residual for each point is its distance to the trial center minus the mean
//! distance, so the solver only has to place the center; the radius is the
//! mean distance at the converged center. The Jacobian is analytic.
//!
//! Convergence failure is not an error: [`fit_circle`] returns a [`CircleFit`]
//! whose [`FitStatus`] says whether to trust it, so a caller fitting many
//! contours can skip bad ones without aborting the batch.

mod guess;
mod model;

use log::debug;
use nalgebra::{DVector, Vector2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lm::{levenberg_marquardt, LmConfig, LmTermination};
use crate::Locatable2d;
use model::{CircleProblem, CENTER_X, CENTER_Y, RADIUS};

pub use guess::{guess_from_centroid, guess_from_perimeter};

/// Fewest points that determine a circle.
pub const MIN_POINTS: usize = 3;

/// Errors that reject a fit before the solver runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CircleFitError {
    #[error("insufficient data: need at least {required} points, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("invalid input: point {index} has non-finite coordinates ({x}, {y})")]
    NonFinitePoint { index: usize, x: f64, y: f64 },

    #[error("invalid input: initial guess {0:?} is not finite")]
    NonFiniteGuess(CircleParams),

    #[error("invalid fit configuration: {0}")]
    InvalidConfig(String),
}

/// Circle parameters `(r, cx, cy)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleParams {
    pub radius: f64,
    pub center_x: f64,
    pub center_y: f64,
}

impl CircleParams {
    pub fn new(radius: f64, center_x: f64, center_y: f64) -> Self {
        Self {
            radius,
            center_x,
            center_y,
        }
    }

    pub fn center(&self) -> Vector2<f64> {
        Vector2::new(self.center_x, self.center_y)
    }

    pub fn is_finite(&self) -> bool {
        self.radius.is_finite() && self.center_x.is_finite() && self.center_y.is_finite()
    }

    /// Parameter vector in solver order `[r, cx, cy]`.
    fn to_vector(self) -> DVector<f64> {
        let mut v = DVector::zeros(3);
        v[RADIUS] = self.radius;
        v[CENTER_X] = self.center_x;
        v[CENTER_Y] = self.center_y;
        v
    }
}

/// Diagnostic outcome of a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    /// Relative cost reduction fell below `ftol`.
    CostConverged,
    /// Parameter step fell below `xtol`.
    StepConverged,
    /// Both cost and step tolerances met.
    CostAndStepConverged,
    /// Gradient fell below `gtol`.
    GradientConverged,
    /// Iteration budget exhausted before convergence.
    MaxIterations,
    /// Residual-evaluation budget exhausted before convergence.
    MaxEvaluations,
    /// Damping grew past its ceiling without an improving step.
    DampingExhausted,
    /// The damped normal equations were numerically unsolvable.
    SolveFailed,
    /// Points are coincident or collinear, or the center ran off to infinity.
    Degenerate,
}

impl FitStatus {
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

impl From<LmTermination> for FitStatus {
    fn from(termination: LmTermination) -> Self {
        match termination {
            LmTermination::CostConverged => Self::CostConverged,
            LmTermination::StepConverged => Self::StepConverged,
            LmTermination::CostAndStepConverged => Self::CostAndStepConverged,
            LmTermination::GradientConverged => Self::GradientConverged,
            LmTermination::MaxIterations => Self::MaxIterations,
            LmTermination::MaxEvaluations => Self::MaxEvaluations,
            LmTermination::DampingExhausted => Self::DampingExhausted,
            LmTermination::SolveFailed => Self::SolveFailed,
        }
    }
}

/// Solver settings plus the geometry checks specific to circles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub solver: LmConfig,
    /// Point sets whose scatter-matrix eigenvalue ratio (min/max) falls at or
    /// below this are treated as collinear and not fitted.
    pub degeneracy_tolerance: f64,
    /// A fitted radius above this multiple of the point-set extent marks the
    /// fit degenerate (the center drifted off toward infinity).
    pub max_radius_ratio: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            solver: LmConfig::default(),
            degeneracy_tolerance: 1e-10,
            max_radius_ratio: 1e4,
        }
    }
}

impl FitConfig {
    pub fn validate(&self) -> Result<(), CircleFitError> {
        self.solver.validate().map_err(CircleFitError::InvalidConfig)?;
        if !(self.degeneracy_tolerance.is_finite() && self.degeneracy_tolerance >= 0.0) {
            return Err(CircleFitError::InvalidConfig(format!(
                "degeneracy_tolerance must be finite and non-negative, got {}",
                self.degeneracy_tolerance
            )));
        }
        if self.max_radius_ratio.is_nan() || self.max_radius_ratio <= 1.0 {
            return Err(CircleFitError::InvalidConfig(format!(
                "max_radius_ratio must exceed 1, got {}",
                self.max_radius_ratio
            )));
        }
        Ok(())
    }
}

/// Result of a circle fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleFit {
    /// Fitted circle; the radius is the mean point-to-center distance.
    pub params: CircleParams,
    /// Per-point distance to the center minus the mean distance (zero mean).
    pub residuals: Vec<f64>,
    pub status: FitStatus,
    /// Residual evaluations, including rejected trial steps.
    pub evaluations: usize,
    /// Solver iterations (Jacobian evaluations).
    pub iterations: usize,
    /// Sum of squared residuals.
    pub cost: f64,
}

impl CircleFit {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Root-mean-square radial deviation of the points from the fitted circle.
    pub fn rms_residual(&self) -> f64 {
        if self.residuals.is_empty() {
            return 0.0;
        }
        (self.cost / self.residuals.len() as f64).sqrt()
    }
}

/// Reusable fitter holding a validated configuration.
#[derive(Debug, Clone, Default)]
pub struct CircleFitter {
    config: FitConfig,
}

impl CircleFitter {
    pub fn new(config: FitConfig) -> Result<Self, CircleFitError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit a circle to `points` starting from `initial_guess`.
    pub fn fit<P: Locatable2d>(
        &self,
        points: &[P],
        initial_guess: CircleParams,
    ) -> Result<CircleFit, CircleFitError> {
        let (xs, ys) = collect_coordinates(points)?;
        if !initial_guess.is_finite() {
            return Err(CircleFitError::NonFiniteGuess(initial_guess));
        }

        let problem = CircleProblem::new(xs, ys);

        let (min_spread, max_spread) = problem.scatter_eigenvalues();
        if max_spread <= 0.0 || min_spread <= self.config.degeneracy_tolerance * max_spread {
            debug!(
                "circle fit skipped: degenerate point set (scatter eigenvalues {min_spread:.3e}, {max_spread:.3e})"
            );
            return Ok(degenerate_fit(&problem, initial_guess));
        }

        let report = levenberg_marquardt(&problem, initial_guess.to_vector(), &self.config.solver);

        let center_x = report.params[CENTER_X];
        let center_y = report.params[CENTER_Y];
        let radius = problem.mean_distance(center_x, center_y);
        let params = CircleParams::new(radius, center_x, center_y);

        let mut status = FitStatus::from(report.termination);
        if !params.is_finite() || radius > self.config.max_radius_ratio * problem.extent() {
            debug!(
                "circle fit center ran away: radius {radius:.3e} vs point extent {:.3e}",
                problem.extent()
            );
            status = FitStatus::Degenerate;
        }

        Ok(CircleFit {
            params,
            residuals: report.residuals.iter().copied().collect(),
            status,
            evaluations: report.evaluations,
            iterations: report.iterations,
            cost: report.cost,
        })
    }
}

/// Fit a circle to `points` starting from `initial_guess`.
///
/// # Errors
/// * `CircleFitError::InsufficientData` - fewer than [`MIN_POINTS`] points
/// * `CircleFitError::NonFinitePoint` / `NonFiniteGuess` - NaN or infinite input
/// * `CircleFitError::InvalidConfig` - unusable tolerances or budgets
pub fn fit_circle<P: Locatable2d>(
    points: &[P],
    initial_guess: CircleParams,
    config: &FitConfig,
) -> Result<CircleFit, CircleFitError> {
    CircleFitter::new(config.clone())?.fit(points, initial_guess)
}

fn degenerate_fit(problem: &CircleProblem, initial_guess: CircleParams) -> CircleFit {
    let residuals = problem.centered_distances(initial_guess.center_x, initial_guess.center_y);
    let cost = residuals.iter().map(|r| r * r).sum();
    CircleFit {
        params: initial_guess,
        residuals,
        status: FitStatus::Degenerate,
        evaluations: 0,
        iterations: 0,
        cost,
    }
}

/// Split points into coordinate columns, rejecting short or non-finite input.
pub(crate) fn collect_coordinates<P: Locatable2d>(
    points: &[P],
) -> Result<(Vec<f64>, Vec<f64>), CircleFitError> {
    if points.len() < MIN_POINTS {
        return Err(CircleFitError::InsufficientData {
            required: MIN_POINTS,
            got: points.len(),
        });
    }

    let mut xs = Vec::with_capacity(points.len());
    let mut ys = Vec::with_capacity(points.len());
    for (index, p) in points.iter().enumerate() {
        let (x, y) = (p.x(), p.y());
        if !x.is_finite() || !y.is_finite() {
            return Err(CircleFitError::NonFinitePoint { index, x, y });
        }
        xs.push(x);
        ys.push(y);
    }

    Ok((xs, ys))
}
