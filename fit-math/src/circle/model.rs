//! Distance model, centered residual and analytic Jacobian for the circle fit.
//!
//! Parameters are ordered `[r, cx, cy]`. The model `R_i = |p_i - c|` does not
//! involve `r`; subtracting the mean distance from every residual removes the
//! radius from the problem, and it is recovered afterwards as `mean(R)`.

use nalgebra::{DMatrix, DVector, Vector2};

use crate::lm::LeastSquaresProblem;

/// Column indices into the parameter vector.
pub(super) const RADIUS: usize = 0;
pub(super) const CENTER_X: usize = 1;
pub(super) const CENTER_Y: usize = 2;

/// Boundary points of one contour, stored as separate coordinate columns.
#[derive(Debug, Clone)]
pub(super) struct CircleProblem {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl CircleProblem {
    pub(super) fn new(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        debug_assert_eq!(xs.len(), ys.len());
        Self { xs, ys }
    }

    pub(super) fn len(&self) -> usize {
        self.xs.len()
    }

    /// Euclidean distance from every point to the trial center.
    pub(super) fn distances(&self, cx: f64, cy: f64, out: &mut [f64]) {
        for ((d, &x), &y) in out.iter_mut().zip(&self.xs).zip(&self.ys) {
            *d = (x - cx).hypot(y - cy);
        }
    }

    /// Mean point-to-center distance, the radius implied by a center.
    pub(super) fn mean_distance(&self, cx: f64, cy: f64) -> f64 {
        let mut distances = vec![0.0; self.len()];
        self.distances(cx, cy, &mut distances);
        mean(&distances)
    }

    /// Distances minus their mean.
    pub(super) fn centered_distances(&self, cx: f64, cy: f64) -> Vec<f64> {
        let mut distances = vec![0.0; self.len()];
        self.distances(cx, cy, &mut distances);
        let m = mean(&distances);
        distances.iter_mut().for_each(|d| *d -= m);
        distances
    }

    pub(super) fn centroid(&self) -> Vector2<f64> {
        Vector2::new(mean(&self.xs), mean(&self.ys))
    }

    /// Largest distance from the centroid to any point.
    pub(super) fn extent(&self) -> f64 {
        let c = self.centroid();
        self.xs
            .iter()
            .zip(&self.ys)
            .map(|(&x, &y)| (x - c.x).hypot(y - c.y))
            .fold(0.0, f64::max)
    }

    /// Eigenvalues `(min, max)` of the 2x2 point scatter matrix about the centroid.
    ///
    /// A zero maximum means all points coincide; a minimum that vanishes relative
    /// to the maximum means they are collinear.
    pub(super) fn scatter_eigenvalues(&self) -> (f64, f64) {
        let c = self.centroid();
        let n = self.len() as f64;
        let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
        for (&x, &y) in self.xs.iter().zip(&self.ys) {
            let dx = x - c.x;
            let dy = y - c.y;
            sxx += dx * dx;
            sxy += dx * dy;
            syy += dy * dy;
        }
        sxx /= n;
        sxy /= n;
        syy /= n;

        let half_trace = 0.5 * (sxx + syy);
        let spread = (0.5 * (sxx - syy)).hypot(sxy);
        ((half_trace - spread).max(0.0), half_trace + spread)
    }
}

impl LeastSquaresProblem for CircleProblem {
    fn param_count(&self) -> usize {
        3
    }

    fn residual_count(&self) -> usize {
        self.len()
    }

    fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let distances = out.as_mut_slice();
        self.distances(params[CENTER_X], params[CENTER_Y], distances);
        let m = mean(distances);
        distances.iter_mut().for_each(|d| *d -= m);
    }

    fn jacobian(&self, params: &DVector<f64>, out: &mut DMatrix<f64>) {
        let cx = params[CENTER_X];
        let cy = params[CENTER_Y];

        for (i, (&x, &y)) in self.xs.iter().zip(&self.ys).enumerate() {
            let r = (x - cx).hypot(y - cy);
            out[(i, RADIUS)] = -1.0;
            // A point sitting on the trial center has no defined direction
            if r > 0.0 {
                out[(i, CENTER_X)] = (cx - x) / r;
                out[(i, CENTER_Y)] = (cy - y) / r;
            } else {
                out[(i, CENTER_X)] = 0.0;
                out[(i, CENTER_Y)] = 0.0;
            }
        }

        // Match the mean subtraction applied to the residuals
        for mut column in out.column_iter_mut() {
            let m = column.mean();
            column.add_scalar_mut(-m);
        }
    }
}

pub(super) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
