//! Starting estimates for the circle fit.
//!
//! The fit only converges to the right circle when seeded near it. Both helpers
//! put the center at the point centroid; they differ in how the radius is read
//! off the point set.

use std::f64::consts::PI;

use super::{collect_coordinates, model::mean, CircleFitError, CircleParams};
use crate::Locatable2d;

/// Seed from an ordered contour: centroid center, radius = perimeter / 2π.
///
/// The perimeter is the length of the closed polyline through the points in
/// the order given, so the points must follow the boundary.
pub fn guess_from_perimeter<P: Locatable2d>(points: &[P]) -> Result<CircleParams, CircleFitError> {
    let (xs, ys) = collect_coordinates(points)?;
    let n = xs.len();

    let perimeter: f64 = (0..n)
        .map(|i| {
            let j = (i + 1) % n;
            (xs[j] - xs[i]).hypot(ys[j] - ys[i])
        })
        .sum();

    Ok(CircleParams::new(perimeter / (2.0 * PI), mean(&xs), mean(&ys)))
}

/// Seed from an unordered point cloud: centroid center, radius = mean distance to it.
pub fn guess_from_centroid<P: Locatable2d>(points: &[P]) -> Result<CircleParams, CircleFitError> {
    let (xs, ys) = collect_coordinates(points)?;
    let cx = mean(&xs);
    let cy = mean(&ys);

    let distances: Vec<f64> = xs
        .iter()
        .zip(&ys)
        .map(|(&x, &y)| (x - cx).hypot(y - cy))
        .collect();

    Ok(CircleParams::new(mean(&distances), cx, cy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    fn circle_points(n: usize, r: f64, cx: f64, cy: f64) -> Vec<Vector2<f64>> {
        (0..n)
            .map(|i| {
                let t = 2.0 * PI * i as f64 / n as f64;
                Vector2::new(cx + r * t.cos(), cy + r * t.sin())
            })
            .collect()
    }

    #[test]
    fn test_perimeter_guess_on_dense_circle() {
        let points = circle_points(720, 40.0, 100.0, 80.0);
        let guess = guess_from_perimeter(&points).unwrap();

        assert_relative_eq!(guess.center_x, 100.0, epsilon = 1e-9);
        assert_relative_eq!(guess.center_y, 80.0, epsilon = 1e-9);
        // Inscribed polygon slightly underestimates the circumference
        assert!(guess.radius < 40.0);
        assert_relative_eq!(guess.radius, 40.0, epsilon = 1e-3);
    }

    #[test]
    fn test_perimeter_guess_of_square() {
        let points = vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)];
        let guess = guess_from_perimeter(&points).unwrap();

        assert_relative_eq!(guess.radius, 8.0 / (2.0 * PI), epsilon = 1e-12);
        assert_relative_eq!(guess.center_x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(guess.center_y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_centroid_guess_ignores_order() {
        let mut points = circle_points(12, 5.0, -2.0, 3.0);
        let ordered = guess_from_centroid(&points).unwrap();
        points.swap(0, 7);
        points.swap(3, 10);
        let shuffled = guess_from_centroid(&points).unwrap();

        assert_relative_eq!(ordered.radius, 5.0, epsilon = 1e-9);
        assert_relative_eq!(ordered.radius, shuffled.radius, epsilon = 1e-12);
        assert_relative_eq!(ordered.center_x, shuffled.center_x, epsilon = 1e-12);
    }

    #[test]
    fn test_guesses_reject_bad_input() {
        let two = vec![(0.0, 0.0), (1.0, 1.0)];
        assert!(matches!(
            guess_from_perimeter(&two),
            Err(CircleFitError::InsufficientData { got: 2, .. })
        ));

        let nan = vec![(0.0, 0.0), (f64::NAN, 1.0), (1.0, 0.0)];
        assert!(matches!(
            guess_from_centroid(&nan),
            Err(CircleFitError::NonFinitePoint { index: 1, .. })
        ));
    }
}
