//! Numerical fitting routines for solar disk measurement.
//!
//! - [`circle`]: least-squares circle fit to contour points, with initial-guess helpers
//! - [`lm`]: the Levenberg-Marquardt driver the circle fit runs on

pub mod circle;
pub mod lm;

use nalgebra::Vector2;

pub use circle::{
    fit_circle, guess_from_centroid, guess_from_perimeter, CircleFit, CircleFitError,
    CircleFitter, CircleParams, FitConfig, FitStatus,
};

/// Trait for objects that can be located in a 2D Cartesian coordinate system.
pub trait Locatable2d {
    /// Returns the x-coordinate of the object.
    fn x(&self) -> f64;

    /// Returns the y-coordinate of the object.
    fn y(&self) -> f64;
}

impl Locatable2d for Vector2<f64> {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

impl Locatable2d for (f64, f64) {
    fn x(&self) -> f64 {
        self.0
    }

    fn y(&self) -> f64 {
        self.1
    }
}
