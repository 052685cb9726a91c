//! Synthetic solar disk frames with known geometry.
//!
//! Renders a uniformly bright disk on a flat sky with anti-aliased edges and
//! optional Gaussian read noise, so the detection pipeline can be checked
//! against ground truth.

use fit_math::CircleParams;
use log::warn;
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Disk geometry, intensities and noise for one synthetic frame.
///
/// Coordinates follow the contour convention: `x` is the column and `y` the
/// row of a pixel center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticDisk {
    pub width: usize,
    pub height: usize,
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
    /// Intensity inside the disk
    pub disk_level: f64,
    /// Sky intensity
    pub background_level: f64,
    /// Standard deviation of additive Gaussian noise; 0 renders a clean frame
    pub noise_sigma: f64,
    /// Seed for the noise generator
    pub seed: u64,
    /// Subsamples per pixel side used to estimate edge coverage
    pub supersample: usize,
}

impl Default for SyntheticDisk {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            center_x: 128.0,
            center_y: 128.0,
            radius: 80.0,
            disk_level: 0.9,
            background_level: 0.1,
            noise_sigma: 0.0,
            seed: 0,
            supersample: 4,
        }
    }
}

impl SyntheticDisk {
    /// Clean disk of `radius` centered at `(center_x, center_y)` in a `width x height` frame.
    pub fn new(width: usize, height: usize, center_x: f64, center_y: f64, radius: f64) -> Self {
        Self {
            width,
            height,
            center_x,
            center_y,
            radius,
            ..Default::default()
        }
    }

    pub fn with_noise(mut self, sigma: f64, seed: u64) -> Self {
        self.noise_sigma = sigma;
        self.seed = seed;
        self
    }

    pub fn with_levels(mut self, disk_level: f64, background_level: f64) -> Self {
        self.disk_level = disk_level;
        self.background_level = background_level;
        self
    }

    /// The circle the frame was rendered from.
    pub fn truth(&self) -> CircleParams {
        CircleParams::new(self.radius, self.center_x, self.center_y)
    }

    /// Fraction of the pixel at `(row, col)` covered by the disk.
    pub fn coverage(&self, row: usize, col: usize) -> f64 {
        let x = col as f64 - self.center_x;
        let y = row as f64 - self.center_y;
        let d = x.hypot(y);
        // Subsamples lie within sqrt(2)/2 of the pixel center
        if d >= self.radius + 1.0 {
            return 0.0;
        }
        if d <= self.radius - 1.0 {
            return 1.0;
        }

        let n = self.supersample.max(1);
        let step = 1.0 / n as f64;
        let r2 = self.radius * self.radius;
        let mut inside = 0;
        for i in 0..n {
            let sy = y - 0.5 + (i as f64 + 0.5) * step;
            for j in 0..n {
                let sx = x - 0.5 + (j as f64 + 0.5) * step;
                if sx * sx + sy * sy <= r2 {
                    inside += 1;
                }
            }
        }
        inside as f64 / (n * n) as f64
    }

    /// Render the grayscale frame, shape `(height, width)`.
    pub fn render(&self) -> Array2<f64> {
        let contrast = self.disk_level - self.background_level;
        let mut frame = Array2::from_shape_fn((self.height, self.width), |(row, col)| {
            self.background_level + contrast * self.coverage(row, col)
        });

        if self.noise_sigma > 0.0 {
            match Normal::new(0.0, self.noise_sigma) {
                Ok(noise) => {
                    let mut rng = StdRng::seed_from_u64(self.seed);
                    frame.mapv_inplace(|v| v + noise.sample(&mut rng));
                }
                Err(e) => warn!("skipping noise with sigma {}: {e}", self.noise_sigma),
            }
        }

        frame
    }

    /// Render a color frame, shape `(height, width, 3)`, scaling the grayscale
    /// frame by a per-channel gain.
    pub fn render_rgb(&self, gains: [f64; 3]) -> Array3<f64> {
        let gray = self.render();
        Array3::from_shape_fn((self.height, self.width, 3), |(row, col, channel)| {
            gray[[row, col]] * gains[channel]
        })
    }
}
