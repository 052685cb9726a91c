//! Detection pipeline settings.
//!
//! Stored as JSON so a tuned configuration can be reused across a batch of
//! photographs taken with the same camera.

use std::path::Path;

use fit_math::FitConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading or writing a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Largest Gaussian kernel half-width, in pixels, a configuration may request.
pub const MAX_BLUR_RADIUS: f64 = 4096.0;

/// Settings for [`crate::detect_disks`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskDetectionConfig {
    /// Equalize the histogram before blurring
    pub equalize: bool,
    /// Histogram bins for equalization and the Otsu threshold
    pub histogram_bins: usize,
    /// Gaussian blur standard deviation in pixels; 0 disables the blur
    pub blur_sigma: f64,
    /// Kernel half-width in units of `blur_sigma`
    pub blur_truncate: f64,
    /// Contours with fewer boundary pixels are discarded before fitting
    pub min_contour_points: usize,
    /// Leave out contour pixels on the frame border, where a clipped disk is
    /// bounded by the frame instead of its limb
    pub exclude_frame_edge: bool,
    /// Circle fit settings
    pub fit: FitConfig,
}

impl Default for DiskDetectionConfig {
    fn default() -> Self {
        Self {
            equalize: true,
            histogram_bins: 256,
            blur_sigma: 11.0,
            blur_truncate: 4.0,
            min_contour_points: 8,
            exclude_frame_edge: true,
            fit: FitConfig::default(),
        }
    }
}

impl DiskDetectionConfig {
    /// Check the pipeline parameters.
    ///
    /// Returns a description of the first offending field. The nested `fit`
    /// settings are checked by [`fit_math::CircleFitter::new`].
    pub fn validate(&self) -> Result<(), String> {
        if self.histogram_bins < 2 {
            return Err(format!(
                "histogram_bins must be at least 2, got {}",
                self.histogram_bins
            ));
        }
        if !(self.blur_sigma.is_finite() && self.blur_sigma >= 0.0) {
            return Err(format!(
                "blur_sigma must be finite and non-negative, got {}",
                self.blur_sigma
            ));
        }
        if !(self.blur_truncate.is_finite() && self.blur_truncate > 0.0) {
            return Err(format!(
                "blur_truncate must be positive, got {}",
                self.blur_truncate
            ));
        }
        if self.blur_truncate * self.blur_sigma > MAX_BLUR_RADIUS {
            return Err(format!(
                "blur_sigma {} with blur_truncate {} exceeds the {MAX_BLUR_RADIUS} pixel kernel limit",
                self.blur_sigma, self.blur_truncate
            ));
        }
        if self.min_contour_points < fit_math::circle::MIN_POINTS {
            return Err(format!(
                "min_contour_points must be at least {}, got {}",
                fit_math::circle::MIN_POINTS,
                self.min_contour_points
            ));
        }
        Ok(())
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file; missing fields take their default values
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
