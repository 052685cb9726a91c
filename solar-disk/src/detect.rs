//! Solar disk detection pipeline
//!
//! Segments a frame into bright regions and measures each region's outline
//! with a least-squares circle fit:
//!
//! 1. optional histogram equalization, then Gaussian blur
//! 2. Otsu threshold and 8-connected labeling
//! 3. Moore tracing of each region's outer contour
//! 4. perimeter-seeded circle fit per contour, in parallel
//!
//! A contour whose fit does not converge is still reported, flagged through
//! its [`FitStatus`](fit_math::FitStatus); one bad contour never aborts the
//! frame.

use fit_math::{guess_from_perimeter, CircleFit, CircleFitError, CircleFitter, CircleParams};
use log::{debug, info, warn};
use nalgebra::Vector2;
use ndarray::{Array2, ArrayView2, ArrayView3};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::DiskDetectionConfig;
use crate::image_proc::{
    apply_threshold, component_sizes, connected_components, equalize_histogram, gaussian_blur,
    otsu_threshold, to_grayscale, trace_all_boundaries,
};

/// Errors that reject a whole frame.
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("empty image: {rows}x{cols} pixels")]
    EmptyImage { rows: usize, cols: usize },

    #[error("image has a non-finite pixel at row {row}, column {col}")]
    NonFiniteImage { row: usize, col: usize },

    #[error("invalid detection configuration: {0}")]
    InvalidConfig(String),

    #[error("circle fit error: {0}")]
    Fit(#[from] CircleFitError),
}

/// One bright region and the circle fitted to its outline.
#[derive(Debug, Clone)]
pub struct DetectedDisk {
    /// Component label in the thresholded frame
    pub label: u32,
    /// Pixels in the component
    pub pixel_count: usize,
    /// Ordered boundary pixels that were fitted (`x` = column, `y` = row)
    pub contour: Vec<Vector2<f64>>,
    /// Perimeter-based starting point of the fit
    pub initial_guess: CircleParams,
    pub fit: CircleFit,
}

impl DetectedDisk {
    pub fn is_converged(&self) -> bool {
        self.fit.is_converged()
    }

    pub fn circle(&self) -> CircleParams {
        self.fit.params
    }
}

/// Everything found in one frame.
#[derive(Debug, Clone)]
pub struct DiskDetection {
    /// Otsu threshold applied to the preprocessed frame
    pub threshold: f64,
    /// Connected regions above the threshold, before contour filtering
    pub component_count: u32,
    /// Fitted regions in label order
    pub disks: Vec<DetectedDisk>,
}

impl DiskDetection {
    /// Disks whose fit converged.
    pub fn converged(&self) -> impl Iterator<Item = &DetectedDisk> {
        self.disks.iter().filter(|d| d.is_converged())
    }

    /// The converged disk with the largest radius, normally the Sun itself.
    pub fn best(&self) -> Option<&DetectedDisk> {
        self.converged()
            .max_by(|a, b| a.fit.params.radius.total_cmp(&b.fit.params.radius))
    }
}

/// Equalize and blur a frame as configured.
pub fn preprocess(image: ArrayView2<f64>, config: &DiskDetectionConfig) -> Array2<f64> {
    let equalized = if config.equalize {
        equalize_histogram(image, config.histogram_bins)
    } else {
        image.to_owned()
    };
    gaussian_blur(equalized.view(), config.blur_sigma, config.blur_truncate)
}

/// Find and measure solar disks in a grayscale frame.
///
/// # Errors
/// * `DetectionError::EmptyImage` / `NonFiniteImage` - unusable frame
/// * `DetectionError::InvalidConfig` - unusable pipeline settings
/// * `DetectionError::Fit` - unusable circle fit settings
pub fn detect_disks(
    image: ArrayView2<f64>,
    config: &DiskDetectionConfig,
) -> Result<DiskDetection, DetectionError> {
    config.validate().map_err(DetectionError::InvalidConfig)?;
    let fitter = CircleFitter::new(config.fit.clone())?;
    check_frame(image)?;

    let prepared = preprocess(image, config);
    let threshold = otsu_threshold(prepared.view(), config.histogram_bins);
    let mask = apply_threshold(prepared.view(), threshold);
    let (labels, component_count) = connected_components(mask.view());
    let sizes = component_sizes(labels.view(), component_count);
    debug!("threshold {threshold:.4} gives {component_count} components");

    let (rows, cols) = image.dim();
    let contours: Vec<(u32, Vec<Vector2<f64>>)> =
        trace_all_boundaries(labels.view(), component_count)
            .into_iter()
            .enumerate()
            .map(|(i, contour)| {
                let label = i as u32 + 1;
                if config.exclude_frame_edge {
                    (label, drop_frame_edge(contour, rows, cols))
                } else {
                    (label, contour)
                }
            })
            .filter(|(label, contour)| {
                let keep = contour.len() >= config.min_contour_points;
                if !keep {
                    debug!(
                        "component {label}: contour of {} points is too short to fit",
                        contour.len()
                    );
                }
                keep
            })
            .collect();

    let disks: Vec<DetectedDisk> = contours
        .into_par_iter()
        .filter_map(|(label, contour)| {
            let pixel_count = sizes[label as usize - 1];
            match measure_contour(&fitter, label, pixel_count, contour) {
                Ok(disk) => Some(disk),
                Err(e) => {
                    warn!("component {label}: skipped, {e}");
                    None
                }
            }
        })
        .collect();

    let converged = disks.iter().filter(|d| d.is_converged()).count();
    info!(
        "detected {} disks ({converged} converged) from {component_count} components",
        disks.len()
    );

    Ok(DiskDetection {
        threshold,
        component_count,
        disks,
    })
}

/// [`detect_disks`] on a `(rows, cols, channels)` color frame, averaged to grayscale.
pub fn detect_disks_rgb(
    rgb: ArrayView3<f64>,
    config: &DiskDetectionConfig,
) -> Result<DiskDetection, DetectionError> {
    let gray = to_grayscale(rgb);
    detect_disks(gray.view(), config)
}

fn measure_contour(
    fitter: &CircleFitter,
    label: u32,
    pixel_count: usize,
    contour: Vec<Vector2<f64>>,
) -> Result<DetectedDisk, CircleFitError> {
    let initial_guess = guess_from_perimeter(&contour)?;
    let fit = fitter.fit(&contour, initial_guess)?;

    if fit.is_converged() {
        debug!(
            "component {label}: r = {:.3}, center = ({:.3}, {:.3}), rms {:.3} after {} iterations",
            fit.params.radius,
            fit.params.center_x,
            fit.params.center_y,
            fit.rms_residual(),
            fit.iterations
        );
    } else {
        warn!(
            "component {label}: circle fit did not converge ({:?} after {} evaluations)",
            fit.status, fit.evaluations
        );
    }

    Ok(DetectedDisk {
        label,
        pixel_count,
        contour,
        initial_guess,
        fit,
    })
}

/// Remove contour pixels on the outermost rows and columns, where the frame
/// rather than the limb bounds the region.
fn drop_frame_edge(contour: Vec<Vector2<f64>>, rows: usize, cols: usize) -> Vec<Vector2<f64>> {
    let last_x = cols.saturating_sub(1) as f64;
    let last_y = rows.saturating_sub(1) as f64;
    contour
        .into_iter()
        .filter(|p| p.x > 0.0 && p.y > 0.0 && p.x < last_x && p.y < last_y)
        .collect()
}

fn check_frame(image: ArrayView2<f64>) -> Result<(), DetectionError> {
    let (rows, cols) = image.dim();
    if image.is_empty() {
        return Err(DetectionError::EmptyImage { rows, cols });
    }
    if let Some(((row, col), _)) = image.indexed_iter().find(|(_, v)| !v.is_finite()) {
        return Err(DetectionError::NonFiniteImage { row, col });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticDisk;
    use fit_math::FitStatus;

    fn sharp_config() -> DiskDetectionConfig {
        DiskDetectionConfig {
            blur_sigma: 1.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_disk() {
        let disk = SyntheticDisk::new(96, 80, 45.3, 38.6, 25.0);
        let detection = detect_disks(disk.render().view(), &sharp_config()).unwrap();

        assert_eq!(detection.component_count, 1);
        assert_eq!(detection.disks.len(), 1);
        let best = detection.best().unwrap();
        assert_eq!(best.label, 1);
        assert!((best.circle().center_x - 45.3).abs() < 0.5);
        assert!((best.circle().center_y - 38.6).abs() < 0.5);
        assert!((best.circle().radius - 25.0).abs() < 1.5);
        assert!(best.pixel_count > 1800 && best.pixel_count < 2100);
    }

    #[test]
    fn test_two_disks_are_reported_in_label_order() {
        let big = SyntheticDisk::new(120, 80, 35.0, 40.0, 25.0).render();
        let small = SyntheticDisk::new(120, 80, 95.0, 30.0, 12.0).render();
        let frame = ndarray::Zip::from(&big)
            .and(&small)
            .map_collect(|&a, &b| a.max(b));

        let config = DiskDetectionConfig {
            equalize: false,
            ..sharp_config()
        };
        let detection = detect_disks(frame.view(), &config).unwrap();

        assert_eq!(detection.disks.len(), 2);
        assert!(detection.disks[0].label < detection.disks[1].label);
        assert_eq!(detection.converged().count(), 2);

        let best = detection.best().unwrap();
        assert!((best.circle().radius - 25.0).abs() < 1.5);
        assert!((best.circle().center_x - 35.0).abs() < 0.5);
    }

    #[test]
    fn test_short_contours_are_dropped() {
        let mut frame = SyntheticDisk::new(64, 64, 32.0, 32.0, 15.0).render();
        // A 2x2 speck well away from the disk
        for row in 4..6 {
            for col in 4..6 {
                frame[[row, col]] = 0.9;
            }
        }

        let config = DiskDetectionConfig {
            blur_sigma: 0.0,
            equalize: false,
            ..Default::default()
        };
        let detection = detect_disks(frame.view(), &config).unwrap();

        assert_eq!(detection.component_count, 2);
        assert_eq!(detection.disks.len(), 1);
        assert_eq!(detection.disks[0].label, 2);
    }

    #[test]
    fn test_flat_frame_has_no_disks() {
        let frame = Array2::from_elem((32, 32), 0.5);
        let detection = detect_disks(frame.view(), &DiskDetectionConfig::default()).unwrap();
        assert_eq!(detection.component_count, 0);
        assert!(detection.disks.is_empty());
        assert!(detection.best().is_none());
    }

    #[test]
    fn test_straight_strip_is_flagged_not_fatal() {
        // A one-pixel-high bar leaves only collinear boundary points
        let mut frame = Array2::from_elem((20, 40), 0.1);
        for col in 5..35 {
            frame[[10, col]] = 0.9;
        }
        let config = DiskDetectionConfig {
            blur_sigma: 0.0,
            equalize: false,
            ..Default::default()
        };
        let detection = detect_disks(frame.view(), &config).unwrap();

        assert_eq!(detection.disks.len(), 1);
        assert_eq!(detection.disks[0].fit.status, FitStatus::Degenerate);
        assert!(detection.best().is_none());
    }

    #[test]
    fn test_frame_errors() {
        let config = DiskDetectionConfig::default();

        let empty = Array2::<f64>::zeros((0, 10));
        assert!(matches!(
            detect_disks(empty.view(), &config),
            Err(DetectionError::EmptyImage { rows: 0, cols: 10 })
        ));

        let mut bad = Array2::zeros((5, 5));
        bad[[2, 3]] = f64::NAN;
        assert!(matches!(
            detect_disks(bad.view(), &config),
            Err(DetectionError::NonFiniteImage { row: 2, col: 3 })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let frame = Array2::zeros((8, 8));
        let config = DiskDetectionConfig {
            histogram_bins: 1,
            ..Default::default()
        };
        let err = detect_disks(frame.view(), &config).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidConfig(msg) if msg.contains("histogram_bins")));
    }

    #[test]
    fn test_oversized_blur_is_rejected_before_allocating() {
        let frame = SyntheticDisk::new(16, 16, 8.0, 8.0, 4.0).render();
        let config = DiskDetectionConfig {
            blur_sigma: 1e15,
            ..Default::default()
        };
        let err = detect_disks(frame.view(), &config).unwrap_err();
        assert!(matches!(err, DetectionError::InvalidConfig(msg) if msg.contains("blur_sigma")));
    }

    #[test]
    fn test_invalid_fit_settings_surface_as_fit_error() {
        let frame = Array2::zeros((8, 8));
        let mut config = DiskDetectionConfig::default();
        config.fit.solver.max_iterations = 0;
        let err = detect_disks(frame.view(), &config).unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Fit(CircleFitError::InvalidConfig(msg)) if msg.contains("max_iterations")
        ));
    }

    #[test]
    fn test_drop_frame_edge() {
        let contour = vec![
            Vector2::new(0.0, 3.0),
            Vector2::new(1.0, 3.0),
            Vector2::new(9.0, 4.0),
            Vector2::new(4.0, 0.0),
            Vector2::new(4.0, 5.0),
        ];
        let kept = drop_frame_edge(contour, 6, 10);
        assert_eq!(kept, vec![Vector2::new(1.0, 3.0)]);
    }
}
