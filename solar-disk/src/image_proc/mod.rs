//! Image processing for solar disk segmentation
//!
//! In-memory operations on `ndarray` frames: intensity conversion, Gaussian
//! smoothing, Otsu thresholding, component labeling and contour tracing.

pub mod boundary;
pub mod convolve;
pub mod enhance;
pub mod thresholding;

// Re-export key functionality for easier access
pub use boundary::{trace_all_boundaries, trace_boundary};
pub use convolve::{gaussian_blur, gaussian_kernel_1d};
pub use enhance::{equalize_histogram, to_grayscale, value_range};
pub use thresholding::{apply_threshold, component_sizes, connected_components, otsu_threshold};
