//! Solar disk detection and measurement.
//!
//! Finds the Sun in a photograph and measures its apparent radius and center
//! in pixels by fitting a circle to the outline of each bright region.
//!
//! - [`detect`]: the segmentation and fitting pipeline
//! - [`image_proc`]: the image operations the pipeline is built from
//! - [`synthetic`]: frames with a known disk for testing
//! - [`config`]: pipeline settings and their JSON form

pub mod config;
pub mod detect;
pub mod image_proc;
pub mod synthetic;

pub use config::{ConfigError, DiskDetectionConfig, MAX_BLUR_RADIUS};
pub use detect::{
    detect_disks, detect_disks_rgb, preprocess, DetectedDisk, DetectionError, DiskDetection,
};
pub use synthetic::SyntheticDisk;
