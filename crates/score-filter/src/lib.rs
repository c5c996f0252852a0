//! Score Filtering
//!
//! Per-lane signal conditioning for change scores:
//! - Bounded moving-average smoothing
//! - Noise statistics over a sample set
//! - Timed threshold calibration against a clear track

mod calibration;
mod smoothing;
mod statistics;

pub use calibration::{
    calibrate_threshold, CalibrationOutcome, Calibrator, CALIBRATION_WINDOW_MS, MAX_THRESHOLD,
    MIN_THRESHOLD, NOISE_SIGMAS,
};
pub use smoothing::{SmoothingWindow, MAX_WINDOW, MIN_WINDOW};
pub use statistics::NoiseStatistics;
