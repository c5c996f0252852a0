//! Threshold calibration against a clear track

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::NoiseStatistics;

/// How long samples are collected (milliseconds)
pub const CALIBRATION_WINDOW_MS: u64 = 3000;
/// Standard deviations above the noise mean for the trigger threshold
pub const NOISE_SIGMAS: f64 = 3.0;
/// Lowest threshold calibration may produce
pub const MIN_THRESHOLD: f64 = 5.0;
/// Highest threshold calibration may produce
pub const MAX_THRESHOLD: f64 = 100.0;

/// Derive a trigger threshold from noise samples.
///
/// `round(clamp(mean + 3 * std_dev, 5, 100))`; `None` for an empty sample set
/// so the caller keeps its current threshold.
pub fn calibrate_threshold(samples: &[f64]) -> Option<f64> {
    let stats = NoiseStatistics::compute(samples)?;
    Some(
        stats
            .upper_bound(NOISE_SIGMAS)
            .clamp(MIN_THRESHOLD, MAX_THRESHOLD)
            .round(),
    )
}

/// Result of a finished calibration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    /// New threshold, or `None` when no positive samples were seen
    pub threshold: Option<f64>,
    /// Statistics of the pooled positive samples
    pub statistics: Option<NoiseStatistics>,
    /// Raw samples recorded per lane
    pub samples_per_lane: BTreeMap<u32, usize>,
}

/// Collects per-lane smoothed scores for a fixed window, then pools them.
#[derive(Debug, Clone)]
pub struct Calibrator {
    window_ms: u64,
    started_at: Option<u64>,
    samples: BTreeMap<u32, Vec<f64>>,
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CALIBRATION_WINDOW_MS)
    }
}

impl Calibrator {
    /// Create an idle calibrator with the given collection window
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            started_at: None,
            samples: BTreeMap::new(),
        }
    }

    /// Start (or restart) collecting at `now_ms`, discarding earlier samples
    pub fn begin(&mut self, now_ms: u64) {
        info!("Calibration started ({} ms window)", self.window_ms);
        self.started_at = Some(now_ms);
        self.samples.clear();
    }

    /// Whether samples are currently being collected
    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Record one lane's smoothed score for the current frame
    pub fn record(&mut self, lane_id: u32, score: f64) {
        if self.started_at.is_none() {
            return;
        }
        self.samples.entry(lane_id).or_default().push(score);
    }

    /// Whether the collection window has elapsed at `now_ms`
    pub fn is_due(&self, now_ms: u64) -> bool {
        self.started_at
            .is_some_and(|start| now_ms.saturating_sub(start) >= self.window_ms)
    }

    /// Milliseconds left in the window (0 when idle or due)
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.started_at
            .map(|start| self.window_ms.saturating_sub(now_ms.saturating_sub(start)))
            .unwrap_or(0)
    }

    /// Stop collecting and compute the outcome; `None` if not calibrating
    pub fn finish(&mut self) -> Option<CalibrationOutcome> {
        self.started_at.take()?;

        let samples = std::mem::take(&mut self.samples);
        let samples_per_lane = samples.iter().map(|(id, s)| (*id, s.len())).collect();
        let pooled: Vec<f64> = samples
            .into_values()
            .flatten()
            .filter(|s| *s > 0.0)
            .collect();

        let statistics = NoiseStatistics::compute(&pooled);
        let threshold = calibrate_threshold(&pooled);

        match (&statistics, threshold) {
            (Some(stats), Some(threshold)) => info!(
                "Calibration finished: {} samples, mean {:.2}, std dev {:.2} -> threshold {}",
                stats.count, stats.mean, stats.std_dev, threshold
            ),
            _ => warn!("Calibration finished without positive samples; threshold unchanged"),
        }
        debug!("Calibration samples per lane: {:?}", samples_per_lane);

        Some(CalibrationOutcome {
            threshold,
            statistics,
            samples_per_lane,
        })
    }

    /// Abandon the current run without producing an outcome
    pub fn cancel(&mut self) {
        if self.started_at.take().is_some() {
            info!("Calibration cancelled");
        }
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibrate_threshold_formula() {
        // mean 5, std dev 2 -> 11
        let samples = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(calibrate_threshold(&samples), Some(11.0));
    }

    #[test]
    fn test_calibrate_threshold_bounds() {
        assert_eq!(calibrate_threshold(&[0.5, 0.6, 0.7]), Some(MIN_THRESHOLD));
        assert_eq!(calibrate_threshold(&[150.0, 250.0]), Some(MAX_THRESHOLD));
        assert_eq!(calibrate_threshold(&[]), None);
    }

    #[test]
    fn test_calibrate_threshold_rounds() {
        // Constant samples: std dev 0
        assert_eq!(calibrate_threshold(&[7.4; 10]), Some(7.0));
        assert_eq!(calibrate_threshold(&[7.6; 10]), Some(8.0));
    }

    #[test]
    fn test_calibrator_window() {
        let mut cal = Calibrator::default();
        assert!(!cal.is_due(10_000));
        cal.begin(1_000);
        assert!(cal.is_active());
        assert!(!cal.is_due(3_999));
        assert_eq!(cal.remaining_ms(2_000), 2_000);
        assert!(cal.is_due(4_000));
    }

    #[test]
    fn test_pools_positive_samples_across_lanes() {
        let mut cal = Calibrator::default();
        cal.begin(0);
        for v in [0.0, 2.0, 4.0, 4.0, 4.0] {
            cal.record(0, v);
        }
        for v in [5.0, 5.0, 7.0, 9.0, 0.0] {
            cal.record(1, v);
        }
        let outcome = cal.finish().unwrap();
        assert_eq!(outcome.threshold, Some(11.0));
        assert_eq!(outcome.statistics.unwrap().count, 8);
        assert_eq!(outcome.samples_per_lane.get(&0), Some(&5));
        assert!(!cal.is_active());
    }

    #[test]
    fn test_no_positive_samples_leaves_threshold() {
        let mut cal = Calibrator::default();
        cal.begin(0);
        cal.record(0, 0.0);
        let outcome = cal.finish().unwrap();
        assert_eq!(outcome.threshold, None);
        assert!(outcome.statistics.is_none());
    }

    #[test]
    fn test_idle_calibrator_ignores_samples() {
        let mut cal = Calibrator::default();
        cal.record(0, 50.0);
        assert!(cal.finish().is_none());
        cal.begin(0);
        let outcome = cal.finish().unwrap();
        assert!(outcome.samples_per_lane.is_empty());
    }

    #[test]
    fn test_begin_discards_previous_samples() {
        let mut cal = Calibrator::default();
        cal.begin(0);
        cal.record(0, 90.0);
        cal.begin(100);
        cal.record(0, 6.0);
        assert_eq!(cal.finish().unwrap().threshold, Some(6.0));
    }
}
