//! Noise statistics over score samples

use serde::{Deserialize, Serialize};

/// Summary statistics of a sample set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoiseStatistics {
    /// Number of samples
    pub count: usize,
    /// Mean value
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
}

impl NoiseStatistics {
    /// Compute statistics from a slice of values; `None` when empty
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);

        let m2: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        let std_dev = (m2 / n).sqrt();

        Some(Self {
            count: values.len(),
            mean,
            std_dev,
            min,
            max,
        })
    }

    /// `mean + sigmas * std_dev`
    pub fn upper_bound(&self, sigmas: f64) -> f64 {
        self.mean + sigmas * self.std_dev
    }
}
