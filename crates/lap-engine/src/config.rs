//! Track, detection and race configuration

use frame_sampler::Region;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::LaneId;

/// Most lanes a track may have
pub const MAX_LANES: usize = 4;
/// Longest lane display name (characters)
pub const MAX_LANE_NAME_LEN: usize = 12;

/// Display colours for the default lanes
pub const LANE_COLORS: [&str; MAX_LANES] = ["#ef4444", "#3b82f6", "#22c55e", "#f59e0b"];

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Lane name empty or too long
    #[error("Lane name must be 1-{max} characters, got {len}")]
    LaneName { len: usize, max: usize },

    /// Lane ids must run 0..N-1 in list order
    #[error("Lane at position {index} has id {id}")]
    LaneId { index: usize, id: LaneId },
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min || value > max {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

/// Detection parameters shared by all lanes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Smoothed change score that counts as a crossing (score units)
    pub threshold: f64,
    /// Minimum time between accepted crossings on one lane (milliseconds)
    pub cooldown_ms: u64,
    /// Moving-average window size (frames)
    pub smoothing: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 12.0,
            cooldown_ms: 400,
            smoothing: 2,
        }
    }
}

impl DetectionConfig {
    pub const THRESHOLD_RANGE: (f64, f64) = (1.0, 100.0);
    pub const COOLDOWN_RANGE_MS: (u64, u64) = (100, 2000);
    pub const SMOOTHING_RANGE: (usize, usize) = (1, 10);

    /// Check every field against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (lo, hi) = Self::THRESHOLD_RANGE;
        check_range("threshold", self.threshold, lo, hi)?;
        let (lo, hi) = Self::COOLDOWN_RANGE_MS;
        check_range("cooldown_ms", self.cooldown_ms as f64, lo as f64, hi as f64)?;
        let (lo, hi) = Self::SMOOTHING_RANGE;
        check_range("smoothing", self.smoothing as f64, lo as f64, hi as f64)
    }

    /// Pull every field into its allowed range
    pub fn clamped(self) -> Self {
        let threshold = if self.threshold.is_nan() {
            Self::default().threshold
        } else {
            self.threshold
                .clamp(Self::THRESHOLD_RANGE.0, Self::THRESHOLD_RANGE.1)
        };
        Self {
            threshold,
            cooldown_ms: self
                .cooldown_ms
                .clamp(Self::COOLDOWN_RANGE_MS.0, Self::COOLDOWN_RANGE_MS.1),
            smoothing: self
                .smoothing
                .clamp(Self::SMOOTHING_RANGE.0, Self::SMOOTHING_RANGE.1),
        }
    }
}

/// Race termination policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RaceMode {
    /// Never ends on its own
    #[default]
    Free,
    /// First lane to complete `target_laps` wins
    Laps,
    /// Ends after `target_time_secs`; most laps wins
    Time,
}

/// Race settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceConfig {
    pub mode: RaceMode,
    /// Laps needed to win in `Laps` mode
    pub target_laps: u32,
    /// Race duration in `Time` mode (seconds)
    pub target_time_secs: u64,
    /// Track length used for speed display (meters)
    pub track_length_m: f64,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            mode: RaceMode::Free,
            target_laps: 10,
            target_time_secs: 300,
            track_length_m: 5.5,
        }
    }
}

impl RaceConfig {
    pub const MIN_TARGET_LAPS: u32 = 1;
    pub const MIN_TARGET_TIME_SECS: u64 = 60;

    /// Race duration in `Time` mode (milliseconds)
    pub fn target_time_ms(&self) -> u64 {
        self.target_time_secs.saturating_mul(1000)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "target_laps",
            self.target_laps as f64,
            Self::MIN_TARGET_LAPS as f64,
            u32::MAX as f64,
        )?;
        check_range(
            "target_time_secs",
            self.target_time_secs as f64,
            Self::MIN_TARGET_TIME_SECS as f64,
            u64::MAX as f64,
        )?;
        check_range("track_length_m", self.track_length_m, 0.0, f64::MAX)
    }

    pub fn clamped(self) -> Self {
        let track_length_m = if self.track_length_m.is_finite() && self.track_length_m >= 0.0 {
            self.track_length_m
        } else {
            Self::default().track_length_m
        };
        Self {
            target_laps: self.target_laps.max(Self::MIN_TARGET_LAPS),
            target_time_secs: self.target_time_secs.max(Self::MIN_TARGET_TIME_SECS),
            track_length_m,
            ..self
        }
    }
}

/// One timed lane of the track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneConfig {
    pub id: LaneId,
    pub name: String,
    /// Display token, not interpreted by the engine
    pub color: String,
    pub enabled: bool,
    pub region: Region,
}

impl LaneConfig {
    /// Default lane `index` of a track with `total` lanes
    pub fn default_for(index: usize, total: usize) -> Self {
        Self {
            id: index as LaneId,
            name: format!("Lane {}", index + 1),
            color: LANE_COLORS[index % MAX_LANES].to_string(),
            enabled: true,
            region: default_region(index, total),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_lane_name(&self.name)
    }
}

fn validate_lane_name(name: &str) -> Result<(), ConfigError> {
    let len = name.chars().count();
    if len == 0 || len > MAX_LANE_NAME_LEN {
        return Err(ConfigError::LaneName {
            len,
            max: MAX_LANE_NAME_LEN,
        });
    }
    Ok(())
}

/// Regions stacked vertically, centred in the frame
fn default_region(index: usize, total: usize) -> Region {
    let height = 0.15;
    let gap = 0.02;
    let total = total.max(1) as f32;
    let block = total * height + (total - 1.0) * gap;
    let start_y = (1.0 - block) / 2.0;
    Region::new(0.25, start_y + index as f32 * (height + gap), 0.5, height)
}

/// Partial lane edit; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub enabled: Option<bool>,
    pub region: Option<Region>,
}

impl LaneUpdate {
    /// Apply to `lane`; nothing changes if validation fails
    pub fn apply(self, lane: &mut LaneConfig) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            validate_lane_name(name)?;
        }
        if let Some(name) = self.name {
            lane.name = name;
        }
        if let Some(color) = self.color {
            lane.color = color;
        }
        if let Some(enabled) = self.enabled {
            lane.enabled = enabled;
        }
        if let Some(region) = self.region {
            lane.region = region.clamped();
        }
        Ok(())
    }
}

/// Complete persisted track setup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub lanes: Vec<LaneConfig>,
    pub detection: DetectionConfig,
    pub race: RaceConfig,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            lanes: Self::default_lanes(2),
            detection: DetectionConfig::default(),
            race: RaceConfig::default(),
        }
    }
}

impl TrackConfig {
    /// Default lanes for a track with `count` lanes (clamped to 1..=4)
    pub fn default_lanes(count: usize) -> Vec<LaneConfig> {
        let count = count.clamp(1, MAX_LANES);
        (0..count).map(|i| LaneConfig::default_for(i, count)).collect()
    }

    pub fn lane(&self, id: LaneId) -> Option<&LaneConfig> {
        self.lanes.iter().find(|l| l.id == id)
    }

    pub fn lane_mut(&mut self, id: LaneId) -> Option<&mut LaneConfig> {
        self.lanes.iter_mut().find(|l| l.id == id)
    }

    /// Enabled lanes in id order
    pub fn enabled_lanes(&self) -> impl Iterator<Item = &LaneConfig> {
        self.lanes.iter().filter(|l| l.enabled)
    }

    /// Replace lanes with defaults when the count changes
    pub fn set_lane_count(&mut self, count: usize) -> Result<(), ConfigError> {
        check_range("lane_count", count as f64, 1.0, MAX_LANES as f64)?;
        if self.lanes.len() != count {
            self.lanes = Self::default_lanes(count);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("lane_count", self.lanes.len() as f64, 1.0, MAX_LANES as f64)?;
        for (index, lane) in self.lanes.iter().enumerate() {
            if lane.id != index as LaneId {
                return Err(ConfigError::LaneId { index, id: lane.id });
            }
            lane.validate()?;
        }
        self.detection.validate()?;
        self.race.validate()
    }

    /// Repair a loaded configuration instead of rejecting it
    pub fn sanitized(mut self) -> Self {
        if self.lanes.is_empty() || self.lanes.len() > MAX_LANES {
            warn!(
                "Invalid lane count {}, using default lanes",
                self.lanes.len()
            );
            self.lanes = Self::default_lanes(self.lanes.len());
        }
        for (index, lane) in self.lanes.iter_mut().enumerate() {
            if lane.id != index as LaneId {
                warn!("Lane id {} at position {} re-indexed", lane.id, index);
                lane.id = index as LaneId;
            }
        }
        for lane in &mut self.lanes {
            lane.region = lane.region.clamped();
            if validate_lane_name(&lane.name).is_err() {
                let trimmed: String = lane.name.chars().take(MAX_LANE_NAME_LEN).collect();
                lane.name = if trimmed.is_empty() {
                    format!("Lane {}", lane.id + 1)
                } else {
                    trimmed
                };
            }
        }
        self.detection = self.detection.clamped();
        self.race = self.race.clamped();
        self
    }
}
