//! Serializable race state for crash recovery
//!
//! Only laps and derived statistics are captured; sampled grids and
//! smoothing buffers are rebuilt from the next frames.

use serde::{Deserialize, Serialize};

use crate::{LaneId, LapRecord, TrackConfig};

/// One lane's recoverable state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneSnapshot {
    pub lane_id: LaneId,
    pub is_running: bool,
    pub start_time_ms: Option<u64>,
    pub last_lap_ms: Option<u64>,
    pub last_trigger_ms: Option<u64>,
    pub laps: Vec<LapRecord>,
    pub best_lap_ms: Option<u64>,
    pub avg_lap_ms: Option<f64>,
}

/// Recoverable state of a running race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSnapshot {
    /// Race start on the engine clock (ms)
    pub start_time_ms: u64,
    /// Race time elapsed when the snapshot was taken (ms)
    pub elapsed_ms: u64,
    pub lanes: Vec<LaneSnapshot>,
    pub track: TrackConfig,
}

impl RaceSnapshot {
    /// Whether any lane has completed a lap
    pub fn has_laps(&self) -> bool {
        self.lanes.iter().any(|l| !l.laps.is_empty())
    }

    /// Total laps across lanes
    pub fn lap_count(&self) -> usize {
        self.lanes.iter().map(|l| l.laps.len()).sum()
    }
}
