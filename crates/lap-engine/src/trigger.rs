//! Per-lane crossing trigger
//!
//! Two states: `Idle` (lane not racing) and `Armed` (racing, waiting for a
//! qualifying rise). Cooldown is a timestamp guard on the armed state, not a
//! state of its own, so scores keep flowing while a lane is cooling down.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{DetectionConfig, LaneId};

/// Trigger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerState {
    /// Not racing; never emits
    #[default]
    Idle,
    /// Racing; emits when the score qualifies and the cooldown has passed
    Armed,
}

/// A debounced finish-line crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossingEvent {
    pub lane_id: LaneId,
    pub at_ms: u64,
}

/// Threshold + cooldown gate for one lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneTrigger {
    lane_id: LaneId,
    state: TriggerState,
    /// Time of the last accepted crossing
    last_trigger_ms: Option<u64>,
}

impl LaneTrigger {
    /// Create an idle trigger
    pub fn new(lane_id: LaneId) -> Self {
        Self {
            lane_id,
            state: TriggerState::Idle,
            last_trigger_ms: None,
        }
    }

    /// Rebuild a trigger from persisted parts
    pub fn from_parts(lane_id: LaneId, state: TriggerState, last_trigger_ms: Option<u64>) -> Self {
        Self {
            lane_id,
            state,
            last_trigger_ms,
        }
    }

    /// Start racing with no cooldown pending
    pub fn arm(&mut self) {
        self.state = TriggerState::Armed;
        self.last_trigger_ms = None;
    }

    /// Stop emitting; the last trigger time is kept
    pub fn disarm(&mut self) {
        self.state = TriggerState::Idle;
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == TriggerState::Armed
    }

    pub fn last_trigger_ms(&self) -> Option<u64> {
        self.last_trigger_ms
    }

    /// Whether the cooldown since the last accepted crossing has passed
    pub fn cooldown_elapsed(&self, now_ms: u64, cooldown_ms: u64) -> bool {
        self.last_trigger_ms
            .map_or(true, |last| now_ms.saturating_sub(last) >= cooldown_ms)
    }

    /// Evaluate one frame's smoothed score. Call at most once per frame.
    pub fn evaluate(
        &mut self,
        smoothed_score: f64,
        now_ms: u64,
        config: &DetectionConfig,
    ) -> Option<CrossingEvent> {
        if self.state != TriggerState::Armed || smoothed_score < config.threshold {
            return None;
        }

        if !self.cooldown_elapsed(now_ms, config.cooldown_ms) {
            debug!(
                "Lane {} crossing suppressed: in cooldown (score {:.1})",
                self.lane_id, smoothed_score
            );
            return None;
        }

        self.last_trigger_ms = Some(now_ms);
        debug!(
            "Lane {} crossing at {} ms (score {:.1})",
            self.lane_id, now_ms, smoothed_score
        );
        Some(CrossingEvent {
            lane_id: self.lane_id,
            at_ms: now_ms,
        })
    }
}
