//! Per-lane race state

use crate::{
    CrossingEvent, DetectionConfig, LaneId, LaneSnapshot, LaneTrigger, LapAdded, LapLedger,
    LapRecord, TriggerState,
};

/// Mutable race state of one lane: trigger, ledger and latest score.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneRunState {
    lane_id: LaneId,
    start_time_ms: Option<u64>,
    trigger: LaneTrigger,
    ledger: LapLedger,
    smoothed_score: f64,
}

impl LaneRunState {
    /// Idle lane with no history
    pub fn new(lane_id: LaneId) -> Self {
        Self {
            lane_id,
            start_time_ms: None,
            trigger: LaneTrigger::new(lane_id),
            ledger: LapLedger::new(),
            smoothed_score: 0.0,
        }
    }

    /// Fresh running lane; lap 1 is measured from `now_ms`
    pub fn started(lane_id: LaneId, now_ms: u64) -> Self {
        let mut state = Self::new(lane_id);
        state.start_time_ms = Some(now_ms);
        state.trigger.arm();
        state.ledger.arm(now_ms);
        state
    }

    /// Stop emitting crossings; laps are kept
    pub fn stop(&mut self) {
        self.trigger.disarm();
    }

    /// Continue racing; the interrupted lap restarts at `now_ms`
    pub fn resume(&mut self, now_ms: u64) {
        self.trigger.arm();
        self.ledger.arm(now_ms);
    }

    /// Run the trigger for this frame and pass any crossing to the ledger
    pub fn on_frame(
        &mut self,
        smoothed_score: f64,
        now_ms: u64,
        race_start_ms: u64,
        config: &DetectionConfig,
    ) -> (Option<CrossingEvent>, Option<LapAdded>) {
        self.smoothed_score = smoothed_score;
        match self.trigger.evaluate(smoothed_score, now_ms, config) {
            Some(event) => (Some(event), self.ledger.record_crossing(event, race_start_ms)),
            None => (None, None),
        }
    }

    pub fn lane_id(&self) -> LaneId {
        self.lane_id
    }

    pub fn is_running(&self) -> bool {
        self.trigger.is_armed()
    }

    pub fn start_time_ms(&self) -> Option<u64> {
        self.start_time_ms
    }

    /// Time of the last accepted crossing that reached the ledger
    pub fn last_lap_time_ms(&self) -> Option<u64> {
        self.ledger.last_lap_ms()
    }

    /// Time of the last crossing accepted by the debounce gate
    pub fn last_trigger_time_ms(&self) -> Option<u64> {
        self.trigger.last_trigger_ms()
    }

    pub fn laps(&self) -> &[LapRecord] {
        self.ledger.laps()
    }

    pub fn lap_count(&self) -> usize {
        self.ledger.lap_count()
    }

    pub fn last_lap(&self) -> Option<&LapRecord> {
        self.ledger.last_lap()
    }

    pub fn best_lap_ms(&self) -> Option<u64> {
        self.ledger.best_lap_ms()
    }

    pub fn avg_lap_ms(&self) -> Option<f64> {
        self.ledger.avg_lap_ms()
    }

    pub fn total_lap_ms(&self) -> u64 {
        self.ledger.total_lap_ms()
    }

    pub fn smoothed_score(&self) -> f64 {
        self.smoothed_score
    }

    pub(crate) fn set_smoothed_score(&mut self, score: f64) {
        self.smoothed_score = score;
    }

    /// Serializable copy of the laps and derived statistics
    pub fn snapshot(&self) -> LaneSnapshot {
        LaneSnapshot {
            lane_id: self.lane_id,
            is_running: self.is_running(),
            start_time_ms: self.start_time_ms,
            last_lap_ms: self.ledger.last_lap_ms(),
            last_trigger_ms: self.trigger.last_trigger_ms(),
            laps: self.ledger.laps().to_vec(),
            best_lap_ms: self.ledger.best_lap_ms(),
            avg_lap_ms: self.ledger.avg_lap_ms(),
        }
    }

    /// Rebuild from a snapshot; the lane is never running afterwards
    pub fn from_snapshot(snapshot: LaneSnapshot) -> Self {
        Self {
            lane_id: snapshot.lane_id,
            start_time_ms: snapshot.start_time_ms,
            trigger: LaneTrigger::from_parts(
                snapshot.lane_id,
                TriggerState::Idle,
                snapshot.last_trigger_ms,
            ),
            ledger: LapLedger::restore(snapshot.laps, snapshot.last_lap_ms),
            smoothed_score: 0.0,
        }
    }
}
