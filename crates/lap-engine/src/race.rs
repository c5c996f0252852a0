//! Race control
//!
//! Owns every lane's run state for the active race and applies the
//! termination rule of the configured race mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::standings::leader;
use crate::{
    CrossingEvent, DetectionConfig, EngineError, LaneId, LaneRunState, LapAdded, RaceConfig,
    RaceMode, RaceSnapshot, TrackConfig,
};

/// Why the race ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationCause {
    #[default]
    None,
    LapsReached,
    TimeElapsed,
    ManualStop,
}

/// Result of a finished race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub cause: TerminationCause,
    pub winner: Option<LaneId>,
}

/// Race state for all lanes
#[derive(Debug, Clone, Default)]
pub struct RaceController {
    lanes: BTreeMap<LaneId, LaneRunState>,
    race_start_ms: Option<u64>,
    running: bool,
    elapsed_at_stop_ms: u64,
    outcome: Option<RaceOutcome>,
}

impl RaceController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a race on `lane_ids`. Returns false if a race is already running.
    pub fn start<I>(&mut self, now_ms: u64, lane_ids: I) -> bool
    where
        I: IntoIterator<Item = LaneId>,
    {
        if self.running {
            debug!("Start ignored: race already running");
            return false;
        }

        self.lanes = lane_ids
            .into_iter()
            .map(|id| (id, LaneRunState::started(id, now_ms)))
            .collect();
        self.race_start_ms = Some(now_ms);
        self.running = true;
        self.elapsed_at_stop_ms = 0;
        self.outcome = None;

        info!("Race started at {} ms with {} lanes", now_ms, self.lanes.len());
        true
    }

    /// Manual stop. No winner is declared.
    pub fn stop(&mut self, now_ms: u64) -> Option<RaceOutcome> {
        self.finish(TerminationCause::ManualStop, None, now_ms)
    }

    fn finish(
        &mut self,
        cause: TerminationCause,
        winner: Option<LaneId>,
        now_ms: u64,
    ) -> Option<RaceOutcome> {
        if !self.running {
            return None;
        }

        for lane in self.lanes.values_mut() {
            lane.stop();
        }
        self.elapsed_at_stop_ms = self.elapsed_ms(now_ms);
        self.running = false;
        let outcome = RaceOutcome { cause, winner };
        self.outcome = Some(outcome);

        info!(
            "Race finished after {} ms: {:?}, winner {:?}",
            self.elapsed_at_stop_ms, cause, winner
        );
        Some(outcome)
    }

    /// Discard all race state
    pub fn reset(&mut self) {
        if self.race_start_ms.is_some() {
            info!("Race reset");
        }
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a race (running or stopped) holds state
    pub fn has_race(&self) -> bool {
        self.race_start_ms.is_some()
    }

    pub fn race_start_ms(&self) -> Option<u64> {
        self.race_start_ms
    }

    /// Race time at `now_ms`; frozen once stopped
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        match (self.running, self.race_start_ms) {
            (true, Some(start)) => now_ms.saturating_sub(start),
            _ => self.elapsed_at_stop_ms,
        }
    }

    pub fn outcome(&self) -> Option<RaceOutcome> {
        self.outcome
    }

    pub fn cause(&self) -> TerminationCause {
        self.outcome.map_or(TerminationCause::None, |o| o.cause)
    }

    pub fn winner(&self) -> Option<LaneId> {
        self.outcome.and_then(|o| o.winner)
    }

    pub fn lane(&self, lane_id: LaneId) -> Option<&LaneRunState> {
        self.lanes.get(&lane_id)
    }

    pub fn lanes(&self) -> &BTreeMap<LaneId, LaneRunState> {
        &self.lanes
    }

    pub(crate) fn lane_mut(&mut self, lane_id: LaneId) -> Option<&mut LaneRunState> {
        self.lanes.get_mut(&lane_id)
    }

    /// Feed one lane's smoothed score for this frame
    pub fn process_score(
        &mut self,
        lane_id: LaneId,
        smoothed_score: f64,
        now_ms: u64,
        config: &DetectionConfig,
    ) -> (Option<CrossingEvent>, Option<LapAdded>) {
        let Some(start) = self.race_start_ms else {
            return (None, None);
        };
        match self.lanes.get_mut(&lane_id) {
            Some(lane) => lane.on_frame(smoothed_score, now_ms, start, config),
            None => (None, None),
        }
    }

    /// Apply the lap-target rule after `lane_id` recorded a lap.
    ///
    /// The first lane to reach the target wins; later arrivals in the same
    /// frame keep their lap but the race is already over.
    pub fn on_lap_added(
        &mut self,
        lane_id: LaneId,
        race: &RaceConfig,
        now_ms: u64,
    ) -> Option<RaceOutcome> {
        if !self.running || race.mode != RaceMode::Laps {
            return None;
        }
        let laps = self.lanes.get(&lane_id)?.lap_count();
        if laps >= race.target_laps as usize {
            return self.finish(TerminationCause::LapsReached, Some(lane_id), now_ms);
        }
        None
    }

    /// Apply the time-target rule. Winner: most laps, then fastest best lap.
    pub fn check_time_expired(&mut self, now_ms: u64, race: &RaceConfig) -> Option<RaceOutcome> {
        if !self.running || race.mode != RaceMode::Time {
            return None;
        }
        if self.elapsed_ms(now_ms) < race.target_time_ms() {
            return None;
        }
        let winner = leader(self.lanes.values());
        self.finish(TerminationCause::TimeElapsed, winner, now_ms)
    }

    /// Capture the current race for recovery
    pub fn snapshot(&self, now_ms: u64, track: &TrackConfig) -> Option<RaceSnapshot> {
        let start_time_ms = self.race_start_ms?;
        Some(RaceSnapshot {
            start_time_ms,
            elapsed_ms: self.elapsed_ms(now_ms),
            lanes: self.lanes.values().map(LaneRunState::snapshot).collect(),
            track: track.clone(),
        })
    }

    /// Rebuild from a snapshot. Nothing runs until `resume`.
    pub fn restore(&mut self, snapshot: &RaceSnapshot) {
        self.lanes = snapshot
            .lanes
            .iter()
            .cloned()
            .map(|lane| (lane.lane_id, LaneRunState::from_snapshot(lane)))
            .collect();
        self.race_start_ms = Some(snapshot.start_time_ms);
        self.running = false;
        self.elapsed_at_stop_ms = snapshot.elapsed_ms;
        self.outcome = None;

        info!(
            "Race restored: {} lanes, {} laps, {} ms elapsed",
            self.lanes.len(),
            snapshot.lap_count(),
            snapshot.elapsed_ms
        );
    }

    /// Continue a stopped or restored race.
    ///
    /// The race clock is rebased so relative times continue from the
    /// elapsed time; each lane's interrupted lap restarts at `now_ms`.
    pub fn resume(&mut self, now_ms: u64) -> Result<(), EngineError> {
        if self.running {
            return Err(EngineError::RaceInProgress);
        }
        if self.race_start_ms.is_none() || self.lanes.is_empty() {
            return Err(EngineError::NothingToResume);
        }

        let elapsed = self.elapsed_at_stop_ms;
        self.race_start_ms = Some(now_ms.saturating_sub(elapsed));
        for lane in self.lanes.values_mut() {
            lane.resume(now_ms);
        }
        self.running = true;
        self.outcome = None;

        info!("Race resumed at {} ms ({} ms elapsed)", now_ms, elapsed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection() -> DetectionConfig {
        DetectionConfig {
            threshold: 10.0,
            cooldown_ms: 400,
            smoothing: 1,
        }
    }

    fn lap_race(target_laps: u32) -> RaceConfig {
        RaceConfig {
            mode: RaceMode::Laps,
            target_laps,
            ..RaceConfig::default()
        }
    }

    #[test]
    fn test_start_is_idempotent() {
        let mut race = RaceController::new();
        assert!(race.start(100, [0, 1]));
        assert!(!race.start(500, [0]));
        assert_eq!(race.race_start_ms(), Some(100));
        assert_eq!(race.lanes().len(), 2);
    }

    #[test]
    fn test_stop_keeps_laps_and_blocks_triggers() {
        let mut race = RaceController::new();
        race.start(0, [0]);
        race.process_score(0, 50.0, 1_000, &detection());
        let outcome = race.stop(1_500).unwrap();
        assert_eq!(outcome.cause, TerminationCause::ManualStop);
        assert_eq!(outcome.winner, None);
        assert!(race.stop(1_600).is_none());

        let (event, _) = race.process_score(0, 50.0, 3_000, &detection());
        assert!(event.is_none());
        assert_eq!(race.lane(0).unwrap().lap_count(), 1);
        assert_eq!(race.elapsed_ms(9_000), 1_500);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut race = RaceController::new();
        race.start(0, [0]);
        race.process_score(0, 50.0, 1_000, &detection());
        race.reset();
        race.reset();
        assert!(!race.has_race());
        assert!(race.lanes().is_empty());
        assert_eq!(race.cause(), TerminationCause::None);
    }

    #[test]
    fn test_first_lane_to_target_wins() {
        let mut race = RaceController::new();
        let cfg = lap_race(2);
        race.start(0, [0, 1]);
        for t in [1_000, 2_000] {
            race.process_score(0, 50.0, t, &detection());
            race.process_score(1, 50.0, t, &detection());
        }
        // Both lanes hit two laps in the same frame; lane 1 is handled first
        assert_eq!(
            race.on_lap_added(1, &cfg, 2_000),
            Some(RaceOutcome {
                cause: TerminationCause::LapsReached,
                winner: Some(1),
            })
        );
        assert_eq!(race.on_lap_added(0, &cfg, 2_000), None);
        assert_eq!(race.winner(), Some(1));
        assert_eq!(race.lane(0).unwrap().lap_count(), 2);
    }

    #[test]
    fn test_time_expiry_picks_leader() {
        let mut race = RaceController::new();
        let cfg = RaceConfig {
            mode: RaceMode::Time,
            target_time_secs: 60,
            ..RaceConfig::default()
        };
        race.start(0, [0, 1]);
        for t in [10_000, 20_000] {
            race.process_score(0, 50.0, t, &detection());
        }
        for t in [9_000, 19_500] {
            race.process_score(1, 50.0, t, &detection());
        }
        assert!(race.check_time_expired(59_999, &cfg).is_none());
        let outcome = race.check_time_expired(60_000, &cfg).unwrap();
        assert_eq!(outcome.cause, TerminationCause::TimeElapsed);
        // Equal laps; lane 1 best 9000 beats lane 0 best 10000
        assert_eq!(outcome.winner, Some(1));
    }

    #[test]
    fn test_time_expiry_without_laps_has_no_winner() {
        let mut race = RaceController::new();
        let cfg = RaceConfig {
            mode: RaceMode::Time,
            target_time_secs: 60,
            ..RaceConfig::default()
        };
        race.start(0, [0, 1]);
        let outcome = race.check_time_expired(61_000, &cfg).unwrap();
        assert_eq!(outcome.winner, None);
    }

    #[test]
    fn test_free_mode_never_finishes() {
        let mut race = RaceController::new();
        let cfg = RaceConfig::default();
        race.start(0, [0]);
        for t in 1..20u64 {
            race.process_score(0, 50.0, t * 1_000, &detection());
            assert!(race.on_lap_added(0, &cfg, t * 1_000).is_none());
        }
        assert!(race.check_time_expired(10_000_000, &cfg).is_none());
        assert!(race.is_running());
    }

    #[test]
    fn test_restore_then_resume_continues_relative_time() {
        let track = TrackConfig::default();
        let mut race = RaceController::new();
        race.start(1_000, [0]);
        race.process_score(0, 50.0, 3_000, &detection());
        let snap = race.snapshot(4_000, &track).unwrap();
        assert_eq!(snap.elapsed_ms, 3_000);

        let mut restored = RaceController::new();
        restored.restore(&snap);
        assert!(!restored.is_running());
        assert!(restored.lanes().values().all(|l| !l.is_running()));
        assert_eq!(restored.lane(0).unwrap().laps(), race.lane(0).unwrap().laps());

        restored.resume(100_000).unwrap();
        assert_eq!(restored.race_start_ms(), Some(97_000));
        let (_, lap) = restored.process_score(0, 50.0, 102_000, &detection());
        let lap = lap.unwrap();
        assert_eq!(lap.record.lap_number, 2);
        assert_eq!(lap.record.lap_time_ms, 2_000);
        assert_eq!(lap.record.relative_time_ms, 5_000);
    }

    #[test]
    fn test_resume_errors() {
        let mut race = RaceController::new();
        assert!(matches!(race.resume(0), Err(EngineError::NothingToResume)));
        race.start(0, [0]);
        assert!(matches!(race.resume(10), Err(EngineError::RaceInProgress)));
    }

    #[test]
    fn test_termination_cause_names() {
        let names: Vec<String> = [
            TerminationCause::None,
            TerminationCause::LapsReached,
            TerminationCause::TimeElapsed,
            TerminationCause::ManualStop,
        ]
        .iter()
        .map(|c| serde_json::to_string(c).unwrap())
        .collect();
        assert_eq!(
            names,
            vec!["\"none\"", "\"laps-reached\"", "\"time-elapsed\"", "\"manual-stop\""]
        );
    }
}
