//! Frame engine
//!
//! Wires sampling, scoring and smoothing for every enabled lane into either
//! the calibrator or the race controller, and exposes the control and query
//! surface used by the application.

use std::collections::BTreeMap;
use std::time::Instant;

use frame_sampler::{change_score, rgba_frame, DragHandle, IntensityGrid, Region, RegionSampler};
use image::{GenericImageView, Pixel};
use metrics::{counter, histogram};
use score_filter::{CalibrationOutcome, Calibrator, SmoothingWindow};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::standings::standings;
use crate::{
    DetectionConfig, EngineError, EventBus, LaneId, LaneRunState, LaneUpdate, LapAdded, LapRecord,
    RaceConfig, RaceController, RaceEvent, RaceOutcome, RaceSnapshot, Standing, TrackConfig,
};

/// Per-lane result of one processed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneFrameResult {
    pub lane_id: LaneId,
    /// Unsmoothed change score of this frame
    pub raw_score: f64,
    pub smoothed_score: f64,
    /// A crossing passed the debounce gate on this frame
    pub crossing: bool,
    /// Lap recorded from that crossing, if any
    pub lap: Option<LapRecord>,
}

/// Signal state of one lane: previous grid and smoothing window
#[derive(Debug, Clone)]
struct LaneSignal {
    previous: Option<IntensityGrid>,
    window: SmoothingWindow,
}

impl LaneSignal {
    fn new(smoothing: usize) -> Self {
        Self {
            previous: None,
            window: SmoothingWindow::new(smoothing),
        }
    }
}

/// Lap timing engine for one track
pub struct LapEngine {
    track: TrackConfig,
    sampler: RegionSampler,
    signals: BTreeMap<LaneId, LaneSignal>,
    race: RaceController,
    calibrator: Calibrator,
    events: EventBus,
}

impl LapEngine {
    /// Create an engine; the configuration is validated first
    pub fn new(track: TrackConfig) -> Result<Self, EngineError> {
        track.validate()?;
        Ok(Self::with_sampler(track, RegionSampler::default()))
    }

    /// Create an engine from a configuration that is repaired rather than rejected
    pub fn with_sampler(track: TrackConfig, sampler: RegionSampler) -> Self {
        Self {
            track: track.sanitized(),
            sampler,
            signals: BTreeMap::new(),
            race: RaceController::new(),
            calibrator: Calibrator::default(),
            events: EventBus::default(),
        }
    }

    // --- Frame pipeline ---

    /// Process a raw RGBA buffer
    pub fn process_rgba(
        &mut self,
        data: &[u8],
        width: u32,
        height: u32,
        now_ms: u64,
    ) -> Result<Vec<LaneFrameResult>, EngineError> {
        let frame = rgba_frame(data, width, height)?;
        Ok(self.process_frame(&frame, now_ms))
    }

    /// Process one accepted frame for every enabled lane.
    ///
    /// Lanes are handled in id order. All crossings of the frame are
    /// evaluated before race rules run, so a lane that finishes the race
    /// does not hide laps other lanes completed in the same frame.
    pub fn process_frame<I>(&mut self, frame: &I, now_ms: u64) -> Vec<LaneFrameResult>
    where
        I: GenericImageView,
        I::Pixel: Pixel<Subpixel = u8>,
    {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            warn!("Skipping empty {}x{} frame", width, height);
            return Vec::new();
        }

        let started = Instant::now();
        self.poll_calibration(now_ms);

        let calibrating = self.calibrator.is_active();
        let detection = self.track.detection;
        let mut results = Vec::with_capacity(self.track.lanes.len());
        let mut added: Vec<LapAdded> = Vec::new();

        for lane in self.track.lanes.iter().filter(|l| l.enabled) {
            let signal = self
                .signals
                .entry(lane.id)
                .or_insert_with(|| LaneSignal::new(detection.smoothing));

            let grid = self.sampler.sample(frame, &lane.region);
            let raw_score = change_score(&grid, signal.previous.as_ref());
            signal.previous = Some(grid);
            let smoothed_score = signal.window.push(raw_score);

            let (crossing, lap) = if calibrating {
                self.calibrator.record(lane.id, smoothed_score);
                if let Some(state) = self.race.lane_mut(lane.id) {
                    state.set_smoothed_score(smoothed_score);
                }
                (None, None)
            } else if self.race.is_running() {
                self.race
                    .process_score(lane.id, smoothed_score, now_ms, &detection)
            } else {
                if let Some(state) = self.race.lane_mut(lane.id) {
                    state.set_smoothed_score(smoothed_score);
                }
                (None, None)
            };

            if crossing.is_some() {
                counter!("lap_engine_crossings_total", "lane" => lane.id.to_string()).increment(1);
            }
            if let Some(lap) = lap {
                added.push(lap);
            }
            results.push(LaneFrameResult {
                lane_id: lane.id,
                raw_score,
                smoothed_score,
                crossing: crossing.is_some(),
                lap: lap.map(|l| l.record),
            });
        }

        for lap in added {
            self.on_lap_added(lap, now_ms);
        }

        counter!("lap_engine_frames_processed_total").increment(1);
        histogram!("lap_engine_frame_processing_seconds").record(started.elapsed().as_secs_f64());
        results
    }

    fn on_lap_added(&mut self, lap: LapAdded, now_ms: u64) {
        let lane_id = lap.record.lane_id;
        counter!("lap_engine_laps_recorded_total", "lane" => lane_id.to_string()).increment(1);

        let (lane_name, lane_color) = match self.track.lane(lane_id) {
            Some(lane) => (lane.name.clone(), lane.color.clone()),
            None => (format!("Lane {}", lane_id + 1), String::new()),
        };
        debug!(
            "{} lap {}: {} ms{}",
            lane_name,
            lap.record.lap_number,
            lap.record.lap_time_ms,
            if lap.is_personal_best { " (best)" } else { "" }
        );
        self.events.publish(RaceEvent::LapAdded {
            lane_id,
            lane_name,
            lane_color,
            record: lap.record,
            is_personal_best: lap.is_personal_best,
        });

        if let Some(outcome) = self.race.on_lap_added(lane_id, &self.track.race, now_ms) {
            self.publish_finished(outcome);
        }
    }

    fn publish_finished(&self, outcome: RaceOutcome) {
        self.events.publish(RaceEvent::RaceFinished {
            cause: outcome.cause,
            winner: outcome.winner,
        });
    }

    // --- Race control ---

    /// Start a race on all enabled lanes. No-op while a race is running.
    pub fn start_race(&mut self, now_ms: u64) -> bool {
        if self.race.is_running() {
            debug!("start_race ignored: race already running");
            return false;
        }
        if self.calibrator.is_active() {
            warn!("Race started during calibration; calibration cancelled");
            self.calibrator.cancel();
        }

        let lane_ids: Vec<LaneId> = self.track.enabled_lanes().map(|l| l.id).collect();
        self.race.start(now_ms, lane_ids);
        for signal in self.signals.values_mut() {
            signal.window.clear();
        }
        self.events.publish(RaceEvent::RaceStarted { at_ms: now_ms });
        true
    }

    /// Stop the race manually; laps are kept until `reset_race`
    pub fn stop_race(&mut self, now_ms: u64) -> Option<RaceOutcome> {
        let outcome = self.race.stop(now_ms)?;
        self.publish_finished(outcome);
        Some(outcome)
    }

    /// Discard all race state
    pub fn reset_race(&mut self) {
        self.race.reset();
        for signal in self.signals.values_mut() {
            signal.window.clear();
        }
    }

    /// Continue a stopped or recovered race
    pub fn resume_race(&mut self, now_ms: u64) -> Result<(), EngineError> {
        self.race.resume(now_ms)?;
        for signal in self.signals.values_mut() {
            signal.window.clear();
        }
        Ok(())
    }

    /// End a time-target race whose duration has elapsed
    pub fn check_time_expired(&mut self, now_ms: u64) -> Option<RaceOutcome> {
        let outcome = self.race.check_time_expired(now_ms, &self.track.race)?;
        self.publish_finished(outcome);
        Some(outcome)
    }

    // --- Calibration ---

    /// Begin collecting noise samples. Not allowed while racing.
    pub fn start_calibration(&mut self, now_ms: u64) -> Result<(), EngineError> {
        if self.race.is_running() {
            return Err(EngineError::RaceInProgress);
        }
        self.calibrator.begin(now_ms);
        Ok(())
    }

    pub fn cancel_calibration(&mut self) {
        self.calibrator.cancel();
    }

    /// Finish calibration once its window has passed.
    ///
    /// A derived threshold replaces the current one; an empty sample set
    /// leaves it unchanged.
    pub fn poll_calibration(&mut self, now_ms: u64) -> Option<CalibrationOutcome> {
        if !self.calibrator.is_due(now_ms) {
            return None;
        }
        let outcome = self.calibrator.finish()?;
        if let Some(threshold) = outcome.threshold {
            self.track.detection.threshold = threshold;
        }
        self.events.publish(RaceEvent::CalibrationFinished {
            threshold: outcome.threshold,
        });
        Some(outcome)
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrator.is_active()
    }

    pub fn calibration_remaining_ms(&self, now_ms: u64) -> u64 {
        self.calibrator.remaining_ms(now_ms)
    }

    // --- Configuration ---

    /// Replace detection parameters between races
    pub fn set_detection_config(&mut self, config: DetectionConfig) -> Result<(), EngineError> {
        if self.race.is_running() {
            return Err(EngineError::RaceInProgress);
        }
        config.validate()?;
        for signal in self.signals.values_mut() {
            signal.window.set_capacity(config.smoothing);
        }
        self.track.detection = config;
        Ok(())
    }

    /// Replace race settings between races
    pub fn set_race_config(&mut self, config: RaceConfig) -> Result<(), EngineError> {
        if self.race.is_running() {
            return Err(EngineError::RaceInProgress);
        }
        config.validate()?;
        self.track.race = config;
        Ok(())
    }

    /// Change the number of lanes; lanes are regenerated with defaults
    pub fn set_lane_count(&mut self, count: usize) -> Result<(), EngineError> {
        if self.race.is_running() {
            return Err(EngineError::RaceInProgress);
        }
        if count != self.track.lanes.len() {
            self.track.set_lane_count(count)?;
            self.signals.clear();
            info!("Track reconfigured with {} lanes", count);
        }
        Ok(())
    }

    /// Edit one lane. A new region drops the lane's previous grid.
    pub fn update_lane(&mut self, lane_id: LaneId, update: LaneUpdate) -> Result<(), EngineError> {
        let region_changed = update.region.is_some();
        let lane = self
            .track
            .lane_mut(lane_id)
            .ok_or(EngineError::UnknownLane(lane_id))?;
        update.apply(lane)?;
        if region_changed {
            if let Some(signal) = self.signals.get_mut(&lane_id) {
                signal.previous = None;
            }
        }
        Ok(())
    }

    /// Move a lane's region by a drag offset measured from `start`
    pub fn translate_region(
        &mut self,
        lane_id: LaneId,
        start: Region,
        dx: f32,
        dy: f32,
    ) -> Result<Region, EngineError> {
        let region = Region::translated(start, dx, dy);
        self.set_region(lane_id, region)
    }

    /// Resize a lane's region by dragging one corner from `start`
    pub fn drag_region(
        &mut self,
        lane_id: LaneId,
        start: Region,
        handle: DragHandle,
        dx: f32,
        dy: f32,
    ) -> Result<Region, EngineError> {
        let region = Region::dragged(start, handle, dx, dy);
        self.set_region(lane_id, region)
    }

    fn set_region(&mut self, lane_id: LaneId, region: Region) -> Result<Region, EngineError> {
        self.update_lane(
            lane_id,
            LaneUpdate {
                region: Some(region),
                ..LaneUpdate::default()
            },
        )?;
        Ok(self.track.lane(lane_id).map_or(region, |l| l.region))
    }

    /// Replace the whole track setup between races
    pub fn set_track(&mut self, track: TrackConfig) -> Result<(), EngineError> {
        if self.race.is_running() {
            return Err(EngineError::RaceInProgress);
        }
        track.validate()?;
        self.track = track;
        self.signals.clear();
        Ok(())
    }

    // --- Queries ---

    pub fn track(&self) -> &TrackConfig {
        &self.track
    }

    pub fn detection_config(&self) -> &DetectionConfig {
        &self.track.detection
    }

    pub fn race_config(&self) -> &RaceConfig {
        &self.track.race
    }

    pub fn race(&self) -> &RaceController {
        &self.race
    }

    pub fn is_running(&self) -> bool {
        self.race.is_running()
    }

    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.race.elapsed_ms(now_ms)
    }

    pub fn outcome(&self) -> Option<RaceOutcome> {
        self.race.outcome()
    }

    pub fn lane_states(&self) -> &BTreeMap<LaneId, LaneRunState> {
        self.race.lanes()
    }

    pub fn lane_state(&self, lane_id: LaneId) -> Option<&LaneRunState> {
        self.race.lane(lane_id)
    }

    /// Every lap of every lane in race-time order
    pub fn all_laps(&self) -> Vec<LapRecord> {
        let mut laps: Vec<LapRecord> = self
            .race
            .lanes()
            .values()
            .flat_map(|lane| lane.laps().iter().copied())
            .collect();
        laps.sort_by_key(|lap| (lap.relative_time_ms, lap.lane_id));
        laps
    }

    pub fn standings(&self) -> Vec<Standing> {
        standings(&self.track.lanes, self.race.lanes())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // --- Recovery ---

    /// Recoverable copy of the race, if one exists
    pub fn snapshot(&self, now_ms: u64) -> Option<RaceSnapshot> {
        self.race.snapshot(now_ms, &self.track)
    }

    /// Load a recovered race. Lanes stay stopped until `resume_race`.
    pub fn restore(&mut self, snapshot: &RaceSnapshot) -> Result<(), EngineError> {
        if self.race.is_running() {
            return Err(EngineError::RaceInProgress);
        }
        self.calibrator.cancel();
        self.track = snapshot.track.clone().sanitized();
        self.signals.clear();
        self.race.restore(snapshot);
        Ok(())
    }
}
