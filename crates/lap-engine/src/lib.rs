//! Lap Engine
//!
//! Optical lap timing for multi-lane slot-car tracks:
//! - Per-lane trigger state machine with cooldown debouncing
//! - Lap ledger with running best/average statistics
//! - Race control for free, lap-target and time-target races
//! - Frame engine wiring sampler, smoother and calibrator per lane
//! - Snapshots for crash recovery and CSV export

pub mod config;
pub mod engine;
pub mod events;
pub mod export;
pub mod gate;
pub mod lane;
pub mod ledger;
pub mod race;
pub mod snapshot;
pub mod standings;
pub mod trigger;

pub use config::{
    ConfigError, DetectionConfig, LaneConfig, LaneUpdate, RaceConfig, RaceMode, TrackConfig,
    MAX_LANES,
};
pub use engine::{LaneFrameResult, LapEngine};
pub use events::{EventBus, RaceEvent};
pub use export::{calculate_speed, format_time, format_time_short, write_laps_csv};
pub use gate::FrameGate;
pub use lane::LaneRunState;
pub use ledger::{LapAdded, LapLedger, LapRecord};
pub use race::{RaceController, RaceOutcome, TerminationCause};
pub use snapshot::{LaneSnapshot, RaceSnapshot};
pub use standings::{standings, Standing};
pub use trigger::{CrossingEvent, LaneTrigger, TriggerState};

use std::time::Instant;

use thiserror::Error;

/// Stable lane identity (0..N-1)
pub type LaneId = u32;

/// Engine error types
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid frame: {0}")]
    Frame(#[from] frame_sampler::SamplerError),

    #[error("Unknown lane: {0}")]
    UnknownLane(LaneId),

    #[error("Race in progress")]
    RaceInProgress,

    #[error("No race to resume")]
    NothingToResume,

    #[error("CSV export failed: {0}")]
    Export(#[from] csv::Error),
}

/// Millisecond time source for the engine
pub trait Clock: Send + Sync {
    /// Monotonic milliseconds
    fn now_ms(&self) -> u64;
}

/// Clock backed by `Instant`, counting from its creation
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}
