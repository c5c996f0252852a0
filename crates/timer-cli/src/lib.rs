//! Lap Timer Runner
//!
//! Drives the lap engine from a synthetic track feed with the full
//! persistence lifecycle: config load, recovery, autosave, archive, export.

pub mod runner;
pub mod settings;
pub mod simulator;

pub use runner::{run, RunOptions};
pub use settings::{Settings, SimulatorSettings};
pub use simulator::TrackSimulator;

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Initialize logging
pub fn init_logging(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
