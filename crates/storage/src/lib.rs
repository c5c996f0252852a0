//! Storage Layer
//!
//! Persistence for the lap timer over a small key-value port:
//! - Track configuration (fail-soft load)
//! - Crash-recovery snapshots saved on a timer while racing
//! - Archived race sessions and cross-session racer statistics

mod autosave;
mod config_store;
mod history;
mod recovery;
mod stats;
mod store;

pub use autosave::{spawn_autosave, AutoSave};
pub use config_store::{load_track_config, save_track_config};
pub use history::{RaceSessionRecord, SessionHistory, MAX_SESSIONS};
pub use recovery::{RecoveryStore, SessionSnapshot, RECOVERY_MAX_AGE_MS, SAVE_INTERVAL_MS};
pub use stats::{racer_statistics, HistoryStatistics, RacerStats};
pub use store::{FileStore, KeyValueStore, MemoryStore};

use thiserror::Error;

/// Storage key of the persisted track configuration
pub const CONFIG_KEY: &str = "track-config-v2";
/// Storage key of the crash-recovery snapshot
pub const RECOVERY_KEY: &str = "recovery-v1";
/// Storage key of the archived sessions
pub const SESSIONS_KEY: &str = "sessions-v1";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<postcard::Error> for StorageError {
    fn from(e: postcard::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
