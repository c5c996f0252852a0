//! Track configuration persistence

use lap_engine::TrackConfig;
use tracing::{info, warn};

use crate::{KeyValueStore, StorageError, CONFIG_KEY};

/// Load the saved track configuration.
///
/// Never fails: missing, unreadable or corrupt data yields the defaults,
/// and out-of-range values are repaired.
pub fn load_track_config<S: KeyValueStore + ?Sized>(store: &S) -> TrackConfig {
    let bytes = match store.load(CONFIG_KEY) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            info!("No saved track configuration, using defaults");
            return TrackConfig::default();
        }
        Err(e) => {
            warn!("Failed to load track configuration: {}", e);
            return TrackConfig::default();
        }
    };

    match serde_json::from_slice::<TrackConfig>(&bytes) {
        Ok(config) => config.sanitized(),
        Err(e) => {
            warn!("Corrupt track configuration ignored: {}", e);
            TrackConfig::default()
        }
    }
}

pub fn save_track_config<S: KeyValueStore + ?Sized>(
    store: &S,
    config: &TrackConfig,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(config)?;
    store.save(CONFIG_KEY, &bytes)
}
