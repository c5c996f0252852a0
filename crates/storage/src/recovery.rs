//! Crash-recovery snapshots
//!
//! While a race runs its state is saved periodically; after a restart a
//! recent snapshot with at least one lap is offered for recovery.

use chrono::{DateTime, Utc};
use lap_engine::{LapEngine, RaceSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{KeyValueStore, StorageError, RECOVERY_KEY};

/// Autosave period while racing (ms)
pub const SAVE_INTERVAL_MS: u64 = 2000;
/// Snapshots older than this are not offered (ms)
pub const RECOVERY_MAX_AGE_MS: i64 = 60 * 60 * 1000;

/// Persisted race state with its wall-clock save time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub saved_at: DateTime<Utc>,
    pub race: RaceSnapshot,
}

impl SessionSnapshot {
    /// Young enough and holding at least one lap
    pub fn is_recoverable(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.saved_at).num_milliseconds();
        age_ms < RECOVERY_MAX_AGE_MS && self.race.has_laps()
    }
}

/// Recovery snapshot slot in a key-value store
#[derive(Debug)]
pub struct RecoveryStore<S> {
    store: S,
}

impl<S: KeyValueStore> RecoveryStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn save(&self, snapshot: &SessionSnapshot) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(snapshot)?;
        self.store.save(RECOVERY_KEY, &bytes)?;
        debug!(
            "Recovery snapshot saved: {} laps, {} ms elapsed",
            snapshot.race.lap_count(),
            snapshot.race.elapsed_ms
        );
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(RECOVERY_KEY)
    }

    /// Copy of the engine's race while it runs; `None` when nothing is running
    pub fn capture(
        engine: &LapEngine,
        now_ms: u64,
        now: DateTime<Utc>,
    ) -> Option<SessionSnapshot> {
        engine
            .snapshot(now_ms)
            .filter(|_| engine.is_running())
            .map(|race| SessionSnapshot {
                saved_at: now,
                race,
            })
    }

    /// Write a captured snapshot, or clear the slot for `None`
    pub fn persist(&self, captured: Option<&SessionSnapshot>) -> Result<(), StorageError> {
        match captured {
            Some(snapshot) => self.save(snapshot),
            None => self.clear(),
        }
    }

    /// Save the engine's race while it runs, clear the slot otherwise
    pub fn save_state(
        &self,
        engine: &LapEngine,
        now_ms: u64,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.persist(Self::capture(engine, now_ms, now).as_ref())
    }

    /// Stored snapshot, if any. Corrupt data is discarded.
    pub fn load(&self) -> Option<SessionSnapshot> {
        let bytes = match self.store.load(RECOVERY_KEY) {
            Ok(bytes) => bytes?,
            Err(e) => {
                warn!("Failed to read recovery snapshot: {}", e);
                return None;
            }
        };
        match postcard::from_bytes::<SessionSnapshot>(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Corrupt recovery snapshot discarded: {}", e);
                if let Err(e) = self.clear() {
                    warn!("Failed to clear recovery snapshot: {}", e);
                }
                None
            }
        }
    }

    /// Snapshot worth offering to the user at `now`
    pub fn candidate(&self, now: DateTime<Utc>) -> Option<SessionSnapshot> {
        let snapshot = self.load()?;
        if snapshot.is_recoverable(now) {
            info!(
                "Recoverable race found: {} laps saved at {}",
                snapshot.race.lap_count(),
                snapshot.saved_at
            );
            Some(snapshot)
        } else {
            debug!("Stored snapshot is stale or empty");
            None
        }
    }

    /// Drop the stored snapshot without using it
    pub fn dismiss(&self) {
        if let Err(e) = self.clear() {
            warn!("Failed to clear recovery snapshot: {}", e);
        }
    }

    /// Take the candidate and load it into `engine`.
    ///
    /// The slot is cleared either way; lanes stay stopped until the race is
    /// explicitly resumed.
    pub fn accept(&self, engine: &mut LapEngine, now: DateTime<Utc>) -> Option<SessionSnapshot> {
        let snapshot = self.candidate(now);
        self.dismiss();
        let snapshot = snapshot?;
        match engine.restore(&snapshot.race) {
            Ok(()) => Some(snapshot),
            Err(e) => {
                warn!("Recovered race not restored: {}", e);
                None
            }
        }
    }
}
