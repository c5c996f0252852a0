//! Archived race sessions

use chrono::{DateTime, Utc};
use lap_engine::{LaneConfig, LaneId, LapEngine, LapRecord, TerminationCause};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{KeyValueStore, StorageError, SESSIONS_KEY};

/// Most sessions kept; older ones are dropped
pub const MAX_SESSIONS: usize = 20;

/// One finished race
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSessionRecord {
    pub id: Uuid,
    pub date: DateTime<Utc>,
    pub duration_ms: u64,
    pub laps: Vec<LapRecord>,
    pub lanes: Vec<LaneConfig>,
    pub best_lap_ms: Option<u64>,
    pub best_lap_lane: Option<LaneId>,
    pub total_laps: usize,
    #[serde(default)]
    pub cause: TerminationCause,
    #[serde(default)]
    pub winner: Option<LaneId>,
}

impl RaceSessionRecord {
    /// Build a record from laps; `None` when there are no laps
    pub fn new(
        laps: Vec<LapRecord>,
        lanes: Vec<LaneConfig>,
        duration_ms: u64,
        date: DateTime<Utc>,
    ) -> Option<Self> {
        // Earliest lap wins ties on lap time
        let best = laps
            .iter()
            .min_by_key(|lap| (lap.lap_time_ms, lap.relative_time_ms))?;
        let (best_lap_ms, best_lap_lane) = (Some(best.lap_time_ms), Some(best.lane_id));

        Some(Self {
            id: Uuid::new_v4(),
            date,
            duration_ms,
            total_laps: laps.len(),
            laps,
            lanes,
            best_lap_ms,
            best_lap_lane,
            cause: TerminationCause::None,
            winner: None,
        })
    }

    /// Record of the engine's current (normally finished) race
    pub fn from_engine(engine: &LapEngine, now_ms: u64, date: DateTime<Utc>) -> Option<Self> {
        let mut record = Self::new(
            engine.all_laps(),
            engine.track().lanes.clone(),
            engine.elapsed_ms(now_ms),
            date,
        )?;
        if let Some(outcome) = engine.outcome() {
            record.cause = outcome.cause;
            record.winner = outcome.winner;
        }
        Some(record)
    }

    /// Display name of a lane in this session
    pub fn lane_name(&self, lane_id: LaneId) -> String {
        self.lanes
            .iter()
            .find(|l| l.id == lane_id)
            .map(|l| l.name.clone())
            .unwrap_or_else(|| format!("Lane {}", lane_id + 1))
    }
}

/// Newest-first list of archived sessions backed by a store
#[derive(Debug)]
pub struct SessionHistory<S> {
    store: S,
    sessions: Vec<RaceSessionRecord>,
}

impl<S: KeyValueStore> SessionHistory<S> {
    /// Load the saved sessions; unreadable data starts an empty history
    pub fn load(store: S) -> Self {
        let sessions = match store.load(SESSIONS_KEY) {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<RaceSessionRecord>>(&bytes) {
                Ok(mut sessions) => {
                    sessions.truncate(MAX_SESSIONS);
                    sessions
                }
                Err(e) => {
                    warn!("Corrupt session history ignored: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to load session history: {}", e);
                Vec::new()
            }
        };
        info!("Loaded {} archived sessions", sessions.len());
        Self { store, sessions }
    }

    fn persist(&self) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(&self.sessions)?;
        self.store.save(SESSIONS_KEY, &bytes)
    }

    /// Add a session at the front, dropping the oldest beyond the cap
    pub fn archive(&mut self, record: RaceSessionRecord) -> Result<Uuid, StorageError> {
        let id = record.id;
        info!(
            "Archiving session {}: {} laps in {} ms",
            id, record.total_laps, record.duration_ms
        );
        self.sessions.insert(0, record);
        self.sessions.truncate(MAX_SESSIONS);
        self.persist()?;
        Ok(id)
    }

    /// Archive the engine's race if it has any laps
    pub fn archive_engine(
        &mut self,
        engine: &LapEngine,
        now_ms: u64,
        date: DateTime<Utc>,
    ) -> Result<Option<Uuid>, StorageError> {
        match RaceSessionRecord::from_engine(engine, now_ms, date) {
            Some(record) => self.archive(record).map(Some),
            None => Ok(None),
        }
    }

    /// Remove one session; returns whether it existed
    pub fn delete(&mut self, id: Uuid) -> Result<bool, StorageError> {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.sessions.clear();
        self.persist()
    }

    /// Newest first
    pub fn sessions(&self) -> &[RaceSessionRecord] {
        &self.sessions
    }

    pub fn get(&self, id: Uuid) -> Option<&RaceSessionRecord> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Fastest lap across all sessions with the session it belongs to
    pub fn best_lap_ever(&self) -> Option<(u64, &RaceSessionRecord)> {
        self.sessions
            .iter()
            .filter_map(|s| s.best_lap_ms.map(|t| (t, s)))
            .min_by_key(|(t, _)| *t)
    }
}
