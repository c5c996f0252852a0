//! Timer-driven recovery snapshots

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lap_engine::{Clock, LapEngine};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::{KeyValueStore, RecoveryStore};

/// Handle to a running autosave task
pub struct AutoSave {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl AutoSave {
    /// Stop saving and wait for the task to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!("Autosave task ended abnormally: {}", e);
        }
    }
}

/// Save the engine's race every `period`.
///
/// Each tick copies the race under a read lock and releases it before the
/// snapshot is encoded and written on the blocking pool. When no race is
/// running the slot is cleared instead.
pub fn spawn_autosave<S, C>(
    engine: Arc<RwLock<LapEngine>>,
    recovery: Arc<RecoveryStore<S>>,
    clock: Arc<C>,
    period: Duration,
) -> AutoSave
where
    S: KeyValueStore + 'static,
    C: Clock + ?Sized + 'static,
{
    let (shutdown, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;
        info!("Autosave started every {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let captured = {
                        let engine = engine.read().await;
                        RecoveryStore::<S>::capture(&engine, clock.now_ms(), Utc::now())
                    };
                    let recovery = recovery.clone();
                    let written =
                        tokio::task::spawn_blocking(move || recovery.persist(captured.as_ref()))
                            .await;
                    match written {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!("Autosave failed: {}", e),
                        Err(e) => warn!("Autosave write task failed: {}", e),
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("Autosave stopped");
    });

    AutoSave { shutdown, handle }
}
