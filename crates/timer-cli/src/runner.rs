//! Race session runner

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lap_engine::{
    calculate_speed, format_time, format_time_short, write_laps_csv, Clock, FrameGate, LapEngine,
    LapRecord, RaceEvent, RaceOutcome,
};
use storage::{
    load_track_config, racer_statistics, save_track_config, spawn_autosave, FileStore,
    RecoveryStore, SessionHistory, SAVE_INTERVAL_MS,
};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};
use tracing::{info, warn};

use crate::{Settings, TrackSimulator};

/// Engine clock on the runtime's timer, so paused test time drives it too
#[derive(Debug, Clone)]
pub struct RuntimeClock {
    origin: Instant,
}

impl RuntimeClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Continue a recoverable race instead of discarding it
    pub resume: bool,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub outcome: Option<RaceOutcome>,
    pub laps: Vec<LapRecord>,
    pub threshold: f64,
    pub archived: bool,
    pub csv_path: Option<PathBuf>,
}

fn spawn_event_log(mut rx: broadcast::Receiver<RaceEvent>, track_length_m: f64) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(RaceEvent::RaceStarted { at_ms }) => info!("Race started at {} ms", at_ms),
                Ok(RaceEvent::LapAdded {
                    lane_name,
                    record,
                    is_personal_best,
                    ..
                }) => {
                    let speed = calculate_speed(record.lap_time_ms as f64, track_length_m);
                    info!(
                        "{} lap {}: {} ({:.1} km/h){}",
                        lane_name,
                        record.lap_number,
                        format_time_short(record.lap_time_ms as f64),
                        speed,
                        if is_personal_best { " personal best" } else { "" }
                    );
                }
                Ok(RaceEvent::RaceFinished { cause, winner }) => {
                    info!("Race finished: {:?}, winner {:?}", cause, winner)
                }
                Ok(RaceEvent::CalibrationFinished { threshold }) => match threshold {
                    Some(t) => info!("Calibrated threshold: {:.0}", t),
                    None => warn!("Calibration collected no samples"),
                },
                Err(broadcast::error::RecvError::Lagged(n)) => warn!("Event log skipped {} events", n),
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn frame_interval(fps: u32) -> Interval {
    tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps.max(1))))
}

/// Collect noise samples on a clear track until calibration finishes
async fn calibrate(
    engine: &RwLock<LapEngine>,
    simulator: &mut TrackSimulator,
    feed: &mut Interval,
    gate: &mut FrameGate,
    clock: &RuntimeClock,
) -> anyhow::Result<()> {
    let now = clock.now_ms();
    engine.write().await.start_calibration(now)?;
    info!(
        "Calibrating for {} ms, keep the track clear",
        engine.read().await.calibration_remaining_ms(now)
    );

    loop {
        feed.tick().await;
        let now = clock.now_ms();
        if !gate.accept(now) {
            continue;
        }
        let frame = simulator.render(now);
        let mut guard = engine.write().await;
        guard.process_frame(&frame, now);
        if !guard.is_calibrating() {
            return Ok(());
        }
    }
}

fn export_csv(
    settings: &Settings,
    engine: &LapEngine,
    laps: &[LapRecord],
) -> anyhow::Result<PathBuf> {
    let path = settings.export_csv.clone().unwrap_or_else(|| {
        settings.data_dir.join(format!(
            "laps-{}.csv",
            Utc::now().format("%Y-%m-%dT%H-%M-%S")
        ))
    });
    let writer = BufWriter::new(File::create(&path)?);
    write_laps_csv(laps, &engine.track().lanes, writer)?;
    info!("Laps exported to {}", path.display());
    Ok(path)
}

/// Run one race session end to end
pub async fn run(settings: Settings, options: RunOptions) -> anyhow::Result<RunSummary> {
    let store = Arc::new(FileStore::open(&settings.data_dir)?);
    let clock = Arc::new(RuntimeClock::new());

    let mut track = load_track_config(&*store);
    if let Some(lanes) = settings.lanes {
        track.set_lane_count(lanes)?;
    }
    if let Some(race) = settings.race {
        track.race = race;
    }
    let mut engine = LapEngine::new(track)?;

    let recovery = Arc::new(RecoveryStore::new(store.clone()));
    let mut resumed = false;
    if options.resume {
        if let Some(snapshot) = recovery.accept(&mut engine, Utc::now()) {
            engine.resume_race(clock.now_ms())?;
            resumed = true;
            info!(
                "Resumed race with {} laps after {}",
                snapshot.race.lap_count(),
                format_time(snapshot.race.elapsed_ms as f64)
            );
        }
    } else if let Some(candidate) = recovery.candidate(Utc::now()) {
        info!(
            "Discarding recoverable race with {} laps (pass --resume to continue it)",
            candidate.race.lap_count()
        );
        recovery.dismiss();
    }

    let mut history = SessionHistory::load(store.clone());
    let mut simulator = TrackSimulator::new(&settings.simulator, &engine.track().lanes);
    let event_log = spawn_event_log(engine.subscribe(), engine.race_config().track_length_m);
    let engine = Arc::new(RwLock::new(engine));

    let mut feed = frame_interval(settings.feed_fps);
    let mut gate = FrameGate::from_fps(settings.fps);

    if settings.calibrate && !resumed {
        calibrate(&engine, &mut simulator, &mut feed, &mut gate, &clock).await?;
    }

    {
        let now = clock.now_ms();
        let mut guard = engine.write().await;
        guard.start_race(now);
        simulator.start(now);
        info!(
            "Racing {} lanes in {:?} mode (threshold {:.0})",
            guard.lane_states().len(),
            guard.race_config().mode,
            guard.detection_config().threshold
        );
    }

    let autosave = spawn_autosave(
        engine.clone(),
        recovery.clone(),
        clock.clone(),
        Duration::from_millis(SAVE_INTERVAL_MS),
    );

    let max_race_ms = settings.max_race_secs.saturating_mul(1000);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = feed.tick() => {
                let now = clock.now_ms();
                if !gate.accept(now) {
                    continue;
                }
                let frame = simulator.render(now);
                let mut guard = engine.write().await;
                guard.process_frame(&frame, now);
                guard.check_time_expired(now);
                if guard.is_running() && guard.elapsed_ms(now) >= max_race_ms {
                    warn!("Race stopped after {} s limit", settings.max_race_secs);
                    guard.stop_race(now);
                }
                if !guard.is_running() {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping race");
                engine.write().await.stop_race(clock.now_ms());
                break;
            }
        }
    }

    autosave.stop().await;
    recovery.dismiss();
    simulator.stop();

    let guard = engine.read().await;
    let now = clock.now_ms();
    let laps = guard.all_laps();

    for standing in guard.standings() {
        info!(
            "P{} {}: {} laps, best {}, last {}",
            standing.position,
            standing.lane_name,
            standing.laps_completed,
            format_time_short(standing.best_lap_ms.map_or(-1.0, |t| t as f64)),
            format_time_short(standing.last_lap_ms.map_or(-1.0, |t| t as f64)),
        );
    }

    if let Err(e) = save_track_config(&*store, guard.track()) {
        warn!("Failed to save track configuration: {}", e);
    }

    let archived = history.archive_engine(&guard, now, Utc::now())?.is_some();
    if let Some(stats) = racer_statistics(history.sessions()) {
        info!(
            "{} races on record, {} laps, {:.1} laps per race",
            stats.total_races, stats.total_laps, stats.avg_laps_per_race
        );
    }

    let csv_path = if laps.is_empty() {
        None
    } else {
        Some(export_csv(&settings, &guard, &laps)?)
    };

    let summary = RunSummary {
        outcome: guard.outcome(),
        threshold: guard.detection_config().threshold,
        laps,
        archived,
        csv_path,
    };
    drop(guard);
    event_log.abort();
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SimulatorSettings;
    use lap_engine::{RaceConfig, RaceMode, TerminationCause};
    use storage::KeyValueStore;

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            data_dir: dir.to_path_buf(),
            lanes: Some(1),
            race: Some(RaceConfig {
                mode: RaceMode::Laps,
                target_laps: 2,
                ..RaceConfig::default()
            }),
            max_race_secs: 30,
            simulator: SimulatorSettings {
                width: 160,
                height: 120,
                lap_ms: vec![2_000],
                noise: 4,
                ..SimulatorSettings::default()
            },
            ..Settings::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_lap_race_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run(settings(dir.path()), RunOptions::default())
            .await
            .unwrap();

        let outcome = summary.outcome.unwrap();
        assert_eq!(outcome.cause, TerminationCause::LapsReached);
        assert_eq!(outcome.winner, Some(0));
        assert_eq!(summary.laps.len(), 2);
        assert!((1_900..=2_100).contains(&summary.laps[1].lap_time_ms));
        assert_eq!(summary.threshold, 5.0);
        assert!(summary.archived);
        assert!(summary.csv_path.unwrap().exists());

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.load(storage::RECOVERY_KEY).unwrap().is_none());
        assert_eq!(SessionHistory::load(store).sessions().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit_stops_free_race() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.race = None;
        settings.calibrate = false;
        settings.max_race_secs = 3;
        let summary = run(settings, RunOptions { resume: true }).await.unwrap();
        assert_eq!(summary.outcome.unwrap().cause, TerminationCause::ManualStop);
        assert_eq!(summary.threshold, 12.0);
        assert_eq!(summary.laps.len(), 1);
    }
}
