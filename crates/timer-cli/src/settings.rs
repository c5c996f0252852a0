//! Runner settings
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `LAP_TIMER__*` environment variables.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use lap_engine::RaceConfig;
use serde::Deserialize;

/// Synthetic track feed parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulatorSettings {
    pub width: u32,
    pub height: u32,
    /// Lap time of the car on each lane (ms)
    pub lap_ms: Vec<u64>,
    /// Time a car needs to cross the whole frame (ms)
    pub pass_ms: u64,
    /// Peak-to-peak sensor noise added to every pixel
    pub noise: u8,
    pub seed: u64,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            lap_ms: vec![2_400, 2_650, 2_900, 3_100],
            pass_ms: 400,
            noise: 6,
            seed: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// trace, debug, info, warn or error
    pub log_level: String,
    /// Directory of the file store
    pub data_dir: PathBuf,
    /// Incoming frame rate of the feed
    pub feed_fps: u32,
    /// Processing rate; faster frames are dropped
    pub fps: u32,
    /// Calibrate the threshold before racing
    pub calibrate: bool,
    /// Hard stop for races that never end on their own (seconds)
    pub max_race_secs: u64,
    /// Lane count override
    pub lanes: Option<usize>,
    /// Race settings override
    pub race: Option<RaceConfig>,
    /// Where to write the lap CSV; defaults to a timestamped file in `data_dir`
    pub export_csv: Option<PathBuf>,
    pub simulator: SimulatorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: PathBuf::from("lap-timer-data"),
            feed_fps: 60,
            fps: 30,
            calibrate: true,
            max_race_secs: 120,
            lanes: None,
            race: None,
            export_csv: None,
            simulator: SimulatorSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (optional) and the environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("LAP_TIMER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lap_engine::RaceMode;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lap-timer.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "log_level = \"debug\"\nlanes = 3\n\n[race]\nmode = \"laps\"\ntarget_laps = 5\n\n[simulator]\nnoise = 2"
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.log_level(), tracing::Level::DEBUG);
        assert_eq!(settings.lanes, Some(3));
        let race = settings.race.unwrap();
        assert_eq!(race.mode, RaceMode::Laps);
        assert_eq!(race.target_laps, 5);
        assert_eq!(race.target_time_secs, 300);
        assert_eq!(settings.simulator.noise, 2);
        assert_eq!(settings.simulator.width, 320);
    }

    #[test]
    fn test_bad_log_level_falls_back() {
        let settings = Settings {
            log_level: "loud".to_string(),
            ..Settings::default()
        };
        assert_eq!(settings.log_level(), tracing::Level::INFO);
    }
}
