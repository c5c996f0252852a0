//! Time formatting, speed and CSV export of lap records

use std::io::Write;

use serde::Serialize;
use tracing::info;

use crate::{EngineError, LaneConfig, LapRecord};

/// `MM:SS.mmm`, or `--:--.---` for negative or non-finite input
pub fn format_time(ms: f64) -> String {
    if !ms.is_finite() || ms < 0.0 {
        return "--:--.---".to_string();
    }
    let ms = ms.floor() as u64;
    format!(
        "{:02}:{:02}.{:03}",
        ms / 60_000,
        (ms % 60_000) / 1000,
        ms % 1000
    )
}

/// `SS.mmm`, or `--.---` for negative or non-finite input
pub fn format_time_short(ms: f64) -> String {
    if !ms.is_finite() || ms < 0.0 {
        return "--.---".to_string();
    }
    let ms = ms.floor() as u64;
    format!("{:02}.{:03}", ms / 1000, ms % 1000)
}

/// Average speed in km/h over one lap; 0 for non-positive input
pub fn calculate_speed(lap_time_ms: f64, track_length_m: f64) -> f64 {
    if !(lap_time_ms > 0.0 && track_length_m > 0.0) {
        return 0.0;
    }
    let hours = lap_time_ms / 1000.0 / 3600.0;
    (track_length_m / 1000.0) / hours
}

#[derive(Debug, Serialize)]
struct LapCsvRow<'a> {
    #[serde(rename = "Lap #")]
    lap_number: u32,
    #[serde(rename = "Lane")]
    lane: &'a str,
    #[serde(rename = "Lap Time (s)")]
    lap_time_s: String,
    #[serde(rename = "Lap Time")]
    lap_time: String,
    #[serde(rename = "Total Time (s)")]
    total_time_s: String,
}

fn seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

/// Write one CSV row per lap, in time order, with a header line.
///
/// Lanes missing from `lanes` are named `Lane {id + 1}`.
pub fn write_laps_csv<W: Write>(
    laps: &[LapRecord],
    lanes: &[LaneConfig],
    writer: W,
) -> Result<(), EngineError> {
    let mut ordered: Vec<&LapRecord> = laps.iter().collect();
    ordered.sort_by_key(|lap| (lap.relative_time_ms, lap.lane_id));

    let mut wtr = csv::Writer::from_writer(writer);
    for lap in &ordered {
        let fallback;
        let lane = match lanes.iter().find(|l| l.id == lap.lane_id) {
            Some(config) => config.name.as_str(),
            None => {
                fallback = format!("Lane {}", lap.lane_id + 1);
                fallback.as_str()
            }
        };
        wtr.serialize(LapCsvRow {
            lap_number: lap.lap_number,
            lane,
            lap_time_s: seconds(lap.lap_time_ms),
            lap_time: format_time_short(lap.lap_time_ms as f64),
            total_time_s: seconds(lap.relative_time_ms),
        })?;
    }
    if ordered.is_empty() {
        wtr.write_record(["Lap #", "Lane", "Lap Time (s)", "Lap Time", "Total Time (s)"])?;
    }
    wtr.flush().map_err(csv::Error::from)?;

    info!("Exported {} laps to CSV", ordered.len());
    Ok(())
}
