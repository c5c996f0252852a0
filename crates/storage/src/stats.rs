//! Statistics across archived sessions

use std::collections::{BTreeMap, HashMap};

use lap_engine::LaneId;
use serde::Serialize;

use crate::RaceSessionRecord;

/// Totals for one racer, identified by lane name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RacerStats {
    pub name: String,
    pub color: String,
    pub total_laps: usize,
    pub best_lap_ms: Option<u64>,
    /// Sessions in which this racer completed the most laps
    pub wins: usize,
    pub total_time_ms: u64,
}

impl RacerStats {
    pub fn avg_lap_ms(&self) -> Option<f64> {
        (self.total_laps > 0).then(|| self.total_time_ms as f64 / self.total_laps as f64)
    }
}

/// All-time summary of the session history
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStatistics {
    pub total_races: usize,
    pub total_laps: usize,
    pub total_racing_time_ms: u64,
    /// Most laps first
    pub racers: Vec<RacerStats>,
    pub avg_laps_per_race: f64,
    pub avg_race_duration_ms: f64,
}

/// Summarize sessions; `None` for an empty history
pub fn racer_statistics(sessions: &[RaceSessionRecord]) -> Option<HistoryStatistics> {
    if sessions.is_empty() {
        return None;
    }

    let mut racers: HashMap<String, RacerStats> = HashMap::new();
    let mut total_laps = 0;
    let mut total_racing_time_ms = 0;

    for session in sessions {
        total_racing_time_ms += session.duration_ms;
        let mut laps_per_lane: BTreeMap<LaneId, usize> = BTreeMap::new();

        for lap in &session.laps {
            total_laps += 1;
            let Some(lane) = session.lanes.iter().find(|l| l.id == lap.lane_id) else {
                continue;
            };
            let racer = racers.entry(lane.name.clone()).or_insert_with(|| RacerStats {
                name: lane.name.clone(),
                color: lane.color.clone(),
                total_laps: 0,
                best_lap_ms: None,
                wins: 0,
                total_time_ms: 0,
            });
            racer.total_laps += 1;
            racer.total_time_ms += lap.lap_time_ms;
            racer.best_lap_ms = Some(racer.best_lap_ms.map_or(lap.lap_time_ms, |b| b.min(lap.lap_time_ms)));
            *laps_per_lane.entry(lap.lane_id).or_default() += 1;
        }

        // Strictly more laps replaces the leader, so ties go to the lower lane id
        let mut winner: Option<(LaneId, usize)> = None;
        for (lane_id, laps) in laps_per_lane {
            if winner.map_or(true, |(_, best)| laps > best) {
                winner = Some((lane_id, laps));
            }
        }
        if let Some((lane_id, _)) = winner {
            let name = session.lane_name(lane_id);
            if let Some(racer) = racers.get_mut(&name) {
                racer.wins += 1;
            }
        }
    }

    let mut racers: Vec<RacerStats> = racers.into_values().collect();
    racers.sort_by(|a, b| b.total_laps.cmp(&a.total_laps).then_with(|| a.name.cmp(&b.name)));

    let races = sessions.len() as f64;
    Some(HistoryStatistics {
        total_races: sessions.len(),
        total_laps,
        total_racing_time_ms,
        racers,
        avg_laps_per_race: total_laps as f64 / races,
        avg_race_duration_ms: total_racing_time_ms as f64 / races,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use lap_engine::{LapRecord, TrackConfig};

    fn session(names: [&str; 2], laps: &[(LaneId, u64)], duration_ms: u64) -> RaceSessionRecord {
        let mut lanes = TrackConfig::default_lanes(2);
        lanes[0].name = names[0].to_string();
        lanes[1].name = names[1].to_string();
        let mut counts = [0u32; 2];
        let laps = laps
            .iter()
            .enumerate()
            .map(|(i, &(lane_id, lap_time_ms))| {
                counts[lane_id as usize] += 1;
                LapRecord {
                    lane_id,
                    lap_number: counts[lane_id as usize],
                    lap_time_ms,
                    timestamp_ms: i as u64,
                    relative_time_ms: i as u64,
                }
            })
            .collect();
        RaceSessionRecord::new(laps, lanes, duration_ms, Utc::now()).unwrap()
    }

    #[test]
    fn test_empty_history() {
        assert!(racer_statistics(&[]).is_none());
    }

    #[test]
    fn test_racers_keyed_by_name_across_lanes() {
        let sessions = vec![
            session(["Ana", "Ben"], &[(0, 1_000), (1, 1_100), (0, 900)], 30_000),
            // Racers swapped lanes in the second race
            session(["Ben", "Ana"], &[(0, 950), (1, 1_200), (0, 980)], 90_000),
        ];
        let stats = racer_statistics(&sessions).unwrap();
        assert_eq!(stats.total_races, 2);
        assert_eq!(stats.total_laps, 6);
        assert_eq!(stats.total_racing_time_ms, 120_000);
        assert_eq!(stats.avg_laps_per_race, 3.0);
        assert_eq!(stats.avg_race_duration_ms, 60_000.0);

        let ana = stats.racers.iter().find(|r| r.name == "Ana").unwrap();
        let ben = stats.racers.iter().find(|r| r.name == "Ben").unwrap();
        assert_eq!(ana.total_laps, 3);
        assert_eq!(ana.best_lap_ms, Some(900));
        assert_eq!(ana.wins, 1);
        assert_eq!(ana.total_time_ms, 3_100);
        assert_eq!(ben.total_laps, 3);
        assert_eq!(ben.best_lap_ms, Some(950));
        assert_eq!(ben.wins, 1);
        assert_eq!(stats.racers[0].name, "Ana");
    }

    #[test]
    fn test_tied_session_goes_to_lower_lane() {
        let sessions = vec![session(["Ana", "Ben"], &[(1, 1_000), (0, 1_100)], 10_000)];
        let stats = racer_statistics(&sessions).unwrap();
        let ana = stats.racers.iter().find(|r| r.name == "Ana").unwrap();
        assert_eq!(ana.wins, 1);
        assert_eq!(ana.avg_lap_ms(), Some(1_100.0));
    }
}
