//! Race standings
//!
//! Lanes are ranked by laps completed (more first), then best lap (faster
//! first, lanes without a lap last), then lane id.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{LaneConfig, LaneId, LaneRunState};

/// One row of the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    /// 1-based position
    pub position: usize,
    pub lane_id: LaneId,
    pub lane_name: String,
    pub lane_color: String,
    pub laps_completed: usize,
    pub best_lap_ms: Option<u64>,
    pub last_lap_ms: Option<u64>,
    pub avg_lap_ms: Option<f64>,
    /// Last lap minus best lap (positive = slower)
    pub delta_ms: Option<i64>,
}

/// Ranking order between two lanes
pub fn compare_lanes(a: &LaneRunState, b: &LaneRunState) -> Ordering {
    b.lap_count()
        .cmp(&a.lap_count())
        .then_with(|| match (a.best_lap_ms(), b.best_lap_ms()) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.lane_id().cmp(&b.lane_id()))
}

/// Lane with the best ranking among those with at least one lap
pub fn leader<'a, I>(states: I) -> Option<LaneId>
where
    I: IntoIterator<Item = &'a LaneRunState>,
{
    states
        .into_iter()
        .filter(|s| s.lap_count() > 0)
        .min_by(|a, b| compare_lanes(a, b))
        .map(|s| s.lane_id())
}

/// Leaderboard of the enabled lanes that have race state
pub fn standings(lanes: &[LaneConfig], states: &BTreeMap<LaneId, LaneRunState>) -> Vec<Standing> {
    let mut ranked: Vec<(&LaneConfig, &LaneRunState)> = lanes
        .iter()
        .filter(|l| l.enabled)
        .filter_map(|l| states.get(&l.id).map(|s| (l, s)))
        .collect();
    ranked.sort_by(|(_, a), (_, b)| compare_lanes(a, b));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (lane, state))| {
            let best = state.best_lap_ms();
            let last = state.last_lap().map(|l| l.lap_time_ms);
            Standing {
                position: i + 1,
                lane_id: lane.id,
                lane_name: lane.name.clone(),
                lane_color: lane.color.clone(),
                laps_completed: state.lap_count(),
                best_lap_ms: best,
                last_lap_ms: last,
                avg_lap_ms: state.avg_lap_ms(),
                delta_ms: best.zip(last).map(|(b, l)| l as i64 - b as i64),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DetectionConfig, TrackConfig};

    fn lane_with_laps(id: LaneId, crossings: &[u64]) -> LaneRunState {
        let cfg = DetectionConfig {
            threshold: 1.0,
            cooldown_ms: 100,
            smoothing: 1,
        };
        let mut state = LaneRunState::started(id, 0);
        for &t in crossings {
            state.on_frame(50.0, t, 0, &cfg);
        }
        state
    }

    #[test]
    fn test_more_laps_ranks_first() {
        let lanes = TrackConfig::default_lanes(3);
        let mut states = BTreeMap::new();
        states.insert(0, lane_with_laps(0, &[1_000, 2_000]));
        states.insert(1, lane_with_laps(1, &[900, 1_800, 2_700]));
        states.insert(2, lane_with_laps(2, &[]));
        let table = standings(&lanes, &states);
        let order: Vec<LaneId> = table.iter().map(|s| s.lane_id).collect();
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(table[0].position, 1);
        assert_eq!(table[2].best_lap_ms, None);
    }

    #[test]
    fn test_tie_broken_by_best_lap() {
        let a = lane_with_laps(0, &[1_000, 2_200]);
        let b = lane_with_laps(1, &[1_100, 2_050]);
        // Same lap count; lane 1 has the faster best (950 vs 1000)
        assert_eq!(compare_lanes(&b, &a), Ordering::Less);
        assert_eq!(leader([&a, &b]), Some(1));
    }

    #[test]
    fn test_delta_and_disabled_lanes() {
        let mut lanes = TrackConfig::default_lanes(2);
        lanes[1].enabled = false;
        let mut states = BTreeMap::new();
        states.insert(0, lane_with_laps(0, &[1_000, 2_300]));
        states.insert(1, lane_with_laps(1, &[500]));
        let table = standings(&lanes, &states);
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].delta_ms, Some(300));
    }

    #[test]
    fn test_no_leader_without_laps() {
        let a = lane_with_laps(0, &[]);
        assert_eq!(leader([&a]), None);
    }
}
