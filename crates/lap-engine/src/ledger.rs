//! Lap records and running lap statistics

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{CrossingEvent, LaneId};

/// One completed lap. Never modified after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapRecord {
    pub lane_id: LaneId,
    /// 1-based, sequential per lane
    pub lap_number: u32,
    /// Time since the lane's previous crossing (or race start for lap 1), ms
    pub lap_time_ms: u64,
    /// Absolute time of the crossing, ms
    pub timestamp_ms: u64,
    /// Time since race start, ms
    pub relative_time_ms: u64,
}

/// Notification that a lap was appended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapAdded {
    pub record: LapRecord,
    /// Faster than every earlier lap of this lane
    pub is_personal_best: bool,
}

/// Append-only lap list of one lane with O(1) best/average upkeep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LapLedger {
    laps: Vec<LapRecord>,
    last_lap_ms: Option<u64>,
    best_lap_ms: Option<u64>,
    total_lap_ms: u64,
}

impl LapLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from persisted laps, recomputing the statistics
    pub fn restore(laps: Vec<LapRecord>, last_lap_ms: Option<u64>) -> Self {
        let best_lap_ms = laps.iter().map(|l| l.lap_time_ms).min();
        let total_lap_ms = laps.iter().map(|l| l.lap_time_ms).sum();
        Self {
            laps,
            last_lap_ms,
            best_lap_ms,
            total_lap_ms,
        }
    }

    /// Set the reference point for the next lap without recording one
    pub fn arm(&mut self, now_ms: u64) {
        self.last_lap_ms = Some(now_ms);
    }

    /// Turn a crossing into a lap record.
    ///
    /// Without a reference point (or when the crossing is not later than it)
    /// the crossing only arms the next interval and no record is produced.
    pub fn record_crossing(&mut self, event: CrossingEvent, race_start_ms: u64) -> Option<LapAdded> {
        let now = event.at_ms;
        let last = match self.last_lap_ms {
            Some(last) if now > last => last,
            Some(last) => {
                if now < last {
                    warn!(
                        "Lane {} crossing at {} ms precedes previous crossing at {} ms",
                        event.lane_id, now, last
                    );
                }
                self.last_lap_ms = Some(now);
                return None;
            }
            None => {
                debug!("Lane {} armed at {} ms", event.lane_id, now);
                self.last_lap_ms = Some(now);
                return None;
            }
        };

        let lap_time_ms = now - last;
        let record = LapRecord {
            lane_id: event.lane_id,
            lap_number: self.laps.len() as u32 + 1,
            lap_time_ms,
            timestamp_ms: now,
            relative_time_ms: now.saturating_sub(race_start_ms),
        };

        let is_personal_best = self.best_lap_ms.map_or(true, |best| lap_time_ms < best);
        if is_personal_best {
            self.best_lap_ms = Some(lap_time_ms);
        }
        self.total_lap_ms += lap_time_ms;
        self.last_lap_ms = Some(now);
        self.laps.push(record);

        Some(LapAdded {
            record,
            is_personal_best,
        })
    }

    pub fn laps(&self) -> &[LapRecord] {
        &self.laps
    }

    pub fn lap_count(&self) -> usize {
        self.laps.len()
    }

    pub fn last_lap(&self) -> Option<&LapRecord> {
        self.laps.last()
    }

    /// Time of the last accepted crossing
    pub fn last_lap_ms(&self) -> Option<u64> {
        self.last_lap_ms
    }

    pub fn best_lap_ms(&self) -> Option<u64> {
        self.best_lap_ms
    }

    pub fn avg_lap_ms(&self) -> Option<f64> {
        if self.laps.is_empty() {
            None
        } else {
            Some(self.total_lap_ms as f64 / self.laps.len() as f64)
        }
    }

    /// Sum of all lap times
    pub fn total_lap_ms(&self) -> u64 {
        self.total_lap_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn crossing(at_ms: u64) -> CrossingEvent {
        CrossingEvent { lane_id: 0, at_ms }
    }

    #[test]
    fn test_unarmed_crossing_only_arms() {
        let mut ledger = LapLedger::new();
        assert!(ledger.record_crossing(crossing(1_000), 0).is_none());
        assert_eq!(ledger.last_lap_ms(), Some(1_000));
        let added = ledger.record_crossing(crossing(1_600), 0).unwrap();
        assert_eq!(added.record.lap_number, 1);
        assert_eq!(added.record.lap_time_ms, 600);
        assert_eq!(added.record.relative_time_ms, 1_600);
    }

    #[test]
    fn test_first_lap_measured_from_race_start() {
        let mut ledger = LapLedger::new();
        ledger.arm(10_000);
        let added = ledger.record_crossing(crossing(13_250), 10_000).unwrap();
        assert_eq!(added.record.lap_time_ms, 3_250);
        assert_eq!(added.record.relative_time_ms, 3_250);
        assert!(added.is_personal_best);
    }

    #[test]
    fn test_crossing_at_reference_time_arms() {
        // Race started at t=0 and a car crossed in the same instant
        let mut ledger = LapLedger::new();
        ledger.arm(0);
        assert!(ledger.record_crossing(crossing(0), 0).is_none());
        let lap = ledger.record_crossing(crossing(500), 0).unwrap();
        assert_eq!(lap.record.lap_number, 1);
        assert_eq!(lap.record.lap_time_ms, 500);
    }

    #[test]
    fn test_running_statistics() {
        let mut ledger = LapLedger::new();
        ledger.arm(0);
        let times = [0u64, 3_000, 5_500, 8_700, 11_000];
        let mut bests = Vec::new();
        for &t in &times[1..] {
            bests.push(ledger.record_crossing(crossing(t), 0).unwrap().is_personal_best);
        }
        // Laps: 3000, 2500, 3200, 2300
        assert_eq!(bests, vec![true, true, false, true]);
        assert_eq!(ledger.best_lap_ms(), Some(2_300));
        assert_eq!(ledger.avg_lap_ms(), Some(2_750.0));
        assert_eq!(ledger.total_lap_ms(), 11_000);
    }

    #[test]
    fn test_equal_lap_is_not_new_best() {
        let mut ledger = LapLedger::new();
        ledger.arm(0);
        ledger.record_crossing(crossing(1_000), 0);
        let second = ledger.record_crossing(crossing(2_000), 0).unwrap();
        assert!(!second.is_personal_best);
    }

    #[test]
    fn test_restore_recomputes_stats() {
        let mut ledger = LapLedger::new();
        ledger.arm(0);
        for t in [1_200, 2_100, 3_500] {
            ledger.record_crossing(crossing(t), 0);
        }
        let restored = LapLedger::restore(ledger.laps().to_vec(), ledger.last_lap_ms());
        assert_eq!(restored, ledger);
    }

    proptest! {
        #[test]
        fn prop_lap_numbering(gaps in proptest::collection::vec(0u64..5_000, 1..60)) {
            let mut ledger = LapLedger::new();
            ledger.arm(0);
            let mut now = 0;
            for gap in gaps {
                now += gap;
                ledger.record_crossing(crossing(now), 0);
            }
            for (i, lap) in ledger.laps().iter().enumerate() {
                prop_assert_eq!(lap.lap_number as usize, i + 1);
            }
            for pair in ledger.laps().windows(2) {
                prop_assert!(pair[1].relative_time_ms > pair[0].relative_time_ms);
            }
        }
    }
}
