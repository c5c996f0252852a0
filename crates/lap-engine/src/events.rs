//! Race event notifications
//!
//! Discrete events are pushed to subscribers over a broadcast channel;
//! continuous state is pulled through the engine's query methods.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::{LaneId, LapRecord, TerminationCause};

/// Default number of buffered events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Discrete event emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RaceEvent {
    RaceStarted {
        at_ms: u64,
    },
    LapAdded {
        lane_id: LaneId,
        lane_name: String,
        lane_color: String,
        record: LapRecord,
        is_personal_best: bool,
    },
    RaceFinished {
        cause: TerminationCause,
        winner: Option<LaneId>,
    },
    CalibrationFinished {
        /// New threshold, or `None` when no samples were collected
        threshold: Option<f64>,
    },
}

/// Broadcast fan-out of race events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RaceEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers. Events without listeners are dropped.
    pub fn publish(&self, event: RaceEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            debug!("No subscribers for event {:?}", event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RaceEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(RaceEvent::RaceStarted { at_ms: 0 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        bus.publish(RaceEvent::RaceStarted { at_ms: 5 });
        bus.publish(RaceEvent::RaceFinished {
            cause: TerminationCause::ManualStop,
            winner: None,
        });

        assert_eq!(rx.recv().await.unwrap(), RaceEvent::RaceStarted { at_ms: 5 });
        assert!(matches!(
            rx.recv().await.unwrap(),
            RaceEvent::RaceFinished {
                cause: TerminationCause::ManualStop,
                ..
            }
        ));
    }
}
