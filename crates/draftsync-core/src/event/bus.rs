//! Broadcast bus for `DraftTelemetry`.
//!
//! Publishing with no active subscribers is a no-op, so controllers never
//! need to know whether anyone is listening.

use draftsync_types::event::DraftTelemetry;
use tokio::sync::broadcast;

/// Default channel capacity; enough for a burst of save failures.
pub const DEFAULT_TELEMETRY_CAPACITY: usize = 256;

/// Multi-consumer bus for draft telemetry events.
///
/// Cloning the bus clones the sender, so every controller of an
/// application can share one bus.
pub struct TelemetryBus {
    sender: broadcast::Sender<DraftTelemetry>,
}

impl TelemetryBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create a subscriber that receives all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DraftTelemetry> {
        self.sender.subscribe()
    }

    /// Publish an event to all current subscribers; dropped if there are none.
    pub fn publish(&self, event: DraftTelemetry) {
        tracing::debug!(event = event.name(), "draft telemetry");
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new(DEFAULT_TELEMETRY_CAPACITY)
    }
}

impl Clone for TelemetryBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for TelemetryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use draftsync_types::draft::BoardId;
    use draftsync_types::status::ResolutionMode;

    fn sample_event() -> DraftTelemetry {
        DraftTelemetry::ConflictResolved {
            board_id: BoardId::new("news"),
            draft_id: None,
            strategy: ResolutionMode::KeepLocal,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_and_subscribe_delivers_event() {
        let bus = TelemetryBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(sample_event());

        let received = rx.recv().await.unwrap();
        assert!(matches!(
            received,
            DraftTelemetry::ConflictResolved {
                strategy: ResolutionMode::KeepLocal,
                ..
            }
        ));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = TelemetryBus::default();
        bus.publish(sample_event());
        assert_eq!(bus.receiver_count(), 0);
    }

    #[test]
    fn clone_shares_channel() {
        let bus = TelemetryBus::new(16);
        let bus2 = bus.clone();
        let mut rx = bus.subscribe();

        bus2.publish(sample_event());

        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn lagged_receiver_reports_lag() {
        let bus = TelemetryBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(sample_event());
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(_))
        ));
    }
}
