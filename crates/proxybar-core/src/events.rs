//! Status publisher.
//!
//! Observers get a [`broadcast::Receiver`] and must marshal events onto
//! whatever context they run in. No values are replayed; a new subscriber
//! reads the current state from the supervisor directly.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Change notifications emitted by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// A line was appended to the log buffer.
    LogUpdated { line: String },
    /// The running flag flipped; re-read it.
    StatusChanged,
    /// An installation probe produced a new value.
    InstallationChanged { installed: bool },
}

/// Fan-out of [`SupervisorEvent`]s to any number of observers.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    tx: broadcast::Sender<SupervisorEvent>,
}

impl StatusPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Register an observer. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.tx.subscribe()
    }

    /// Send to all current observers. Having none is fine.
    pub fn publish(&self, event: SupervisorEvent) {
        if self.tx.send(event).is_err() {
            debug!("No observers for supervisor event");
        }
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_observers() {
        let publisher = StatusPublisher::new(8);
        publisher.publish(SupervisorEvent::StatusChanged);
        assert_eq!(publisher.observer_count(), 0);
    }

    #[tokio::test]
    async fn test_all_observers_receive() {
        let publisher = StatusPublisher::new(8);
        let mut first = publisher.subscribe();
        let mut second = publisher.subscribe();

        publisher.publish(SupervisorEvent::InstallationChanged { installed: false });

        assert_eq!(
            first.recv().await.unwrap(),
            SupervisorEvent::InstallationChanged { installed: false }
        );
        assert_eq!(
            second.recv().await.unwrap(),
            SupervisorEvent::InstallationChanged { installed: false }
        );
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscriber() {
        let publisher = StatusPublisher::new(8);
        let _keepalive = publisher.subscribe();
        publisher.publish(SupervisorEvent::StatusChanged);

        let mut late = publisher.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_string(&SupervisorEvent::LogUpdated {
            line: "[10:00:00] hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"log_updated","line":"[10:00:00] hi"}"#);
    }
}
