//! Headless, typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels under the hood so that every
//! subscriber receives every message without any single subscriber blocking
//! the others.
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Telemetry`] | Per-tick pose snapshots for the world-transform owner |
//! | [`Topic::FlightStatus`] | State transitions of the motion state machine |
//! | [`Topic::Commands`] | Command strings forwarded by the perception loop |
//! | [`Topic::SystemAlerts`] | Perception failures and hardware faults |

use skyloop_types::{Event, SkyError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// High-frequency pose snapshots.
    Telemetry,
    /// Flight state transitions.
    FlightStatus,
    /// Commands produced by the perception loop.
    Commands,
    /// Faults: perception failures, rotor errors.
    SystemAlerts,
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    telemetry: broadcast::Sender<Event>,
    flight_status: broadcast::Sender<Event>,
    commands: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus with the given channel capacity.
    ///
    /// The `capacity` is applied to every topic channel independently.
    pub fn new(capacity: usize) -> Self {
        let (telemetry, _) = broadcast::channel(capacity);
        let (flight_status, _) = broadcast::channel(capacity);
        let (commands, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            telemetry,
            flight_status,
            commands,
            system_alerts,
        }
    }

    /// Publish `event` to the given [`Topic`] channel.
    ///
    /// Returns the number of active receivers that were handed the event, or
    /// [`SkyError::Channel`] when nobody is listening on the topic. Callers
    /// that publish best-effort simply discard that error.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, SkyError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| SkyError::Channel(format!("no subscribers for topic {topic:?}")))
    }

    /// Subscribe to a specific [`Topic`] channel.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Telemetry => &self.telemetry,
            Topic::FlightStatus => &self.flight_status,
            Topic::Commands => &self.commands,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`] channel.
///
/// Obtained via [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// Lagging is logged and skipped over. Returns `None` once the bus has
    /// shut down.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking receive. Returns `None` when nothing is buffered.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// The [`Topic`] this receiver is bound to.
    pub fn topic(&self) -> Topic {
        self.topic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyloop_types::{EventPayload, FlightState};

    fn make_event(source: &str) -> Event {
        Event::new(
            source,
            EventPayload::StateChanged {
                from: FlightState::Landed,
                to: FlightState::MovingToTarget,
            },
        )
    }

    #[tokio::test]
    async fn publish_and_receive() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::FlightStatus);

        let event = make_event("skyloop-runtime::flight_loop");
        bus.publish_to(Topic::FlightStatus, event.clone())?;

        let received = rx.recv().await.ok_or("no event received")?;
        assert_eq!(received.id, event.id);
        assert_eq!(received.source, event.source);
        Ok(())
    }

    #[test]
    fn publish_no_subscribers_returns_error() {
        let bus = EventBus::default();
        let result = bus.publish_to(Topic::Telemetry, make_event("test"));
        assert!(matches!(result, Err(SkyError::Channel(_))));
    }

    #[tokio::test]
    async fn topic_multiple_subscribers_receive_same_event() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut subscriber1 = bus.subscribe_to(Topic::Telemetry);
        let mut subscriber2 = bus.subscribe_to(Topic::Telemetry);
        assert_eq!(bus.subscriber_count(Topic::Telemetry), 2);

        let event = make_event("flight");
        bus.publish_to(Topic::Telemetry, event.clone())?;

        assert_eq!(subscriber1.recv().await.map(|e| e.id), Some(event.id));
        assert_eq!(subscriber2.recv().await.map(|e| e.id), Some(event.id));
        Ok(())
    }

    /// A subscriber on `SystemAlerts` must not receive events published to
    /// `Telemetry` because they are routed through separate channels.
    #[tokio::test]
    async fn topic_subscriber_does_not_receive_other_topic_events() -> Result<(), Box<dyn std::error::Error>> {
        let bus = EventBus::default();
        let mut alerts_sub = bus.subscribe_to(Topic::SystemAlerts);
        let _telemetry_sub = bus.subscribe_to(Topic::Telemetry);

        bus.publish_to(Topic::Telemetry, make_event("flight"))?;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            alerts_sub.recv(),
        )
        .await;
        assert!(result.is_err(), "SystemAlerts subscriber must not receive a Telemetry event");
        Ok(())
    }

    #[test]
    fn try_recv_is_non_blocking() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe_to(Topic::Commands);
        assert!(rx.try_recv().is_none());

        let _ = bus.publish_to(Topic::Commands, make_event("perception"));
        assert!(rx.try_recv().is_some());
        assert!(rx.try_recv().is_none());
        assert_eq!(rx.topic(), Topic::Commands);
    }

    /// A slow subscriber skips past dropped events instead of erroring.
    #[tokio::test]
    async fn lagging_subscriber_resumes_with_newest_events() {
        let bus = EventBus::new(4);
        let mut slow_sub = bus.subscribe_to(Topic::Telemetry);

        for _ in 0..100 {
            let _ = bus.publish_to(Topic::Telemetry, make_event("flood"));
        }
        let last = make_event("last");
        let _ = bus.publish_to(Topic::Telemetry, last.clone());

        let mut seen_last = false;
        while let Some(event) = slow_sub.try_recv() {
            seen_last = event.id == last.id;
        }
        assert!(seen_last);
    }
}
