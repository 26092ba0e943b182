//! The client event bus (spec §4.10, component K).
//!
//! A multi-producer multi-consumer, non-blocking, at-most-once pub/sub
//! channel. Publication never blocks the publisher and never fails loudly:
//! a subscriber that falls behind silently misses events rather than
//! back-pressuring the session engine. This mirrors the teacher's
//! `TransportEventEmitter` (bounded `mpsc`, `try_send`, drop-on-full), but
//! generalized to multiple independent subscribers via a broadcast
//! channel, since the event bus is consumed by any number of observers
//! rather than a single transport owner.

use serde_json::Value;
use tokio::sync::broadcast;

/// Default channel capacity. A subscriber lagging behind by more than
/// this many events starts missing the oldest ones (`RecvError::Lagged`).
pub const DEFAULT_CAPACITY: usize = 256;

/// A published client event.
#[derive(Debug, Clone)]
pub enum Event {
    /// `initialize` request is about to be sent.
    ClientInitializing,
    /// `initialize` succeeded and `notifications/initialized` was sent.
    ClientInitialized,
    /// The session's transport was disconnected.
    ClientDisconnected,
    /// An error occurred that the caller should be aware of, even though
    /// the session itself may remain usable.
    ClientError { message: String },
    /// A request completed successfully.
    ToolExecuted {
        method: String,
        request: Value,
        response: Value,
    },
    /// A request failed.
    RequestFailed {
        method: String,
        request: Value,
        error: String,
    },
}

impl Event {
    /// The topic name this event publishes under, matching spec §4.10's
    /// topic inventory.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::ClientInitializing => "client_initializing",
            Self::ClientInitialized => "client_initialized",
            Self::ClientDisconnected => "client_disconnected",
            Self::ClientError { .. } => "client_error",
            Self::ToolExecuted { .. } => "tool_executed",
            Self::RequestFailed { .. } => "request_failed",
        }
    }
}

/// The event bus. Cheap to clone; clones share the same underlying
/// broadcast channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Non-blocking and fire-and-forget: if there are
    /// no subscribers, or a subscriber is too far behind, the event is
    /// simply not delivered to them. This never surfaces as an error to
    /// the publisher (spec §7: fire-and-forget notifications/events are
    /// logged on failure but never surfaced).
    pub fn publish(&self, event: Event) {
        // `send` only errors when there are zero receivers; that is a
        // normal, expected state (nobody is listening yet) and not worth
        // propagating.
        let _ = self.sender.send(event);
    }

    /// Subscribe to the bus. Each subscriber gets its own independent
    /// cursor into the channel.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of currently active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(Event::ClientInitializing);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(Event::ClientInitialized);
        let event = rx.recv().await.unwrap();
        assert_eq!(event.topic(), "client_initialized");
    }

    #[tokio::test]
    async fn multiple_subscribers_each_receive() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        bus.publish(Event::ClientDisconnected);
        assert_eq!(rx1.recv().await.unwrap().topic(), "client_disconnected");
        assert_eq!(rx2.recv().await.unwrap().topic(), "client_disconnected");
    }

    #[tokio::test]
    async fn lagging_subscriber_misses_events_without_blocking_publisher() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();
        for _ in 0..10 {
            bus.publish(Event::ClientInitializing);
        }
        // Publisher never blocked above. The lagging subscriber observes
        // a Lagged error rather than the publisher stalling.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(_)) | Ok(_) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}
