//! Event Bus - broadcast fan-out for task lifecycle events
//!
//! The EventBus uses a tokio broadcast channel so any number of consumers
//! (progress displays, loggers) can observe the same scheduler. Hand a clone
//! to the scheduler as its completion notifier and subscribe from anywhere.

use tokio::sync::broadcast;
use tracing::debug;

use super::notifier::CompletionNotifier;
use super::types::TaskEvent;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// Broadcast channel of task events
///
/// Cheap to clone: every clone feeds the same set of subscribers.
#[derive(Clone)]
pub struct EventBus<T> {
    tx: broadcast::Sender<TaskEvent<T>>,
}

impl<T: Clone> EventBus<T> {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped, and a lagging
    /// subscriber loses the oldest events.
    pub fn emit(&self, event: TaskEvent<T>) {
        debug!(event_type = event.event_type(), id = %event.id(), "EventBus::emit");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent<T>> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

impl<T: Clone + Send> CompletionNotifier<T> for EventBus<T> {
    fn notify(&self, event: TaskEvent<T>) {
        self.emit(event);
    }
}
