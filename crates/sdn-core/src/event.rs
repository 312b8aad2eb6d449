/*!
 * Typed broadcast event bus.
 *
 * A thin wrapper around a tokio broadcast channel: publishers never block and
 * never fail because nobody is listening, and every subscriber sees every
 * event published after it subscribed (lagging subscribers lose the oldest).
 */
use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Maximum number of events that can be buffered per subscriber
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Event bus for a single event type
#[derive(Debug)]
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Debug + Send + 'static> EventBus<T> {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: T) -> usize {
        match self.sender.send(event) {
            Ok(n) => {
                trace!("Published event to {} receivers", n);
                n
            }
            Err(broadcast::error::SendError(event)) => {
                debug!("No receivers for event {:?}", event);
                0
            }
        }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone + Debug + Send + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared event bus that can be cloned
#[derive(Debug)]
pub struct SharedEventBus<T>(Arc<EventBus<T>>);

impl<T: Clone + Debug + Send + 'static> SharedEventBus<T> {
    /// Create a new shared event bus
    pub fn new() -> Self {
        Self(Arc::new(EventBus::new()))
    }

    /// Get the underlying event bus
    pub fn get(&self) -> &EventBus<T> {
        &self.0
    }
}

impl<T> Clone for SharedEventBus<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Clone + Debug + Send + 'static> Default for SharedEventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AsRef<EventBus<T>> for SharedEventBus<T> {
    fn as_ref(&self) -> &EventBus<T> {
        &self.0
    }
}
