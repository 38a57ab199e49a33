//! Connection state and the transport event bus.
//!
//! Each transport publishes its lifecycle on a [`tokio::sync::broadcast`]
//! channel. Subscribers either take every event or filter by
//! [`EventKind`]. The current [`ConnectionState`] is additionally kept in a
//! [`tokio::sync::watch`] cell so tasks can wait for a transition.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mcplink_core::error::ClassifiedError;
use mcplink_core::protocol::Message;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Default capacity of the broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not connected. Initial state and the state after `disconnect()`.
    Disconnected,
    /// A connect attempt is running.
    Connecting,
    /// Connected and usable.
    Connected,
    /// Waiting to retry after an unexpected closure.
    Reconnecting,
    /// Reconnection gave up or a fatal error occurred.
    Error,
    /// Destroyed; the transport cannot be used again.
    Closed,
}

impl ConnectionState {
    /// Whether the state can never be left.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether `recv()` should stop waiting for more messages.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Closed | Self::Error | Self::Disconnected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Something observable that happened on a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// The connection state changed.
    StateChanged {
        /// State before the transition.
        previous: ConnectionState,
        /// State after the transition.
        current: ConnectionState,
    },
    /// A message arrived from the peer.
    MessageReceived {
        /// The message.
        message: Box<Message>,
        /// When it was decoded.
        received_at: DateTime<Utc>,
    },
    /// A failure was classified.
    ErrorOccurred(Box<ClassifiedError>),
    /// A reconnection attempt is scheduled.
    Reconnecting {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// A ping round trip completed.
    Latency(Duration),
}

impl TransportEvent {
    /// The kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::StateChanged { .. } => EventKind::StateChanged,
            Self::MessageReceived { .. } => EventKind::MessageReceived,
            Self::ErrorOccurred(_) => EventKind::ErrorOccurred,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::Latency(_) => EventKind::Latency,
        }
    }
}

/// Event kinds, for filtered subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`TransportEvent::StateChanged`]
    StateChanged,
    /// [`TransportEvent::MessageReceived`]
    MessageReceived,
    /// [`TransportEvent::ErrorOccurred`]
    ErrorOccurred,
    /// [`TransportEvent::Reconnecting`]
    Reconnecting,
    /// [`TransportEvent::Latency`]
    Latency,
}

/// Broadcast registry for [`TransportEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<TransportEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus that buffers up to `capacity` events per slow subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: None,
        }
    }

    /// Subscribe to events of one kind.
    #[must_use]
    pub fn subscribe_to(&self, kind: EventKind) -> EventSubscription {
        EventSubscription {
            receiver: self.sender.subscribe(),
            filter: Some(kind),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A (possibly filtered) stream of events.
#[derive(Debug)]
pub struct EventSubscription {
    receiver: broadcast::Receiver<TransportEvent>,
    filter: Option<EventKind>,
}

impl EventSubscription {
    /// Wait for the next matching event. `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.is_none_or(|kind| kind == event.kind()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Return a matching event if one is already buffered.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.is_none_or(|kind| kind == event.kind()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Current connection state plus change notification.
///
/// Every transition is mirrored onto the [`EventBus`] as
/// [`TransportEvent::StateChanged`]. Once `Closed` is reached no further
/// transitions are accepted.
#[derive(Debug)]
pub struct StateCell {
    sender: watch::Sender<ConnectionState>,
    events: EventBus,
}

impl StateCell {
    /// Create a cell starting in `Disconnected`.
    #[must_use]
    pub fn new(events: EventBus) -> Self {
        let (sender, _) = watch::channel(ConnectionState::Disconnected);
        Self { sender, events }
    }

    /// Current state.
    #[must_use]
    pub fn get(&self) -> ConnectionState {
        *self.sender.borrow()
    }

    /// Watch for changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.sender.subscribe()
    }

    /// Move to `next`. Returns the previous state, or `None` if nothing changed.
    pub fn set(&self, next: ConnectionState) -> Option<ConnectionState> {
        let mut previous = None;
        self.sender.send_if_modified(|current| {
            if *current == next || current.is_terminal() {
                return false;
            }
            previous = Some(*current);
            *current = next;
            true
        });
        if let Some(prev) = previous {
            debug!(from = %prev, to = %next, "connection state changed");
            self.events.emit(TransportEvent::StateChanged {
                previous: prev,
                current: next,
            });
        }
        previous
    }

    /// Move to `next` only if the current state is `expected`.
    pub fn compare_and_set(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        let mut swapped = false;
        self.sender.send_if_modified(|current| {
            if *current != expected || current.is_terminal() || expected == next {
                return false;
            }
            *current = next;
            swapped = true;
            true
        });
        if swapped {
            debug!(from = %expected, to = %next, "connection state changed");
            self.events.emit(TransportEvent::StateChanged {
                previous: expected,
                current: next,
            });
        }
        swapped
    }
}
