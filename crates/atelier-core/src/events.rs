//! Typed in-process event bus
//!
//! Cross-component signals are modeled as a small set of message kinds
//! rather than ambient global events. Loop prevention is an explicit
//! field on the message: a `CollectionChanged` carrying
//! `skip_refresh: true` is informational only and must never be treated
//! as a refresh trigger by its listeners.

use tokio::sync::broadcast;

/// The well-known durable key whose cross-process change signals an
/// artwork collection update in another session.
pub const ARTWORK_STORAGE_KEY: &str = "atelier.artworks";

/// Signals delivered between components
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The artwork collection changed.
    ///
    /// `skip_refresh` marks a rebroadcast from the sync engine's own
    /// mutation path; listeners repaint but do not re-enter refresh.
    CollectionChanged { skip_refresh: bool },
    /// The auth credential was replaced or removed
    AuthChanged { authenticated: bool },
    /// The session was invalidated; all local user data must be zeroed
    ForcedLogout,
    /// A durable key changed in another session (cross-tab storage event)
    StorageChanged { key: String },
}

/// Broadcast bus for [`AppEvent`]s
///
/// Cheap to clone; every subscriber sees every event published after it
/// subscribed. Publishing with no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a bus with the default buffer
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    /// Create a bus buffering up to `capacity` undelivered events per
    /// subscriber
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: AppEvent) {
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
