//! Session lifecycle notifications for the consuming front end.
//!
//! # Design
//! - The client never navigates; it publishes events and the consumer decides.
//! - `Unauthorized` is emitted once per invalidated session, by the request
//!   that actually cleared it.

use tokio::sync::broadcast;

const DEFAULT_SIGNAL_CAPACITY: usize = 16;

/// Session transitions a front end may react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A login succeeded and a new session is active.
    LoggedIn {
        /// Account name the session belongs to.
        username: String,
    },
    /// The user logged out explicitly.
    LoggedOut,
    /// The service rejected the session token; the consumer should show the
    /// login view.
    Unauthorized,
}

/// Broadcast channel carrying [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    sender: broadcast::Sender<SessionEvent>,
}

impl Default for SessionSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSignal {
    /// Create a signal with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SIGNAL_CAPACITY)
    }

    /// Create a signal with an explicit buffer size.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to current subscribers. Having none is not an error.
    pub fn emit(&self, event: SessionEvent) {
        tracing::debug!(?event, receivers = self.sender.receiver_count(), "session event");
        if self.sender.send(event).is_err() {
            tracing::trace!("no session subscribers");
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
