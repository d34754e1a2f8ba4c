//! Alert lifecycle events.
//!
//! These events can be subscribed to via `AlertSystem::subscribe()` to follow
//! what the rotators and the poller are doing.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::error::SourceError;
use crate::event::{Category, Event};
use crate::poller::PollReport;
use crate::source::SessionHandle;

/// Why a popped event was not displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The active scene has no alert UI for the category.
    Unbound {
        scene: Option<String>,
        missing: Vec<String>,
    },
    /// The category is disabled.
    Disabled,
}

/// Events emitted by the alert system.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// An alert became visible.
    Shown {
        category: Category,
        event: Event,
        scene: String,
        at: DateTime<Utc>,
    },
    /// The visible alert was hidden.
    Retired {
        category: Category,
        event: Event,
        shown_at: DateTime<Utc>,
    },
    /// A queued event was discarded without being shown.
    Dropped {
        category: Category,
        event: Event,
        reason: DropReason,
    },
    /// A poll tick completed and appended events.
    Polled { report: PollReport },
    /// A poll tick was abandoned.
    PollFailed { error: SourceError },
    /// The live session used for rants changed.
    SessionChanged { session: Option<SessionHandle> },
}

/// Broadcasts [`AlertEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct AlertEventBroadcaster {
    sender: broadcast::Sender<AlertEvent>,
}

impl AlertEventBroadcaster {
    /// Create a new broadcaster with default capacity (256).
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: AlertEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for AlertEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
