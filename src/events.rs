//! Phase Events
//!
//! Every phase change of a bridge transaction is published on a tokio
//! broadcast channel. Observers subscribe; a publish with no subscriber is
//! not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{Direction, Phase};

/// A single phase transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseEvent {
    pub transaction_id: String,
    pub direction: Direction,
    pub from: Phase,
    pub to: Phase,
    /// Unix seconds
    pub timestamp: u64,
}

impl PhaseEvent {
    pub fn new(
        transaction_id: impl Into<String>,
        direction: Direction,
        from: Phase,
        to: Phase,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            direction,
            from,
            to,
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
        }
    }
}

/// Broadcast publisher for phase events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PhaseEvent>,
}

impl EventPublisher {
    /// Create a publisher with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PhaseEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: PhaseEvent) {
        // no subscribers
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}
