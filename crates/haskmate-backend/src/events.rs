//! Root-scoped backend lifecycle events
//!
//! Broadcast so every interested UI indicator for a root reacts uniformly;
//! subscribing is optional and sends never block.

use tokio::sync::broadcast;

use crate::capabilities::Capabilities;
use crate::queue::QueueCategory;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Context attached to crash/timeout reports
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub command: String,
    pub args: Vec<String>,
    pub capabilities: Capabilities,
    pub message: String,
}

/// Lifecycle and reporting events for one project root
#[derive(Debug, Clone)]
pub enum BackendEvent {
    /// Some queue became non-empty
    Active,
    /// All queues drained
    Idle,
    /// One queue category drained
    QueueIdle { queue: QueueCategory },
    /// Non-fatal tool noise (stderr output, skipped lines)
    Warning { message: String },
    /// Crash or timeout with full interaction context
    Error { context: ErrorContext },
}

/// Broadcast sender plus subscribe handle
#[derive(Debug, Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<BackendEvent>,
}

impl EventChannel {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.sender.subscribe()
    }

    /// Fire-and-forget; an event with no subscribers is dropped
    pub fn emit(&self, event: BackendEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventChannel {
    fn default() -> Self {
        Self::new()
    }
}
