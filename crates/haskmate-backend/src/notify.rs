//! Notification collaborator seam
//!
//! The editor glue implements [`Notifier`]; the backend never renders UI
//! itself. The default implementation just logs.

use async_trait::async_trait;
use tracing::{error, info, warn};

/// User-facing notification sink
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Non-fatal problem worth the user's attention
    fn warning(&self, message: &str);

    /// Fatal or actionable problem
    fn error(&self, message: &str);

    /// Ask whether to rebuild the tool against the current compiler.
    /// Returning `false` declines; the default declines silently.
    async fn confirm_rebuild(&self, _message: &str) -> bool {
        false
    }

    /// Live output line from a running rebuild
    fn rebuild_output(&self, _line: &str) {}
}

/// Notifier that forwards everything to the tracing subscriber
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn warning(&self, message: &str) {
        warn!(message, "Notification");
    }

    fn error(&self, message: &str) {
        error!(message, "Notification");
    }

    fn rebuild_output(&self, line: &str) {
        info!(line, "Rebuild output");
    }
}
