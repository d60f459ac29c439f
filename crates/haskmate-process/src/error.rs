//! Error types for process ownership

use std::io;
use thiserror::Error;

/// Process-level errors
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Failed to spawn process
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: io::Error,
    },

    /// Interaction exceeded its inactivity timeout; the process was killed
    #[error("Interaction timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Process exited mid-interaction
    #[error("Process crashed: {reason}")]
    Crashed {
        reason: String,
        /// Output lines accumulated before the crash
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    /// Too many interactions already waiting on this process
    #[error("Interaction backlog full ({bound} waiting)")]
    BacklogFull { bound: usize },

    /// Stream I/O failure on the child's stdio
    #[error("Process I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;
