//! Error taxonomy for the per-root backend

use std::path::PathBuf;
use thiserror::Error;

use crate::capabilities::Capabilities;

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    /// The tool executable could not be started
    #[error(
        "Could not start '{command}': {source}. \
         Check that ghc-mod is installed and on PATH (or set the tool path \
         explicitly), and that the file is executable."
    )]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Version probe output did not parse, or the version is unsupported
    #[error("Could not determine ghc-mod version: {message}")]
    Version { message: String },

    /// The interactive process exited mid-interaction
    #[error("ghc-mod crashed running '{command}': {message}")]
    Crashed {
        command: String,
        args: Vec<String>,
        capabilities: Capabilities,
        message: String,
    },

    /// The interactive process exceeded the inactivity timeout
    #[error("ghc-mod timed out running '{command}' after {seconds}s")]
    Timeout {
        command: String,
        args: Vec<String>,
        capabilities: Capabilities,
        seconds: u64,
    },

    /// Settings mark the tool disabled for this scope
    #[error("ghc-mod is disabled by settings")]
    Disabled,

    /// A settings file exists but does not parse as JSON
    #[error("Failed to parse settings file {path}: {message}")]
    SettingsParse { path: PathBuf, message: String },

    /// The tool produced no usable output where some was required
    #[error("Unexpected ghc-mod output: {message}")]
    OutputParse { message: String },

    /// The tool exited unsuccessfully
    #[error("ghc-mod failed: {message}")]
    Tool { message: String },

    /// Underlying process error
    #[error(transparent)]
    Process(#[from] haskmate_process::ProcessError),

    /// Stream or file I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
