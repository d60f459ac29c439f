//! Spawn configuration for interactive and one-shot invocations

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default bound on interactions waiting behind the in-flight one.
pub const DEFAULT_MAX_BACKLOG: usize = 10;

/// Configuration for spawning a ghc-mod process
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnConfig {
    /// Executable command
    pub command: String,
    /// Arguments passed at spawn time (before any per-interaction command)
    pub args: Vec<String>,
    /// Working directory (None = current dir)
    pub working_dir: Option<PathBuf>,
    /// Environment variables (added to parent env)
    pub env: HashMap<String, String>,
    /// Wrap per-interaction arguments in \x02/\x03 delimiters
    pub quote_args: bool,
    /// Inactivity timeout for a single interaction (None = no timeout)
    pub interaction_timeout: Option<Duration>,
    /// Resident-memory ceiling in bytes (None = unlimited)
    pub memory_limit: Option<u64>,
    /// Kill the process after this long without interactions (None = never)
    pub idle_kill: Option<Duration>,
    /// Maximum number of interactions waiting behind the in-flight one
    pub max_backlog: usize,
}

impl SpawnConfig {
    /// Create new spawn configuration
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            working_dir: None,
            env: HashMap::new(),
            quote_args: false,
            interaction_timeout: None,
            memory_limit: None,
            idle_kill: None,
            max_backlog: DEFAULT_MAX_BACKLOG,
        }
    }

    /// Set spawn-time arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Enable control-byte quoting of interaction arguments
    pub fn quote_args(mut self, quote: bool) -> Self {
        self.quote_args = quote;
        self
    }

    /// Set interaction inactivity timeout in seconds
    pub fn interaction_timeout_secs(mut self, secs: u64) -> Self {
        self.interaction_timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Set interaction inactivity timeout
    pub fn interaction_timeout(mut self, duration: Duration) -> Self {
        self.interaction_timeout = Some(duration);
        self
    }

    /// Set resident-memory ceiling in megabytes (0 = unlimited)
    pub fn memory_limit_mb(mut self, megabytes: u64) -> Self {
        self.memory_limit = (megabytes > 0).then_some(megabytes * 1024 * 1024);
        self
    }

    /// Set idle auto-kill delay in minutes (0 = disabled)
    pub fn idle_kill_minutes(mut self, minutes: u64) -> Self {
        self.idle_kill = (minutes > 0).then_some(Duration::from_secs(minutes * 60));
        self
    }

    /// Set the waiting-interaction bound
    pub fn max_backlog(mut self, bound: usize) -> Self {
        self.max_backlog = bound;
        self
    }
}
