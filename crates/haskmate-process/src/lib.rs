//! # haskmate-process
//!
//! **Purpose**: ownership of spawned ghc-mod processes for haskmate
//!
//! Provides the long-lived interactive process wrapper (line-oriented
//! request/response protocol with timeout, crash and memory supervision)
//! and the one-shot invocation path used when no interactive session is
//! available.
//!
//! ## Features
//!
//! - **Interactive protocol**: single in-flight interaction per process,
//!   `OK`-terminated responses, `\x04`-terminated input blocks
//! - **Supervision**: inactivity timeout, resident-memory ceiling, idle
//!   auto-kill, SIGTERM→SIGKILL shutdown escalation
//! - **Backlog control**: bounded FIFO of waiting interactions with
//!   fail-fast rejection beyond the bound
//! - **One-shot runner**: spawn, feed stdin, collect output with timeout
//!
//! ## Usage
//!
//! ```rust,no_run
//! use haskmate_process::{InteractiveProcess, SpawnConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SpawnConfig::new("ghc-mod")
//!     .args(["legacy-interactive"])
//!     .working_dir("/home/user/project")
//!     .interaction_timeout_secs(60);
//!
//! let process = InteractiveProcess::new(config);
//! let reply = process.interact("check", &["src/Main.hs".into()], None).await?;
//! println!("{} lines", reply.stdout.len());
//!
//! process.kill().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod interactive;
pub mod line_reader;
pub mod memory;
pub mod oneshot;

pub use config::SpawnConfig;
pub use error::{ProcessError, Result};
pub use interactive::{Interaction, InteractiveProcess};
pub use line_reader::LineReader;
pub use oneshot::{run_oneshot, RunOutput};
