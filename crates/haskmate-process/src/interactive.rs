//! Long-lived interactive ghc-mod process wrapper
//!
//! Owns at most one spawned child and serializes all interactions onto it.
//! An interaction writes one command line (plus an optional input block),
//! then reads response lines until the `OK` sentinel. Completion races
//! against unexpected child exit, the inactivity timeout, and the
//! resident-memory ceiling; any loser leaves the wrapper ready to respawn
//! on the next interaction.

use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    config::SpawnConfig,
    error::{ProcessError, Result},
    line_reader::LineReader,
    memory,
};

/// Sentinel line terminating a successful response
const OK_SENTINEL: &str = "OK";
/// End-of-transmission marker closing an input block
const EOT: &[u8] = b"\x04\n";
/// How often resident memory is sampled during an interaction
const MEMORY_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);
/// Grace between SIGTERM and SIGKILL on shutdown
const KILL_GRACE: Duration = Duration::from_secs(2);

/// Result of one interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    /// Response lines, excluding the `OK` sentinel
    pub stdout: Vec<String>,
    /// Lines the child wrote to stderr during the interaction
    pub stderr: Vec<String>,
}

struct Session {
    child: Child,
    stdin: ChildStdin,
    stdout: LineReader<ChildStdout>,
    stderr: LineReader<ChildStderr>,
    stderr_open: bool,
    pid: u32,
}

enum Outcome {
    Completed(Interaction),
    Crashed {
        reason: String,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },
    TimedOut,
}

/// One spawned interactive process per project root
pub struct InteractiveProcess {
    config: SpawnConfig,
    session: Arc<Mutex<Option<Session>>>,
    waiting: AtomicUsize,
    last_activity: Arc<StdMutex<Instant>>,
    watchdog: StdMutex<Option<JoinHandle<()>>>,
}

impl InteractiveProcess {
    /// Create a wrapper; the child is spawned lazily on first interaction
    pub fn new(config: SpawnConfig) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(None)),
            waiting: AtomicUsize::new(0),
            last_activity: Arc::new(StdMutex::new(Instant::now())),
            watchdog: StdMutex::new(None),
        }
    }

    /// Spawn options this wrapper was created with
    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Pid of the live child, if one is running
    pub async fn pid(&self) -> Option<u32> {
        self.session.lock().await.as_ref().map(|s| s.pid)
    }

    /// Run one command through the interactive protocol.
    ///
    /// Concurrent calls queue FIFO behind the in-flight one; callers beyond
    /// the configured backlog bound fail fast with [`ProcessError::BacklogFull`].
    pub async fn interact(
        &self,
        command: &str,
        args: &[String],
        input: Option<&str>,
    ) -> Result<Interaction> {
        // occupancy counts the in-flight interaction plus everyone queued
        let occupancy = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = CounterGuard(&self.waiting);
        if occupancy > self.config.max_backlog {
            return Err(ProcessError::BacklogFull {
                bound: self.config.max_backlog,
            });
        }
        self.interact_locked(command, args, input).await
    }

    async fn interact_locked(
        &self,
        command: &str,
        args: &[String],
        input: Option<&str>,
    ) -> Result<Interaction> {
        let mut guard = self.session.lock().await;

        if guard.is_none() {
            *guard = Some(self.spawn().await?);
            self.start_watchdog();
        }
        *self.last_activity.lock().unwrap() = Instant::now();

        let session = guard.as_mut().unwrap();
        let outcome = self.drive(session, command, args, input).await;
        *self.last_activity.lock().unwrap() = Instant::now();

        match outcome {
            Outcome::Completed(interaction) => {
                if !interaction.stderr.is_empty() {
                    warn!(
                        command = %command,
                        lines = interaction.stderr.len(),
                        "Interactive process wrote to stderr"
                    );
                }
                Ok(interaction)
            }
            Outcome::Crashed {
                reason,
                stdout,
                stderr,
            } => {
                if let Some(session) = guard.take() {
                    kill_session(session).await;
                }
                Err(ProcessError::Crashed {
                    reason,
                    stdout,
                    stderr,
                })
            }
            Outcome::TimedOut => {
                if let Some(session) = guard.take() {
                    kill_session(session).await;
                }
                Err(ProcessError::Timeout {
                    seconds: self
                        .config
                        .interaction_timeout
                        .map(|t| t.as_secs())
                        .unwrap_or(0),
                })
            }
        }
    }

    /// Close stdin, signal the child, and resolve once it has exited
    pub async fn kill(&self) {
        if let Some(handle) = self.watchdog.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(session) = self.session.lock().await.take() {
            kill_session(session).await;
        }
    }

    async fn spawn(&self) -> Result<Session> {
        debug!(
            command = %self.config.command,
            args = ?self.config.args,
            "Spawning interactive process"
        );

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = self.config.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.config.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
            command: self.config.command.clone(),
            source,
        })?;
        let pid = child.id().unwrap_or(0);
        let stdin = child.stdin.take().expect("stdin was piped");
        let stdout = LineReader::new(child.stdout.take().expect("stdout was piped"));
        let stderr = LineReader::new(child.stderr.take().expect("stderr was piped"));

        info!(pid = %pid, command = %self.config.command, "Interactive process spawned");

        Ok(Session {
            child,
            stdin,
            stdout,
            stderr,
            stderr_open: true,
            pid,
        })
    }

    async fn drive(
        &self,
        session: &mut Session,
        command: &str,
        args: &[String],
        input: Option<&str>,
    ) -> Outcome {
        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();

        if let Err(e) = self.send_request(session, command, args, input).await {
            return Outcome::Crashed {
                reason: format!("failed to write request: {e}"),
                stdout: stdout_lines,
                stderr: stderr_lines,
            };
        }

        let timeout = self.config.interaction_timeout;
        let mut deadline = timeout.map(|t| Instant::now() + t);
        let mut memory_timer = tokio::time::interval(MEMORY_SAMPLE_INTERVAL);

        loop {
            let inactivity = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                read = session.stdout.next_line() => match read {
                    Ok(Some(line)) if line == OK_SENTINEL => {
                        return Outcome::Completed(Interaction {
                            stdout: stdout_lines,
                            stderr: stderr_lines,
                        });
                    }
                    Ok(Some(line)) => {
                        stdout_lines.push(line);
                        deadline = timeout.map(|t| Instant::now() + t);
                    }
                    Ok(None) => {
                        return Outcome::Crashed {
                            reason: "stdout closed before OK".to_string(),
                            stdout: stdout_lines,
                            stderr: stderr_lines,
                        };
                    }
                    Err(e) => {
                        return Outcome::Crashed {
                            reason: format!("stdout read failed: {e}"),
                            stdout: stdout_lines,
                            stderr: stderr_lines,
                        };
                    }
                },
                read = session.stderr.next_line(), if session.stderr_open => match read {
                    Ok(Some(line)) => stderr_lines.push(line),
                    Ok(None) | Err(_) => session.stderr_open = false,
                },
                status = session.child.wait() => {
                    let reason = match status {
                        Ok(status) => format!("process exited mid-interaction: {status}"),
                        Err(e) => format!("process lost mid-interaction: {e}"),
                    };
                    return Outcome::Crashed {
                        reason,
                        stdout: stdout_lines,
                        stderr: stderr_lines,
                    };
                }
                _ = inactivity => return Outcome::TimedOut,
                _ = memory_timer.tick(), if self.config.memory_limit.is_some() => {
                    let ceiling = self.config.memory_limit.unwrap();
                    if let Some(rss) = memory::resident_bytes(session.pid) {
                        if rss > ceiling {
                            return Outcome::Crashed {
                                reason: format!(
                                    "resident memory {rss} exceeded ceiling {ceiling}"
                                ),
                                stdout: stdout_lines,
                                stderr: stderr_lines,
                            };
                        }
                    }
                }
            }
        }
    }

    async fn send_request(
        &self,
        session: &mut Session,
        command: &str,
        args: &[String],
        input: Option<&str>,
    ) -> std::io::Result<()> {
        let mut line = String::from(command);
        for arg in args {
            line.push(' ');
            if self.config.quote_args {
                line.push('\u{2}');
                line.push_str(arg);
                line.push('\u{3}');
            } else {
                line.push_str(arg);
            }
        }
        line.push('\n');
        session.stdin.write_all(line.as_bytes()).await?;

        if let Some(text) = input {
            session.stdin.write_all(text.as_bytes()).await?;
            if !text.ends_with('\n') {
                session.stdin.write_all(b"\n").await?;
            }
            session.stdin.write_all(EOT).await?;
        }
        session.stdin.flush().await
    }

    fn start_watchdog(&self) {
        let Some(idle) = self.config.idle_kill else {
            return;
        };
        let session = Arc::clone(&self.session);
        let last_activity = Arc::clone(&self.last_activity);

        let handle = tokio::spawn(async move {
            loop {
                let elapsed = last_activity.lock().unwrap().elapsed();
                if elapsed < idle {
                    tokio::time::sleep(idle - elapsed).await;
                    continue;
                }
                // An in-flight interaction holds the lock; its completion
                // resets the activity clock, so just retry shortly.
                match session.try_lock() {
                    Ok(mut guard) => {
                        if let Some(session) = guard.take() {
                            info!(pid = %session.pid, "Killing idle interactive process");
                            kill_session(session).await;
                        }
                        return;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_secs(1)).await,
                }
            }
        });

        if let Some(old) = self.watchdog.lock().unwrap().replace(handle) {
            old.abort();
        }
    }
}

/// Decrements the occupancy count even when the caller is cancelled
struct CounterGuard<'a>(&'a AtomicUsize);

impl Drop for CounterGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn kill_session(session: Session) {
    let Session {
        mut child,
        stdin,
        pid,
        ..
    } = session;
    drop(stdin);

    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if pid > 0 {
            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        }
    }

    match tokio::time::timeout(KILL_GRACE, child.wait()).await {
        Ok(_) => debug!(pid = %pid, "Interactive process exited"),
        Err(_) => {
            warn!(pid = %pid, "Escalating to SIGKILL");
            let _ = child.start_kill();
            let _ = child.wait().await;
        }
    }
}

impl Drop for InteractiveProcess {
    fn drop(&mut self) {
        if let Some(handle) = self.watchdog.lock().unwrap().take() {
            handle.abort();
        }
        // kill_on_drop reaps a still-live child with the session
    }
}
