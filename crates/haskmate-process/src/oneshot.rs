//! One-shot ghc-mod invocation
//!
//! Used when no interactive process is available or enabled. Runs to
//! completion or to its own timeout; there is no cooperative cancellation
//! of a dispatched invocation.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{
    config::SpawnConfig,
    error::{ProcessError, Result},
};

/// Captured output of a one-shot invocation
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub status: std::process::ExitStatus,
}

impl RunOutput {
    /// Whether the process exited with status zero
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Spawn, optionally feed stdin, and collect output to end of stream.
///
/// `config.interaction_timeout` bounds the whole invocation; on expiry the
/// child is killed and [`ProcessError::Timeout`] is returned.
pub async fn run_oneshot(config: &SpawnConfig, input: Option<&str>) -> Result<RunOutput> {
    debug!(
        command = %config.command,
        args = ?config.args,
        "Running one-shot invocation"
    );

    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(ref dir) = config.working_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &config.env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::SpawnFailed {
        command: config.command.clone(),
        source,
    })?;

    if let Some(text) = input {
        let mut stdin = child.stdin.take().expect("stdin was piped");
        stdin.write_all(text.as_bytes()).await?;
        stdin.shutdown().await?;
        drop(stdin);
    }

    let collected = async {
        let output = child.wait_with_output().await?;
        Ok::<_, ProcessError>(RunOutput {
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
            status: output.status,
        })
    };

    match config.interaction_timeout {
        Some(timeout) => tokio::time::timeout(timeout, collected)
            .await
            .map_err(|_| ProcessError::Timeout {
                seconds: timeout.as_secs(),
            })?,
        None => collected.await,
    }
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .split_terminator('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect()
}
