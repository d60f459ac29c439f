//! Backend factory: version probing, compatibility checks, rebuild flow
//!
//! Produces one ready-to-use [`Backend`] per project root. Version probing
//! happens exactly once per root; the owner caches the produced backend.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use haskmate_process::{run_oneshot, LineReader, SpawnConfig};

use crate::capabilities::{at_least, Capabilities};
use crate::error::{BackendError, Result};
use crate::notify::Notifier;
use crate::router::Backend;
use crate::version::{parse_version_output, ToolVersion};

/// Build tool driving the project, steering detection flags and rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildTool {
    Cabal,
    #[default]
    Stack,
    None,
}

/// Per-root backend configuration
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Analysis root the tool runs against
    pub root_dir: PathBuf,
    /// The user's project root (settings scope)
    pub project_dir: PathBuf,
    /// Tool executable, name or absolute path
    pub tool_path: String,
    pub build_tool: BuildTool,
    /// Enables the `imported-from` capability
    pub experimental_imported_from: bool,
    /// Use the persistent interactive process when a command allows it
    pub interactive: bool,
    /// Inactivity timeout for one action, seconds
    pub interaction_timeout_secs: u64,
    /// Kill the interactive process after this many idle minutes (0 = never)
    pub idle_kill_minutes: u64,
    /// Resident-memory ceiling for the interactive process, MB (0 = unlimited)
    pub memory_limit_mb: u64,
    /// Initial browse queue concurrency
    pub browse_parallelism: usize,
    /// Extra bin directories prepended to PATH
    pub extra_path: Vec<PathBuf>,
    /// Suppress the compiler-mismatch prompt
    pub mismatch_acknowledged: bool,
}

impl BackendOptions {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        let root_dir = root_dir.into();
        Self {
            project_dir: root_dir.clone(),
            root_dir,
            tool_path: "ghc-mod".to_string(),
            build_tool: BuildTool::default(),
            experimental_imported_from: false,
            interactive: true,
            interaction_timeout_secs: 300,
            idle_kill_minutes: 10,
            memory_limit_mb: 4096,
            browse_parallelism: 2,
            extra_path: Vec::new(),
            mismatch_acknowledged: false,
        }
    }
}

/// Creates configured backends, probing tool and compiler versions once
pub struct BackendFactory {
    notifier: Arc<dyn Notifier>,
}

impl BackendFactory {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    /// Probe versions, derive capabilities, and produce a backend.
    ///
    /// Fails when the tool cannot be found or its version line does not
    /// parse. A compiler mismatch prompts the user; accepting a rebuild
    /// (stack only) retries the whole factory once after it succeeds.
    pub async fn create(&self, options: BackendOptions) -> Result<Backend> {
        let mut rebuild_attempted = false;
        loop {
            let env = spawn_env(&options);

            let (tool, path_compiler) = tokio::join!(
                probe_tool_version(&options, &env),
                probe_path_compiler(&options, &env),
            );
            let tool = tool?;
            info!(
                root = %options.root_dir.display(),
                version = ?tool.numbers,
                compiler = ?tool.compiler,
                "Probed ghc-mod"
            );

            if !rebuild_attempted
                && !options.mismatch_acknowledged
                && self.handle_mismatch(&options, &tool, path_compiler.as_deref(), &env).await
            {
                rebuild_attempted = true;
                continue;
            }

            if !at_least(&tool.numbers, &[5, 4]) {
                self.notifier.error(&format!(
                    "ghc-mod {} is not supported; please upgrade to 5.4 or newer. \
                     Proceeding anyway, expect degraded behavior.",
                    join_version(&tool.numbers)
                ));
            } else if !at_least(&tool.numbers, &[5, 5]) {
                self.notifier.warning(&format!(
                    "ghc-mod {} is deprecated; consider upgrading.",
                    join_version(&tool.numbers)
                ));
            }

            let capabilities =
                Capabilities::from_version(&tool.numbers, options.experimental_imported_from);
            debug!(?capabilities, "Derived capability set");

            return Ok(Backend::new(
                options,
                capabilities,
                Arc::clone(&self.notifier),
                env,
            ));
        }
    }

    /// Returns true when a rebuild ran successfully and the factory should
    /// retry from scratch
    async fn handle_mismatch(
        &self,
        options: &BackendOptions,
        tool: &ToolVersion,
        path_compiler: Option<&str>,
        env: &HashMap<String, String>,
    ) -> bool {
        let (Some(built_against), Some(on_path)) = (tool.compiler.as_deref(), path_compiler)
        else {
            return false;
        };
        if built_against == on_path {
            return false;
        }

        let message = format!(
            "ghc-mod was built against GHC {built_against}, but GHC {on_path} is active. \
             Reinstalling ghc-mod against the active compiler is recommended."
        );
        // Remediation is only offered for stack; other build tools get a
        // warning without a rebuild path.
        if options.build_tool != BuildTool::Stack {
            self.notifier.warning(&message);
            return false;
        }
        if !self.notifier.confirm_rebuild(&message).await {
            return false;
        }

        match self.run_rebuild(options, env).await {
            Ok(()) => {
                info!(root = %options.root_dir.display(), "Rebuild succeeded, re-probing");
                true
            }
            Err(e) => {
                self.notifier
                    .warning(&format!("Rebuild failed ({e}); proceeding with mismatch"));
                false
            }
        }
    }

    /// `stack build ghc-mod`, streaming output lines to the notifier
    async fn run_rebuild(
        &self,
        options: &BackendOptions,
        env: &HashMap<String, String>,
    ) -> Result<()> {
        let mut cmd = tokio::process::Command::new("stack");
        cmd.args(["build", "ghc-mod"])
            .current_dir(&options.root_dir)
            .envs(env)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|source| BackendError::Spawn {
            command: "stack".to_string(),
            source,
        })?;

        let mut stdout = LineReader::new(child.stdout.take().expect("stdout was piped"));
        let mut stderr = LineReader::new(child.stderr.take().expect("stderr was piped"));
        let mut stderr_open = true;
        loop {
            tokio::select! {
                line = stdout.next_line() => match line? {
                    Some(line) => self.notifier.rebuild_output(&line),
                    None => break,
                },
                line = stderr.next_line(), if stderr_open => match line? {
                    Some(line) => self.notifier.rebuild_output(&line),
                    None => stderr_open = false,
                },
            }
        }
        let status = child.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(BackendError::Tool {
                message: format!("stack build ghc-mod exited with {status}"),
            })
        }
    }
}

/// Spawn environment with PATH augmented by sandbox bin directories
pub(crate) fn spawn_env(options: &BackendOptions) -> HashMap<String, String> {
    let mut prefix: Vec<PathBuf> = Vec::new();
    let sandbox_bin = options.root_dir.join(".cabal-sandbox").join("bin");
    if sandbox_bin.is_dir() {
        prefix.push(sandbox_bin);
    }
    prefix.extend(options.extra_path.iter().cloned());

    let mut env = HashMap::new();
    if !prefix.is_empty() {
        let current = std::env::var("PATH").unwrap_or_default();
        let mut parts: Vec<String> = prefix
            .into_iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        if !current.is_empty() {
            parts.push(current);
        }
        env.insert("PATH".to_string(), parts.join(":"));
    }
    env
}

async fn probe_tool_version(
    options: &BackendOptions,
    env: &HashMap<String, String>,
) -> Result<ToolVersion> {
    let mut config = SpawnConfig::new(&options.tool_path)
        .args(["version"])
        .working_dir(&options.root_dir)
        .interaction_timeout_secs(30);
    for (key, value) in env {
        config = config.env(key, value);
    }
    let output = run_oneshot(&config, None)
        .await
        .map_err(|e| match e {
            haskmate_process::ProcessError::SpawnFailed { command, source } => {
                BackendError::Spawn { command, source }
            }
            other => BackendError::Process(other),
        })?;
    if !output.success() {
        return Err(BackendError::Version {
            message: format!("version probe failed: {}", output.stderr.join("\n")),
        });
    }
    parse_version_output(&output.stdout)
}

/// Compiler version visible through the configured build tool
async fn probe_path_compiler(
    options: &BackendOptions,
    env: &HashMap<String, String>,
) -> Option<String> {
    let (command, args): (&str, Vec<&str>) = match options.build_tool {
        BuildTool::Stack => ("stack", vec!["ghc", "--", "--numeric-version"]),
        BuildTool::Cabal | BuildTool::None => ("ghc", vec!["--numeric-version"]),
    };
    let mut config = SpawnConfig::new(command)
        .args(args)
        .working_dir(&options.root_dir)
        .interaction_timeout_secs(30);
    for (key, value) in env {
        config = config.env(key, value);
    }
    match run_oneshot(&config, None).await {
        Ok(output) if output.success() => {
            output.stdout.iter().rev().find(|l| !l.is_empty()).cloned()
        }
        Ok(output) => {
            warn!(stderr = ?output.stderr, "Compiler probe failed");
            None
        }
        Err(e) => {
            warn!(error = %e, "Compiler probe could not run");
            None
        }
    }
}

fn join_version(numbers: &[u64]) -> String {
    numbers
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
