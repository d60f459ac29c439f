//! Per-root command router
//!
//! Single call-in point for all analysis requests against one project
//! root. Owns the category queues, settings resolution, the interactive
//! process handle, command construction and output parsing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error};

use haskmate_process::{run_oneshot, InteractiveProcess, ProcessError, SpawnConfig};

use crate::capabilities::Capabilities;
use crate::error::{BackendError, Result};
use crate::events::{BackendEvent, ErrorContext, EventChannel};
use crate::factory::{spawn_env, BackendOptions, BuildTool};
use crate::notify::Notifier;
use crate::parse::{
    self, parse_browse_line, parse_check_lines, parse_span_output, CheckMode,
};
use crate::queue::{CommandQueues, QueueCategory};
use crate::settings::{self, Settings};
use crate::types::{
    BufferSnapshot, Diagnostic, Point, Severity, SigFill, Span, SpanText, SymbolDescriptor,
};

/// Unconditional time-based TTL of the module-list cache
const MODULE_LIST_TTL: Duration = Duration::from_secs(60);

/// A concrete command to run against the tool
#[derive(Debug, Clone, Default)]
struct CommandPlan {
    command: &'static str,
    /// Eligible for the persistent interactive process
    interactive: bool,
    dash_args: Vec<String>,
    /// Target file, passed after the command
    uri: Option<PathBuf>,
    /// Arguments after the uri
    positional: Vec<String>,
    /// Modified buffer text to map over the target file
    buffer_map: Option<String>,
}

struct ModuleListEntry {
    fetched_at: tokio::time::Instant,
    modules: Arc<Vec<String>>,
}

/// Backend for one project root
pub struct Backend {
    options: BackendOptions,
    capabilities: Capabilities,
    notifier: Arc<dyn Notifier>,
    env: HashMap<String, String>,
    events: EventChannel,
    queues: CommandQueues,
    process: Mutex<Option<Arc<InteractiveProcess>>>,
    module_list: Mutex<Option<ModuleListEntry>>,
    pragmas: Mutex<Option<Arc<Vec<String>>>>,
    flags: Mutex<Option<Arc<Vec<String>>>>,
}

impl Backend {
    pub(crate) fn new(
        options: BackendOptions,
        capabilities: Capabilities,
        notifier: Arc<dyn Notifier>,
        env: HashMap<String, String>,
    ) -> Self {
        let events = EventChannel::new();
        let queues = CommandQueues::new(events.clone(), options.browse_parallelism);
        Self {
            options,
            capabilities,
            notifier,
            env,
            events,
            queues,
            process: Mutex::new(None),
            module_list: Mutex::new(None),
            pragmas: Mutex::new(None),
            flags: Mutex::new(None),
        }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn root_dir(&self) -> &Path {
        &self.options.root_dir
    }

    /// Subscribe to lifecycle and reporting events for this root
    pub fn subscribe(&self) -> broadcast::Receiver<BackendEvent> {
        self.events.subscribe()
    }

    /// Force every category through the single shared queue
    pub fn set_low_memory(&self, on: bool) {
        self.queues.set_low_memory(on);
    }

    /// Adjust browse concurrency live
    pub fn set_browse_parallelism(&self, limit: usize) {
        self.queues.set_browse_parallelism(limit);
    }

    /// Modules visible from this root, cached for sixty seconds
    pub async fn list_modules(&self) -> Result<Arc<Vec<String>>> {
        let mut cache = self.module_list.lock().await;
        if let Some(entry) = cache.as_ref() {
            if entry.fetched_at.elapsed() < MODULE_LIST_TTL {
                return Ok(Arc::clone(&entry.modules));
            }
        }
        let lines = self
            .run_plan(
                QueueCategory::List,
                CommandPlan {
                    command: "list",
                    interactive: true,
                    ..Default::default()
                },
            )
            .await?;
        let modules = Arc::new(
            lines
                .into_iter()
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>(),
        );
        *cache = Some(ModuleListEntry {
            fetched_at: tokio::time::Instant::now(),
            modules: Arc::clone(&modules),
        });
        Ok(modules)
    }

    /// Known language pragmas, fetched once per root
    pub async fn language_pragmas(&self) -> Result<Arc<Vec<String>>> {
        self.cached_listing(&self.pragmas, "lang").await
    }

    /// Known compiler flags, fetched once per root
    pub async fn compiler_flags(&self) -> Result<Arc<Vec<String>>> {
        self.cached_listing(&self.flags, "flag").await
    }

    async fn cached_listing(
        &self,
        cache: &Mutex<Option<Arc<Vec<String>>>>,
        command: &'static str,
    ) -> Result<Arc<Vec<String>>> {
        let mut cache = cache.lock().await;
        if let Some(listing) = cache.as_ref() {
            return Ok(Arc::clone(listing));
        }
        let lines = self
            .run_plan(
                QueueCategory::Init,
                CommandPlan {
                    command,
                    interactive: true,
                    ..Default::default()
                },
            )
            .await?;
        let listing = Arc::new(
            lines
                .into_iter()
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>(),
        );
        *cache = Some(Arc::clone(&listing));
        Ok(listing)
    }

    /// Exported symbols of the given modules
    pub async fn browse(&self, modules: &[String]) -> Result<Vec<SymbolDescriptor>> {
        let mut modules: Vec<String> = modules.to_vec();
        if !self.capabilities.browse_main {
            modules.retain(|module| module != "Main");
        }
        if modules.is_empty() {
            // nothing to ask; never touches the process
            return Ok(Vec::new());
        }
        let mut dash_args = vec!["-d".to_string()];
        if self.capabilities.browse_parents {
            dash_args.push("-p".to_string());
        }
        let lines = self
            .run_plan(
                QueueCategory::Browse,
                CommandPlan {
                    command: "browse",
                    interactive: true,
                    dash_args,
                    positional: modules,
                    ..Default::default()
                },
            )
            .await?;
        Ok(lines
            .iter()
            .filter(|line| !line.is_empty())
            .map(|line| parse_browse_line(line))
            .collect())
    }

    /// Type of the smallest expression containing `selection`
    pub async fn type_at(
        &self,
        buffer: &BufferSnapshot,
        selection: Span,
    ) -> Result<Option<SpanText>> {
        let shifted = parse::tab_shift_point(&buffer.text, selection.start);
        let mut dash_args = Vec::new();
        if self.capabilities.type_constraints {
            dash_args.push("-c".to_string());
        }
        let lines = self
            .run_plan(
                QueueCategory::TypeInfo,
                CommandPlan {
                    command: "type",
                    interactive: true,
                    dash_args,
                    uri: Some(buffer.uri.clone()),
                    positional: vec![
                        (shifted.row + 1).to_string(),
                        (shifted.column + 1).to_string(),
                    ],
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                },
            )
            .await?;
        Ok(self
            .unshift_spans(buffer, parse_span_output(&lines))
            .into_iter()
            .filter(|candidate| candidate.span.contains(&selection))
            .min_by_key(|candidate| candidate.span.size_key()))
    }

    /// Symbol info text (`info` command)
    pub async fn info_at(&self, buffer: &BufferSnapshot, symbol: &str) -> Result<String> {
        let lines = self
            .run_plan(
                QueueCategory::TypeInfo,
                CommandPlan {
                    command: "info",
                    interactive: true,
                    uri: Some(buffer.uri.clone()),
                    positional: vec![symbol.to_string()],
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(lines.join("\n"))
    }

    /// Case-split alternatives at a point
    pub async fn case_split(
        &self,
        buffer: &BufferSnapshot,
        at: Point,
    ) -> Result<Vec<SpanText>> {
        let shifted = parse::tab_shift_point(&buffer.text, at);
        let lines = self
            .run_plan(
                QueueCategory::TypeInfo,
                CommandPlan {
                    command: "split",
                    interactive: self.capabilities.interactive_case_split,
                    uri: Some(buffer.uri.clone()),
                    positional: vec![
                        (shifted.row + 1).to_string(),
                        (shifted.column + 1).to_string(),
                    ],
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(self.unshift_spans(buffer, parse_span_output(&lines)))
    }

    /// Skeleton body for a type signature (`sig` command); the output's
    /// first line names what is being filled, the rest is a span record
    pub async fn sig_fill(&self, buffer: &BufferSnapshot, at: Point) -> Result<SigFill> {
        let shifted = parse::tab_shift_point(&buffer.text, at);
        let lines = self
            .run_plan(
                QueueCategory::TypeInfo,
                CommandPlan {
                    command: "sig",
                    interactive: true,
                    uri: Some(buffer.uri.clone()),
                    positional: vec![
                        (shifted.row + 1).to_string(),
                        (shifted.column + 1).to_string(),
                    ],
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                    ..Default::default()
                },
            )
            .await?;
        if lines.len() < 2 {
            return Err(BackendError::OutputParse {
                message: format!("sig produced {} line(s), expected at least 2", lines.len()),
            });
        }
        let kind = lines[0].clone();
        let spans = self.unshift_spans(buffer, parse_span_output(&lines[1..]));
        let first = spans.into_iter().next().ok_or_else(|| {
            BackendError::OutputParse {
                message: "sig produced no span record".to_string(),
            }
        })?;
        Ok(SigFill {
            kind,
            span: first.span,
            body: first.text,
        })
    }

    /// Modules a symbol at a point is imported from (experimental)
    pub async fn imported_from(
        &self,
        buffer: &BufferSnapshot,
        at: Point,
        symbol: &str,
    ) -> Result<Vec<String>> {
        if !self.capabilities.imported_from {
            return Ok(Vec::new());
        }
        let shifted = parse::tab_shift_point(&buffer.text, at);
        let lines = self
            .run_plan(
                QueueCategory::FindRefs,
                CommandPlan {
                    command: "imported-from",
                    interactive: true,
                    uri: Some(buffer.uri.clone()),
                    positional: vec![
                        (shifted.row + 1).to_string(),
                        (shifted.column + 1).to_string(),
                        symbol.to_string(),
                    ],
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(lines.into_iter().filter(|line| !line.is_empty()).collect())
    }

    /// Compile diagnostics for a buffer
    pub async fn check(&self, buffer: &BufferSnapshot) -> Result<Vec<Diagnostic>> {
        let lines = self
            .run_plan(
                QueueCategory::CheckLint,
                CommandPlan {
                    command: "check",
                    interactive: true,
                    uri: Some(buffer.uri.clone()),
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                    ..Default::default()
                },
            )
            .await?;
        Ok(self.collect_diagnostics(&lines, CheckMode::Check, "check"))
    }

    /// Style hints for a buffer
    pub async fn lint(&self, buffer: &BufferSnapshot) -> Result<Vec<Diagnostic>> {
        let result = self
            .run_plan(
                QueueCategory::CheckLint,
                CommandPlan {
                    command: "lint",
                    interactive: true,
                    uri: Some(buffer.uri.clone()),
                    buffer_map: buffer.modified.then(|| buffer.text.clone()),
                    ..Default::default()
                },
            )
            .await;
        match result {
            Ok(lines) => Ok(self.collect_diagnostics(&lines, CheckMode::Lint, "lint")),
            // delinting literate sources reports its failure as FILE:LINE: MESSAGE
            Err(BackendError::Tool { message }) => {
                match parse::diagnostics::delint_message(&message) {
                    Some(diagnostic) => Ok(vec![diagnostic]),
                    None => Err(BackendError::Tool { message }),
                }
            }
            Err(other) => Err(other),
        }
    }

    /// Check and lint concurrently, merged
    pub async fn check_and_lint(&self, buffer: &BufferSnapshot) -> Result<Vec<Diagnostic>> {
        let (check, lint) = tokio::join!(self.check(buffer), self.lint(buffer));
        let mut diagnostics = check?;
        diagnostics.extend(lint?);
        Ok(diagnostics)
    }

    /// Kill the interactive process; the next request respawns it
    pub async fn shutdown_process(&self) {
        if let Some(process) = self.process.lock().await.take() {
            process.kill().await;
        }
    }

    /// Kill the process and drop every per-root cache
    pub async fn destroy(&self) {
        self.shutdown_process().await;
        *self.module_list.lock().await = None;
        *self.pragmas.lock().await = None;
        *self.flags.lock().await = None;
        debug!(root = %self.options.root_dir.display(), "Backend destroyed");
    }

    fn collect_diagnostics(
        &self,
        lines: &[String],
        mode: CheckMode,
        command: &'static str,
    ) -> Vec<Diagnostic> {
        let parsed = parse_check_lines(lines, mode);
        for (severity, message) in parsed.messages {
            match severity {
                Severity::Error => self.events.emit(BackendEvent::Error {
                    context: ErrorContext {
                        command: command.to_string(),
                        args: Vec::new(),
                        capabilities: self.capabilities,
                        message,
                    },
                }),
                _ => self.events.emit(BackendEvent::Warning { message }),
            }
        }
        parsed.diagnostics
    }

    fn unshift_spans(&self, buffer: &BufferSnapshot, spans: Vec<SpanText>) -> Vec<SpanText> {
        spans
            .into_iter()
            .map(|span_text| SpanText {
                span: Span::new(
                    parse::tab_unshift_point(&buffer.text, span_text.span.start),
                    parse::tab_unshift_point(&buffer.text, span_text.span.end),
                ),
                text: span_text.text,
            })
            .collect()
    }

    /// Queue, resolve settings, dispatch, and report errors at the boundary
    async fn run_plan(
        &self,
        category: QueueCategory,
        plan: CommandPlan,
    ) -> Result<Vec<String>> {
        let result = self
            .queues
            .run(category, async {
                let settings = settings::load_merged(
                    settings::global_settings_path().as_deref(),
                    &self.options.project_dir,
                    &self.options.root_dir,
                    &self.notifier,
                )
                .await?;
                if settings.disabled() {
                    return Err(BackendError::Disabled);
                }
                self.dispatch(&plan, &settings).await
            })
            .await;

        if let Err(ref e) = result {
            match e {
                BackendError::Disabled => {
                    debug!(command = plan.command, "Request disabled by settings")
                }
                _ => error!(
                    command = plan.command,
                    root = %self.options.root_dir.display(),
                    error = %e,
                    "Backend request failed"
                ),
            }
        }
        result
    }

    async fn dispatch(&self, plan: &CommandPlan, settings: &Settings) -> Result<Vec<String>> {
        let tool_args = self.tool_args(settings);
        if self.options.interactive && plan.interactive {
            self.run_interactive(plan, settings, &tool_args).await
        } else {
            self.run_single(plan, settings, &tool_args).await
        }
    }

    /// Dash arguments shared by every invocation: ghc-mod options from
    /// settings, build-tool detection overrides, and ghc option pairs
    fn tool_args(&self, settings: &Settings) -> Vec<String> {
        let mut args: Vec<String> = settings.effective_ghc_mod_options().to_vec();
        match self.options.build_tool {
            // building with one tool disables the other's detection
            BuildTool::Cabal => args.extend(["--with-stack".to_string(), String::new()]),
            BuildTool::Stack => args.extend(["--with-cabal".to_string(), String::new()]),
            BuildTool::None => args.extend([
                "--with-stack".to_string(),
                String::new(),
                "--with-cabal".to_string(),
                String::new(),
            ]),
        }
        for option in settings.effective_ghc_options() {
            args.push("--ghc-option".to_string());
            args.push(option.clone());
        }
        args
    }

    async fn run_interactive(
        &self,
        plan: &CommandPlan,
        settings: &Settings,
        tool_args: &[String],
    ) -> Result<Vec<String>> {
        let config = self.interactive_config(tool_args);
        let process = self.ensure_process(config).await;

        let uri = plan.uri.as_ref().map(|p| p.to_string_lossy().into_owned());
        let mut args = plan.dash_args.clone();
        if let Some(ref uri) = uri {
            args.push(uri.clone());
        }
        args.extend(plan.positional.iter().cloned());

        let mapped = match (&plan.buffer_map, &uri) {
            (Some(text), Some(uri)) => {
                process
                    .interact("map-file", std::slice::from_ref(uri), Some(text.as_str()))
                    .await
                    .map_err(|e| self.interactive_error("map-file", &[uri.clone()], settings, e))?;
                true
            }
            _ => false,
        };

        let result = process.interact(plan.command, &args, None).await;
        if mapped && result.is_ok() {
            if let Some(ref uri) = uri {
                // unmapping failure leaves a stale mapping; the next crash
                // or respawn clears it
                let _ = process.interact("unmap-file", std::slice::from_ref(uri), None).await;
            }
        }

        let interaction =
            result.map_err(|e| self.interactive_error(plan.command, &args, settings, e))?;
        if !interaction.stderr.is_empty() {
            self.events.emit(BackendEvent::Warning {
                message: interaction.stderr.join("\n"),
            });
        }
        Ok(interaction.stdout)
    }

    fn interactive_config(&self, tool_args: &[String]) -> SpawnConfig {
        let mut args = tool_args.to_vec();
        args.push("legacy-interactive".to_string());
        let mut config = SpawnConfig::new(&self.options.tool_path)
            .args(args)
            .working_dir(&self.options.root_dir)
            .quote_args(self.capabilities.quote_args)
            .interaction_timeout_secs(self.options.interaction_timeout_secs)
            .memory_limit_mb(self.options.memory_limit_mb)
            .idle_kill_minutes(self.options.idle_kill_minutes);
        for (key, value) in &self.env {
            config = config.env(key, value);
        }
        config
    }

    /// Reuse the live process when its spawn options still match;
    /// otherwise kill and respawn lazily
    async fn ensure_process(&self, config: SpawnConfig) -> Arc<InteractiveProcess> {
        let mut guard = self.process.lock().await;
        if let Some(process) = guard.as_ref() {
            if *process.config() == config {
                return Arc::clone(process);
            }
            let stale = Arc::clone(process);
            stale.kill().await;
            debug!("Interactive process options changed, respawning");
        }
        let process = Arc::new(InteractiveProcess::new(config));
        *guard = Some(Arc::clone(&process));
        process
    }

    fn interactive_error(
        &self,
        command: &str,
        args: &[String],
        settings: &Settings,
        source: ProcessError,
    ) -> BackendError {
        let error = match source {
            ProcessError::Crashed {
                reason,
                stderr,
                ..
            } => BackendError::Crashed {
                command: command.to_string(),
                args: args.to_vec(),
                capabilities: self.capabilities,
                message: if stderr.is_empty() {
                    reason
                } else {
                    format!("{reason}: {}", stderr.join("\n"))
                },
            },
            ProcessError::Timeout { seconds } => BackendError::Timeout {
                command: command.to_string(),
                args: args.to_vec(),
                capabilities: self.capabilities,
                seconds,
            },
            other => return BackendError::Process(other),
        };
        if !settings.suppresses_errors() {
            let (message, args) = match &error {
                BackendError::Crashed { message, args, .. } => (message.clone(), args.clone()),
                BackendError::Timeout { seconds, args, .. } => {
                    (format!("timed out after {seconds}s"), args.clone())
                }
                _ => (error.to_string(), Vec::new()),
            };
            self.events.emit(BackendEvent::Error {
                context: ErrorContext {
                    command: command.to_string(),
                    args,
                    capabilities: self.capabilities,
                    message,
                },
            });
        }
        error
    }

    async fn run_single(
        &self,
        plan: &CommandPlan,
        _settings: &Settings,
        tool_args: &[String],
    ) -> Result<Vec<String>> {
        let mut args = tool_args.to_vec();
        let uri = plan.uri.as_ref().map(|p| p.to_string_lossy().into_owned());

        // Modified buffers are mapped per-call when the tool supports it;
        // otherwise the content goes through a temp file whose path is
        // rewritten back to the logical uri afterwards.
        let mut input = None;
        let mut temp_file = None;
        let mut target = uri.clone();
        if let (Some(text), Some(uri)) = (&plan.buffer_map, &uri) {
            if self.capabilities.file_map {
                args.push("--map-file".to_string());
                args.push(uri.clone());
                input = Some(format!("{text}\u{4}\n"));
            } else {
                let file = tempfile::Builder::new()
                    .prefix("haskmate-")
                    .suffix(".hs")
                    .tempfile_in(&self.options.root_dir)?;
                std::fs::write(file.path(), text)?;
                target = Some(file.path().to_string_lossy().into_owned());
                temp_file = Some(file);
            }
        }

        args.push(plan.command.to_string());
        args.extend(plan.dash_args.iter().cloned());
        if let Some(ref target) = target {
            args.push(target.clone());
        }
        args.extend(plan.positional.iter().cloned());

        let mut config = SpawnConfig::new(&self.options.tool_path)
            .args(args)
            .working_dir(&self.options.root_dir)
            .interaction_timeout_secs(self.options.interaction_timeout_secs);
        for (key, value) in &self.env {
            config = config.env(key, value);
        }

        let output = run_oneshot(&config, input.as_deref()).await?;
        if !output.success() {
            return Err(BackendError::Tool {
                message: if output.stderr.is_empty() {
                    format!("{} exited with {}", plan.command, output.status)
                } else {
                    output.stderr.join("\n")
                },
            });
        }
        if !output.stderr.is_empty() {
            self.events.emit(BackendEvent::Warning {
                message: output.stderr.join("\n"),
            });
        }

        let stdout = match (temp_file, &uri) {
            (Some(file), Some(uri)) => {
                let temp_path = file.path().to_string_lossy().into_owned();
                output
                    .stdout
                    .into_iter()
                    .map(|line| line.replace(&temp_path, uri))
                    .collect()
            }
            _ => output.stdout,
        };
        Ok(stdout)
    }
}
