//! Per-root ghc-mod backend for haskmate
//!
//! This crate is the single call-in point for analysis requests against a
//! Haskell project root. It owns:
//!
//! - **Lifecycle factory**: probes tool and compiler versions once per
//!   root, derives a capability set, optionally drives a rebuild, and
//!   produces a configured backend
//! - **Command router**: per-category bounded-concurrency queues, layered
//!   settings resolution, capability-gated command construction, dispatch
//!   to the interactive process or a one-shot invocation, and parsing of
//!   tool output into diagnostics, spans and symbols
//!
//! # Architecture
//!
//! ```text
//! editor glue ──▶ Backend (router) ──▶ queues ──▶ interactive process
//!                     │                              (haskmate-process)
//!                     ├─▶ settings (global → project → root-local)
//!                     ├─▶ parsers (browse / spans / diagnostics)
//!                     └─▶ events (active/idle, queue-idle, warn/error)
//! ```
//!
//! One `Backend` exists per project root, created by [`BackendFactory`];
//! roots never share processes or caches.

pub mod capabilities;
pub mod error;
pub mod events;
pub mod factory;
pub mod notify;
pub mod parse;
pub mod queue;
pub mod router;
pub mod settings;
pub mod types;
pub mod version;

pub use capabilities::Capabilities;
pub use error::{BackendError, Result};
pub use events::{BackendEvent, ErrorContext, EventChannel};
pub use factory::{BackendFactory, BackendOptions, BuildTool};
pub use notify::{LogNotifier, Notifier};
pub use queue::{CommandQueues, QueueCategory};
pub use router::Backend;
pub use settings::Settings;
pub use types::{
    BufferSnapshot, Diagnostic, Point, Severity, SigFill, Span, SpanText, SymbolDescriptor,
    SymbolKind,
};
pub use version::ToolVersion;
