//! # haskmate-symbols
//!
//! **Purpose**: per-root symbol cache for haskmate
//!
//! Maintains freshness and scope of module symbol tables and per-buffer
//! import metadata:
//!
//! - **ModuleInfo**: one module's exported symbols, populated lazily via
//!   the backend's browse command with single-flight semantics, re-fetched
//!   when an associated buffer is saved, evicted after thirty idle minutes
//! - **BufferInfo**: last parsed module name and import list per open
//!   buffer, skipped entirely when the buffer text is unchanged, with a
//!   synthetic `Prelude` import supplied when absent
//! - **SymbolRegistry**: the root-keyed owner of both, with explicit
//!   creation, eviction sweeps and teardown
//!
//! Symbol tables are always scoped to exactly one project root; a buffer
//! that belongs to a different root goes through that root's registry.

pub mod buffer_info;
pub mod error;
pub mod imports;
pub mod module_info;
pub mod registry;

pub use buffer_info::BufferInfo;
pub use error::{Result, SymbolsError};
pub use imports::{
    HeaderModuleParser, ImportDescriptor, ImportItem, ModuleParser, ParsedModule,
};
pub use module_info::{CompletionSymbol, ModuleInfo};
pub use registry::SymbolRegistry;
