//! One module's lazily-populated symbol table

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;
use tracing::debug;

use haskmate_backend::{Backend, SymbolDescriptor, SymbolKind};

use crate::error::Result;
use crate::imports::ImportDescriptor;

type FetchFuture = Shared<BoxFuture<'static, std::result::Result<(), Arc<haskmate_backend::BackendError>>>>;

/// One completion row emitted by [`ModuleInfo::select`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionSymbol {
    /// Presentation name: qualified (`Alias.name`) or plain
    pub qname: String,
    /// Parent under the same qualification, when the symbol has one
    pub qparent: Option<String>,
    pub symbol: SymbolDescriptor,
}

/// Exported symbol table of one module for one project root.
///
/// Population is single-flight: concurrent callers share the in-flight
/// fetch, and callers always await the latest fetch before reading.
pub struct ModuleInfo {
    name: String,
    backend: Arc<Backend>,
    symbols: RwLock<Arc<Vec<SymbolDescriptor>>>,
    in_flight: Mutex<Option<FetchFuture>>,
    /// Buffers currently believed to implement this module
    buffers: Mutex<HashSet<PathBuf>>,
    last_access: Mutex<Instant>,
}

impl ModuleInfo {
    /// Create and immediately start the first population fetch
    pub fn new(backend: Arc<Backend>, name: impl Into<String>) -> Arc<Self> {
        let info = Arc::new(Self {
            name: name.into(),
            backend,
            symbols: RwLock::new(Arc::new(Vec::new())),
            in_flight: Mutex::new(None),
            buffers: Mutex::new(HashSet::new()),
            last_access: Mutex::new(Instant::now()),
        });
        info.refetch();
        info
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start a fresh population fetch, superseding any in-flight one
    pub fn refetch(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let fetch = async move {
            let symbols = this
                .backend
                .browse(std::slice::from_ref(&this.name))
                .await
                .map_err(Arc::new)?;
            debug!(module = %this.name, count = symbols.len(), "Populated symbol table");
            *this.symbols.write().unwrap() = Arc::new(symbols);
            Ok(())
        }
        .boxed()
        .shared();
        // drive the fetch even when nobody selects yet
        tokio::spawn(fetch.clone());
        *self.in_flight.lock().unwrap() = Some(fetch);
    }

    /// Await the latest fetch's completion
    async fn synced(&self) -> Result<()> {
        let fetch = self.in_flight.lock().unwrap().clone();
        if let Some(fetch) = fetch {
            fetch.await?;
        }
        Ok(())
    }

    /// Filter this module's symbols through an import and emit completion
    /// rows: a qualified form unless skipped, an unqualified form unless
    /// the import is qualified.
    pub async fn select(
        &self,
        import: &ImportDescriptor,
        kind_filter: Option<SymbolKind>,
        skip_qualified: bool,
    ) -> Result<Vec<CompletionSymbol>> {
        self.synced().await?;
        *self.last_access.lock().unwrap() = Instant::now();

        let symbols: Arc<Vec<SymbolDescriptor>> = self.symbols.read().unwrap().clone();
        let qualifier = import.qualifier();
        let mut rows = Vec::new();
        for symbol in symbols.iter() {
            if !import.visible(symbol) {
                continue;
            }
            if let Some(kind) = kind_filter {
                if symbol.kind != kind {
                    continue;
                }
            }
            if !skip_qualified {
                rows.push(CompletionSymbol {
                    qname: format!("{qualifier}.{}", symbol.name),
                    qparent: symbol
                        .parent
                        .as_ref()
                        .map(|parent| format!("{qualifier}.{parent}")),
                    symbol: symbol.clone(),
                });
            }
            if !import.qualified {
                rows.push(CompletionSymbol {
                    qname: symbol.name.clone(),
                    qparent: symbol.parent.clone(),
                    symbol: symbol.clone(),
                });
            }
        }
        Ok(rows)
    }

    /// Associate a buffer with this module; registering the same buffer
    /// twice is a no-op
    pub fn add_buffer(&self, uri: impl Into<PathBuf>) {
        self.buffers.lock().unwrap().insert(uri.into());
    }

    pub fn remove_buffer(&self, uri: &Path) {
        self.buffers.lock().unwrap().remove(uri);
    }

    pub fn has_buffer(&self, uri: &Path) -> bool {
        self.buffers.lock().unwrap().contains(uri)
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.lock().unwrap().len()
    }

    /// Monotonic instant of the last `select`
    pub fn last_access(&self) -> Instant {
        *self.last_access.lock().unwrap()
    }
}
