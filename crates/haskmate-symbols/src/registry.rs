//! Root-keyed symbol registry
//!
//! Explicit ownership of every per-root module table and buffer record:
//! lookup is by module name and buffer path, eviction is an explicit idle
//! sweep, and teardown is an explicit `destroy`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use haskmate_backend::{Backend, SymbolKind};

use crate::buffer_info::BufferInfo;
use crate::error::Result;
use crate::imports::{HeaderModuleParser, ImportDescriptor, ModuleParser};
use crate::module_info::{CompletionSymbol, ModuleInfo};

/// Module tables idle longer than this are evicted
const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

type EvictionHook = Box<dyn Fn(&str) + Send + Sync>;

/// Per-root map of module symbol tables and open-buffer metadata
pub struct SymbolRegistry {
    backend: Arc<Backend>,
    parser: Arc<dyn ModuleParser>,
    modules: Mutex<HashMap<String, Arc<ModuleInfo>>>,
    buffers: Mutex<HashMap<PathBuf, Arc<BufferInfo>>>,
    idle_ttl: Duration,
    on_evict: StdMutex<Option<EvictionHook>>,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl SymbolRegistry {
    /// Registry with the standard eviction timing
    pub fn new(backend: Arc<Backend>) -> Arc<Self> {
        Self::with_timing(backend, DEFAULT_IDLE_TTL, DEFAULT_SWEEP_INTERVAL)
    }

    /// Registry with explicit eviction timing
    pub fn with_timing(
        backend: Arc<Backend>,
        idle_ttl: Duration,
        sweep_interval: Duration,
    ) -> Arc<Self> {
        let registry = Arc::new(Self {
            backend,
            parser: Arc::new(HeaderModuleParser),
            modules: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
            idle_ttl,
            on_evict: StdMutex::new(None),
            sweeper: StdMutex::new(None),
        });
        registry.start_sweeper(sweep_interval);
        registry
    }

    /// Called with the module name whenever an idle table is evicted
    pub fn set_eviction_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_evict.lock().unwrap() = Some(Box::new(hook));
    }

    /// Track an open buffer: resolve its module and associate the buffer
    /// with it. Registering the same buffer repeatedly is a no-op.
    pub async fn register_buffer(&self, uri: impl Into<PathBuf>, text: &str) {
        let uri = uri.into();
        let buffer = self.buffer_info(&uri).await;
        if let Some(name) = buffer.module_name(text) {
            let module = self.module(&name).await;
            module.add_buffer(&uri);
        }
    }

    /// A buffer was saved: re-fetch every module it implements and pick
    /// up a renamed module header
    pub async fn buffer_saved(&self, uri: &Path, text: &str) {
        let buffer = self.buffer_info(uri).await;
        let current = buffer.module_name(text);
        {
            let modules = self.modules.lock().await;
            for (name, module) in modules.iter() {
                if !module.has_buffer(uri) {
                    continue;
                }
                if current.as_deref() == Some(name) {
                    module.refetch();
                } else {
                    module.remove_buffer(uri);
                }
            }
        }
        self.register_buffer(uri, text).await;
    }

    /// A buffer was destroyed: drop its record and every association
    pub async fn remove_buffer(&self, uri: &Path) {
        self.buffers.lock().await.remove(uri);
        let modules = self.modules.lock().await;
        for module in modules.values() {
            module.remove_buffer(uri);
        }
    }

    /// Imports of a buffer, including the synthetic Prelude import
    pub async fn imports_of(&self, uri: &Path, text: &str) -> Vec<ImportDescriptor> {
        self.buffer_info(uri).await.imports(text)
    }

    /// Select completion rows from the module an import names
    pub async fn select(
        &self,
        import: &ImportDescriptor,
        kind_filter: Option<SymbolKind>,
        skip_qualified: bool,
    ) -> Result<Vec<CompletionSymbol>> {
        let module = self.module(&import.module).await;
        module.select(import, kind_filter, skip_qualified).await
    }

    /// Completion rows merged over every import of a buffer
    pub async fn select_for_buffer(
        &self,
        uri: &Path,
        text: &str,
        kind_filter: Option<SymbolKind>,
    ) -> Result<Vec<CompletionSymbol>> {
        let mut rows = Vec::new();
        for import in self.imports_of(uri, text).await {
            rows.extend(self.select(&import, kind_filter, false).await?);
        }
        Ok(rows)
    }

    /// The module table for `name`, created (and populated) on first use
    pub async fn module(&self, name: &str) -> Arc<ModuleInfo> {
        let mut modules = self.modules.lock().await;
        if let Some(module) = modules.get(name) {
            return Arc::clone(module);
        }
        let module = ModuleInfo::new(Arc::clone(&self.backend), name);
        modules.insert(name.to_string(), Arc::clone(&module));
        debug!(module = name, "Created module symbol table");
        module
    }

    /// Number of live module tables
    pub async fn module_count(&self) -> usize {
        self.modules.lock().await.len()
    }

    pub async fn has_module(&self, name: &str) -> bool {
        self.modules.lock().await.contains_key(name)
    }

    /// Stop the sweeper and drop all cached state
    pub async fn destroy(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
        self.modules.lock().await.clear();
        self.buffers.lock().await.clear();
    }

    async fn buffer_info(&self, uri: &Path) -> Arc<BufferInfo> {
        let mut buffers = self.buffers.lock().await;
        if let Some(buffer) = buffers.get(uri) {
            return Arc::clone(buffer);
        }
        let buffer = Arc::new(BufferInfo::new(Arc::clone(&self.parser)));
        buffers.insert(uri.to_path_buf(), Arc::clone(&buffer));
        buffer
    }

    fn start_sweeper(self: &Arc<Self>, interval: Duration) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(registry) = weak.upgrade() else {
                    return;
                };
                registry.sweep().await;
            }
        });
        *self.sweeper.lock().unwrap() = Some(handle);
    }

    async fn sweep(&self) {
        let mut evicted = Vec::new();
        {
            let mut modules = self.modules.lock().await;
            modules.retain(|name, module| {
                if module.last_access().elapsed() < self.idle_ttl {
                    return true;
                }
                evicted.push(name.clone());
                false
            });
        }
        if evicted.is_empty() {
            return;
        }
        info!(modules = ?evicted, "Evicted idle module symbol tables");
        let hook = self.on_evict.lock().unwrap();
        if let Some(hook) = hook.as_ref() {
            for name in &evicted {
                hook(name);
            }
        }
    }
}

impl Drop for SymbolRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }
}
