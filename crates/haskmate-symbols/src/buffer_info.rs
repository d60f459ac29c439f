//! Per-buffer module metadata with a text-equality parse cache

use std::sync::{Arc, Mutex};

use crate::imports::{ImportDescriptor, ModuleParser, ParsedModule};

/// Wraps one open editor buffer: last parsed module name and import list,
/// re-parsed only when the buffer text actually changed
pub struct BufferInfo {
    parser: Arc<dyn ModuleParser>,
    cache: Mutex<Option<(String, ParsedModule)>>,
}

impl BufferInfo {
    pub fn new(parser: Arc<dyn ModuleParser>) -> Self {
        Self {
            parser,
            cache: Mutex::new(None),
        }
    }

    /// Module this buffer implements, if the header names one
    pub fn module_name(&self, text: &str) -> Option<String> {
        self.parsed(text).name
    }

    /// Imports of this buffer, with a synthetic unqualified `Prelude`
    /// import appended unless the source imports Prelude itself
    pub fn imports(&self, text: &str) -> Vec<ImportDescriptor> {
        let mut imports = self.parsed(text).imports;
        if !imports.iter().any(|import| import.module == "Prelude") {
            imports.push(ImportDescriptor::prelude());
        }
        imports
    }

    fn parsed(&self, text: &str) -> ParsedModule {
        let mut cache = self.cache.lock().unwrap();
        if let Some((cached_text, parsed)) = cache.as_ref() {
            if cached_text == text {
                return parsed.clone();
            }
        }
        let parsed = self.parser.parse(text);
        *cache = Some((text.to_string(), parsed.clone()));
        parsed
    }
}
