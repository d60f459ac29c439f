//! Completion facade over the symbol registry and backend listings

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use haskmate_backend::{Backend, BackendError, SymbolKind};
use haskmate_symbols::{CompletionSymbol, SymbolRegistry, SymbolsError};

use crate::fuzzy::{self, KeyFn};
use crate::hole;

/// Completion errors
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Symbols(#[from] SymbolsError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Result type for completion queries
pub type Result<T> = std::result::Result<T, CompletionError>;

/// Candidate sets for one project root, ranked at query time
pub struct CompletionFacade {
    registry: Arc<SymbolRegistry>,
    backend: Arc<Backend>,
}

impl CompletionFacade {
    pub fn new(registry: Arc<SymbolRegistry>, backend: Arc<Backend>) -> Self {
        Self { registry, backend }
    }

    /// Symbols visible in a buffer, matched on qualified name or
    /// qualified parent
    pub async fn for_symbol(
        &self,
        uri: &Path,
        text: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionSymbol>> {
        let rows = self.registry.select_for_buffer(uri, text, None).await?;
        Ok(fuzzy::rank(rows, prefix, SYMBOL_KEYS))
    }

    /// Types visible in a buffer, matched on qualified name
    pub async fn for_type(
        &self,
        uri: &Path,
        text: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionSymbol>> {
        let rows = self
            .registry
            .select_for_buffer(uri, text, Some(SymbolKind::Type))
            .await?;
        Ok(fuzzy::rank(rows, prefix, NAME_KEY))
    }

    /// Classes visible in a buffer, matched on qualified name
    pub async fn for_class(
        &self,
        uri: &Path,
        text: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionSymbol>> {
        let rows = self
            .registry
            .select_for_buffer(uri, text, Some(SymbolKind::Class))
            .await?;
        Ok(fuzzy::rank(rows, prefix, NAME_KEY))
    }

    /// Module names known to the root
    pub async fn for_module(&self, prefix: &str) -> Result<Vec<String>> {
        let modules = self.backend.list_modules().await?;
        Ok(rank_plain(modules.as_ref().clone(), prefix))
    }

    /// Language pragmas
    pub async fn for_pragma(&self, prefix: &str) -> Result<Vec<String>> {
        let pragmas = self.backend.language_pragmas().await?;
        Ok(rank_plain(pragmas.as_ref().clone(), prefix))
    }

    /// Compiler options
    pub async fn for_compiler_option(&self, prefix: &str) -> Result<Vec<String>> {
        let flags = self.backend.compiler_flags().await?;
        Ok(rank_plain(flags.as_ref().clone(), prefix))
    }

    /// Symbols whose return type can fill a hole of the inferred type.
    ///
    /// With an empty prefix, candidates order by similarity of their
    /// signature to the inferred type instead of prefix score.
    pub async fn for_hole(
        &self,
        uri: &Path,
        text: &str,
        inferred_type: &str,
        prefix: &str,
    ) -> Result<Vec<CompletionSymbol>> {
        let rows = self.registry.select_for_buffer(uri, text, None).await?;
        let mut candidates: Vec<CompletionSymbol> = rows
            .into_iter()
            .filter(|row| {
                row.symbol
                    .signature
                    .as_deref()
                    .map(hole::return_type)
                    .is_some_and(|ret| hole::unifiable(ret, inferred_type))
            })
            .collect();

        if prefix.is_empty() {
            candidates.sort_by_key(|row| {
                std::cmp::Reverse(
                    row.symbol
                        .signature
                        .as_deref()
                        .map(|sig| fuzzy::similarity(sig, inferred_type))
                        .unwrap_or(0),
                )
            });
            Ok(candidates)
        } else {
            Ok(fuzzy::rank(candidates, prefix, NAME_KEY))
        }
    }
}

const SYMBOL_KEYS: &[KeyFn<CompletionSymbol>] = &[
    |row| Some(row.qname.as_str()),
    |row| row.qparent.as_deref(),
];

const NAME_KEY: &[KeyFn<CompletionSymbol>] = &[|row| Some(row.qname.as_str())];

const PLAIN_KEY: &[KeyFn<String>] = &[|item| Some(item.as_str())];

fn rank_plain(items: Vec<String>, prefix: &str) -> Vec<String> {
    fuzzy::rank(items, prefix, PLAIN_KEY)
}
