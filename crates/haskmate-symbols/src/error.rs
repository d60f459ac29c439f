//! Error types for the symbol cache

use std::sync::Arc;
use thiserror::Error;

use haskmate_backend::BackendError;

/// Symbol cache errors
///
/// Backend failures are shared between every caller awaiting the same
/// population fetch, hence the `Arc`.
#[derive(Debug, Clone, Error)]
pub enum SymbolsError {
    /// The underlying browse/list invocation failed
    #[error("{0}")]
    Backend(Arc<BackendError>),
}

impl From<Arc<BackendError>> for SymbolsError {
    fn from(source: Arc<BackendError>) -> Self {
        SymbolsError::Backend(source)
    }
}

impl From<BackendError> for SymbolsError {
    fn from(source: BackendError) -> Self {
        SymbolsError::Backend(Arc::new(source))
    }
}

/// Result type for symbol cache operations
pub type Result<T> = std::result::Result<T, SymbolsError>;
