//! Error types for search operations

use crate::error::AppError;

/// Result type for search operations
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Errors that can occur during search operations.
///
/// Every variant is a failure; an empty result set is `Ok` with no hits.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Index initialization failed
    #[error("Index initialization failed: {0}")]
    IndexInitFailed(String),

    /// Index not found
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Query shape the backend cannot execute
    #[error("Unsupported query: {0}")]
    UnsupportedQuery(String),

    /// Search execution failed
    #[error("Search execution failed: {0}")]
    SearchFailed(String),

    /// Backend unreachable
    #[error("Search backend unavailable: {0}")]
    Unavailable(String),

    /// Document indexing failed
    #[error("Document indexing failed: {0}")]
    IndexingFailed(String),

    /// Hit could not be turned into a matched item
    #[error("Failed to unpack hit {id}: {reason}")]
    Unpack { id: String, reason: String },

    /// Schema error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Tantivy error
    #[error("Tantivy error: {0}")]
    TantivyError(String),
}

impl From<tantivy::TantivyError> for SearchError {
    fn from(err: tantivy::TantivyError) -> Self {
        SearchError::TantivyError(err.to_string())
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::IndexNotFound(msg) => AppError::NotFound(msg),
            SearchError::IoError(err) => AppError::Io(err),
            _ => AppError::Search(err.to_string()),
        }
    }
}
