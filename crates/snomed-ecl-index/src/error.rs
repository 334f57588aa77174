//! Error types reported by search collaborators.

use thiserror::Error;

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while answering a search request.
///
/// Errors are `Clone` so that one failed search can be reported to every
/// caller waiting on a shared result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The backend could not be reached or refused the request.
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    /// The query cannot be executed, e.g. an invalid regular expression.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Any other backend failure.
    #[error("search failed: {0}")]
    Internal(String),
}

impl IndexError {
    /// Creates an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery(message.into())
    }
}
