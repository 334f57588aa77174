//! Error types for constructing ECL syntax trees.

use thiserror::Error;

/// Errors raised when building syntax tree values from untrusted input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EclError {
    /// Cardinality whose lower bound exceeds its upper bound.
    #[error("invalid cardinality [{min}..{max}]: minimum exceeds maximum")]
    InvalidCardinality {
        /// Requested minimum.
        min: usize,
        /// Requested maximum.
        max: usize,
    },
}

/// Result type for ECL operations.
pub type EclResult<T> = std::result::Result<T, EclError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_cardinality_display() {
        let err = EclError::InvalidCardinality { min: 3, max: 1 };
        assert_eq!(
            err.to_string(),
            "invalid cardinality [3..1]: minimum exceeds maximum"
        );
    }
}
