//! Error types for ECL evaluation.

use std::time::Duration;

use snomed_ecl_index::IndexError;
use thiserror::Error;

/// Errors that can occur during ECL evaluation.
///
/// Errors are `Clone` because a resolution is shared by every caller
/// waiting on it, and all of them receive the same failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A grammar construct the evaluator does not handle.
    #[error("unsupported ECL feature {kind} in `{expression}`")]
    UnsupportedFeature {
        /// Kind of the offending node.
        kind: String,
        /// ECL text of the offending node.
        expression: String,
    },

    /// A refinement combining constructs ECL does not define together,
    /// e.g. a reversed attribute with a concrete value comparison.
    #[error("invalid refinement `{expression}`: {reason}")]
    InvalidRefinementCombination {
        /// What is wrong with the refinement.
        reason: String,
        /// ECL text of the refinement.
        expression: String,
    },

    /// A filter that is inconsistent with its domain or has an invalid value.
    #[error("invalid filter `{expression}`: {reason}")]
    InvalidFilter {
        /// What is wrong with the filter.
        reason: String,
        /// ECL text of the filter.
        expression: String,
    },

    /// A search collaborator failed. Callers may retry.
    #[error("search backend failure: {0}")]
    Backend(#[from] IndexError),

    /// A bounded wait exceeded its budget.
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// The configured budget.
        after: Duration,
        /// What was being waited for.
        stage: String,
    },
}

impl EvalError {
    pub(crate) fn unsupported(kind: impl Into<String>, expression: impl ToString) -> Self {
        Self::UnsupportedFeature {
            kind: kind.into(),
            expression: expression.to_string(),
        }
    }

    pub(crate) fn invalid_refinement(reason: impl Into<String>, expression: impl ToString) -> Self {
        Self::InvalidRefinementCombination {
            reason: reason.into(),
            expression: expression.to_string(),
        }
    }

    pub(crate) fn invalid_filter(reason: impl Into<String>, expression: impl ToString) -> Self {
        Self::InvalidFilter {
            reason: reason.into(),
            expression: expression.to_string(),
        }
    }

    /// Returns true for deterministic errors caused by the expression itself.
    /// Retrying such an evaluation yields the same error.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            EvalError::UnsupportedFeature { .. }
                | EvalError::InvalidRefinementCombination { .. }
                | EvalError::InvalidFilter { .. }
        )
    }
}

/// Result type for evaluator operations.
pub type EvalResult<T> = std::result::Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_unsupported_feature() {
        let err = EvalError::unsupported("nested attribute group", "{ { 1 = 2 } }");
        assert_eq!(
            err.to_string(),
            "unsupported ECL feature nested attribute group in `{ { 1 = 2 } }`"
        );
    }

    #[test]
    fn test_error_display_invalid_filter() {
        let err = EvalError::invalid_filter("language code must be two lowercase letters", "language = EN");
        assert_eq!(
            err.to_string(),
            "invalid filter `language = EN`: language code must be two lowercase letters"
        );
    }

    #[test]
    fn test_error_display_timeout() {
        let err = EvalError::Timeout {
            after: Duration::from_secs(30),
            stage: "evaluation".to_string(),
        };
        assert_eq!(err.to_string(), "evaluation timed out after 30s");
    }

    #[test]
    fn test_error_from_index_error() {
        let err: EvalError = IndexError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(err, EvalError::Backend(_)));
        assert!(!err.is_request_error());
        assert_eq!(
            err.to_string(),
            "search backend failure: search backend unavailable: connection refused"
        );
    }

    #[test]
    fn test_request_errors() {
        assert!(EvalError::invalid_refinement("reversed concrete value", "R 1 = #5").is_request_error());
    }
}
