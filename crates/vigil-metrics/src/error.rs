//! Error types for the vigil-metrics crate.

use thiserror::Error;

/// Errors returned by a query backend.
///
/// Cancellation and deadline expiry are reported through the same type as
/// backend failures so callers can treat them uniformly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The evaluation context was cancelled before the query completed.
    #[error("query cancelled")]
    Cancelled,

    /// The evaluation deadline passed before the query completed.
    #[error("query deadline exceeded")]
    DeadlineExceeded,

    /// The backend rejected or failed to execute the query.
    #[error("backend error: {reason}")]
    Backend {
        /// The reason reported by the backend.
        reason: String,
    },

    /// The expression could not be parsed by the backend.
    #[error("invalid expression: {reason}")]
    InvalidExpression {
        /// The reason the expression is invalid.
        reason: String,
    },

    /// The datasource type is not supported.
    #[error("unsupported datasource type: {name:?}")]
    UnsupportedDatasource {
        /// The rejected type name.
        name: String,
    },
}

impl QueryError {
    /// Creates a backend error from any displayable reason.
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }

    /// Returns true if the error came from cancellation or a deadline.
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }
}

/// Result type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
