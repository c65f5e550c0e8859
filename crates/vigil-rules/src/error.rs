//! Error types for the vigil-rules crate.

use thiserror::Error;
use vigil_metrics::QueryError;

/// Errors that can occur while configuring, evaluating or updating rules.
///
/// The type is `Clone` so the error of an evaluation can be latched into
/// rule status and returned to the caller at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    /// The query backend failed, was cancelled or timed out.
    #[error("failed to execute query {expr:?}: {source}")]
    Query {
        /// The expression that failed.
        expr: String,
        /// The backend error.
        source: QueryError,
    },

    /// Two generated series ended up with the same label set.
    #[error(
        "original metric {metric}; resulting labels {labels:?}: result contains metrics with the same labelset after applying rule labels"
    )]
    DuplicateSeries {
        /// The query result that produced the colliding series.
        metric: String,
        /// The canonical key of the colliding label set.
        labels: String,
    },

    /// A rule was asked to absorb the configuration of a different variant.
    #[error("BUG: attempt to update {expected} rule with wrong type: {found}")]
    TypeMismatch {
        /// The variant of the receiving rule.
        expected: &'static str,
        /// Description of the rule that was passed in.
        found: String,
    },

    /// The rule configuration is invalid.
    #[error("invalid rule config: {reason}")]
    InvalidConfig {
        /// The reason the configuration is invalid.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RuleError {
    /// Returns true for the duplicate-series guard.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateSeries { .. })
    }

    /// Returns true if the error came from the query backend.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Self::Query { .. })
    }
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
