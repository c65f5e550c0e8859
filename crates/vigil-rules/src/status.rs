//! Execution status shared by a rule's evaluator, metrics and API readers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::error::RuleError;

/// Outcome of the most recent evaluation.
///
/// All fields describe the same evaluation; they are only ever written
/// together under the status lock.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecState {
    /// When the last evaluation finished its query. `None` before the first run.
    pub time: Option<DateTime<Utc>>,
    /// Error of the last evaluation; `None` means healthy.
    pub error: Option<RuleError>,
    /// Number of series produced by the last evaluation.
    pub samples: usize,
    /// Wall time spent in the last evaluation's query.
    pub duration: Duration,
}

impl ExecState {
    /// Returns true if the last evaluation succeeded (or none ran yet).
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.error.is_none()
    }
}

/// Lock-guarded [`ExecState`].
#[derive(Debug, Default)]
pub struct RuleStatus {
    state: RwLock<ExecState>,
}

impl RuleStatus {
    /// Creates an empty status.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a consistent copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ExecState {
        self.state.read().clone()
    }

    /// Returns 1.0 if the last evaluation failed, 0.0 otherwise.
    #[must_use]
    pub fn error_value(&self) -> f64 {
        if self.state.read().error.is_some() {
            1.0
        } else {
            0.0
        }
    }

    /// Returns the number of series produced by the last evaluation.
    #[must_use]
    pub fn last_samples(&self) -> usize {
        self.state.read().samples
    }

    /// Locks the state for an evaluation to record its outcome.
    pub(crate) fn lock(&self) -> RwLockWriteGuard<'_, ExecState> {
        self.state.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_status_is_healthy_and_unset() {
        let status = RuleStatus::new();
        let state = status.snapshot();
        assert!(state.is_healthy());
        assert!(state.time.is_none());
        assert_eq!(state.samples, 0);
        assert!(status.error_value().abs() < f64::EPSILON);
    }

    #[test]
    fn error_value_tracks_last_error() {
        let status = RuleStatus::new();
        {
            let mut state = status.lock();
            state.time = Some(Utc::now());
            state.error = Some(RuleError::InvalidConfig {
                reason: "x".to_string(),
            });
        }
        assert!((status.error_value() - 1.0).abs() < f64::EPSILON);
        assert!(!status.snapshot().is_healthy());

        status.lock().error = None;
        assert!(status.error_value().abs() < f64::EPSILON);
    }

    #[test]
    fn last_samples_reads_state() {
        let status = RuleStatus::new();
        status.lock().samples = 3;
        assert_eq!(status.last_samples(), 3);
    }
}
