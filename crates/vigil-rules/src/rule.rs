//! The contract every rule variant implements.
//!
//! A group scheduler only ever holds `Arc<dyn Rule>`: it identifies rules by
//! [`Rule::id`], drives them with [`Rule::exec`] once per evaluation
//! interval, hot-reloads them with [`Rule::update_with`], and releases them
//! with [`Rule::close`]. Status endpoints read [`Rule::api`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use vigil_metrics::{EvalContext, TimeSeries};

use crate::error::Result;
use crate::recording::ApiRecordingRule;

/// Boxed future returned by [`Rule::exec`].
pub type ExecFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<TimeSeries>>> + Send + 'a>>;

/// A configured unit evaluated on a schedule.
///
/// Implementations must tolerate `exec`, `update_with`, `api` and their own
/// metrics callbacks being called concurrently from different tasks. The
/// scheduler never runs `exec` concurrently with itself on one rule.
pub trait Rule: Send + Sync + fmt::Debug + fmt::Display {
    /// Returns the rule ID, unique within the owning group.
    fn id(&self) -> u64;

    /// Returns the ID of the owning group.
    fn group_id(&self) -> u64;

    /// Returns the variant name, such as `"recording"`.
    fn kind(&self) -> &'static str;

    /// Evaluates the rule.
    ///
    /// With `series == false` the call returns an empty result without
    /// querying the backend or touching status.
    ///
    /// # Errors
    ///
    /// Returns the evaluation error, which is also recorded in status.
    fn exec<'a>(&'a self, ctx: &'a EvalContext, series: bool) -> ExecFuture<'a>;

    /// Copies the mutable configuration of `other` into this rule.
    ///
    /// Identity, status and metric registrations are preserved.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::TypeMismatch` if `other` is a different variant.
    fn update_with(&self, other: &dyn Rule) -> Result<()>;

    /// Returns a read-only snapshot for status endpoints.
    fn api(&self) -> ApiRule;

    /// Releases the rule's metric registrations.
    fn close(&self);

    /// Returns `self` for variant checks.
    fn as_any(&self) -> &dyn Any;
}

/// API snapshot of any rule variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
#[non_exhaustive]
pub enum ApiRule {
    /// Snapshot of a recording rule.
    Recording(ApiRecordingRule),
}

impl ApiRule {
    /// Returns the recording snapshot, if this is one.
    #[must_use]
    pub const fn as_recording(&self) -> Option<&ApiRecordingRule> {
        match self {
            Self::Recording(r) => Some(r),
        }
    }

    /// Returns the rule name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Recording(r) => &r.name,
        }
    }

    /// Returns the last error message; empty when healthy.
    #[must_use]
    pub fn last_error(&self) -> &str {
        match self {
            Self::Recording(r) => &r.last_error,
        }
    }
}
