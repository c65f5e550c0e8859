//! Query backend interface.
//!
//! A [`QuerierBuilder`] produces a [`Querier`] bound to one backend type and
//! evaluation interval. Rules hold the bound querier and call it once per
//! evaluation cycle.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::types::Metric;

/// The kind of backend a rule's expression targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceType {
    /// PromQL / MetricsQL compatible backend.
    #[default]
    Prometheus,
    /// Graphite render API backend.
    Graphite,
}

impl DatasourceType {
    /// Returns the type as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Prometheus => "prometheus",
            Self::Graphite => "graphite",
        }
    }
}

impl fmt::Display for DatasourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasourceType {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "prometheus" => Ok(Self::Prometheus),
            "graphite" => Ok(Self::Graphite),
            other => Err(QueryError::UnsupportedDatasource {
                name: other.to_string(),
            }),
        }
    }
}

/// Parameters a querier is bound to at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerierParams {
    /// Backend type the expressions are written for.
    pub datasource_type: DatasourceType,
    /// Evaluation interval of the owning group.
    pub evaluation_interval: Duration,
}

/// Boxed future returned by [`Querier::query`].
pub type QueryFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Metric>>> + Send + 'a>>;

/// A client bound to one backend that executes expressions.
pub trait Querier: Send + Sync + fmt::Debug {
    /// Executes `expr` and returns the resulting samples.
    ///
    /// Implementations should observe `ctx` so cancellation and deadlines
    /// abort the request.
    ///
    /// # Errors
    ///
    /// Returns a [`QueryError`] if the backend fails or the context ends.
    fn query<'a>(&'a self, ctx: &'a EvalContext, expr: &'a str) -> QueryFuture<'a>;
}

/// Produces queriers bound to a backend type and evaluation interval.
pub trait QuerierBuilder: Send + Sync {
    /// Builds a querier for the given parameters.
    fn build_with_params(&self, params: QuerierParams) -> Arc<dyn Querier>;
}
