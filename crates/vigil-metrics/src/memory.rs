//! In-memory query backend.
//!
//! [`MemoryQuerier`] answers expressions from a table of canned results.
//! It honours the evaluation context like a network backend would, which
//! makes it suitable for tests and for embedding the rule engine without a
//! real datasource.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::debug;

use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::querier::{Querier, QuerierBuilder, QuerierParams, QueryFuture};
use crate::types::Metric;

/// Thread-safe table of expression results.
///
/// Clones share the same table, so a test can keep a handle and change the
/// answers while a rule holds another clone.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuerier {
    responses: Arc<RwLock<HashMap<String, Result<Vec<Metric>>>>>,
    latency: Arc<RwLock<Option<Duration>>>,
    calls: Arc<AtomicUsize>,
    params: Option<QuerierParams>,
}

impl MemoryQuerier {
    /// Creates an empty querier. Unknown expressions yield no samples; blank
    /// ones are rejected as invalid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the samples returned for `expr`.
    pub fn set(&self, expr: impl Into<String>, metrics: Vec<Metric>) {
        self.responses.write().insert(expr.into(), Ok(metrics));
    }

    /// Makes queries for `expr` fail with `err`.
    pub fn set_error(&self, expr: impl Into<String>, err: QueryError) {
        self.responses.write().insert(expr.into(), Err(err));
    }

    /// Forgets the answer for `expr`.
    pub fn remove(&self, expr: &str) {
        self.responses.write().remove(expr);
    }

    /// Delays every answer by `latency`, or removes the delay with `None`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write() = latency;
    }

    /// Returns how many queries have reached this backend.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Returns the parameters this querier was bound with, if built by a
    /// [`MemoryQuerierBuilder`].
    #[must_use]
    pub const fn params(&self) -> Option<QuerierParams> {
        self.params
    }

    fn lookup(&self, expr: &str) -> Result<Vec<Metric>> {
        self.responses
            .read()
            .get(expr)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl Querier for MemoryQuerier {
    fn query<'a>(&'a self, ctx: &'a EvalContext, expr: &'a str) -> QueryFuture<'a> {
        Box::pin(async move {
            ctx.check()?;
            self.calls.fetch_add(1, Ordering::Relaxed);
            if expr.trim().is_empty() {
                return Err(QueryError::InvalidExpression {
                    reason: "empty expression".to_string(),
                });
            }

            let latency = *self.latency.read();
            if let Some(latency) = latency {
                ctx.run(async {
                    tokio::time::sleep(latency).await;
                    Ok(())
                })
                .await?;
            }

            let result = self.lookup(expr);
            debug!(expr = %expr, ok = result.is_ok(), "memory query");
            result
        })
    }
}

/// Builds [`MemoryQuerier`]s that share one response table.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuerierBuilder {
    querier: MemoryQuerier,
    built: Arc<RwLock<Vec<QuerierParams>>>,
}

impl MemoryQuerierBuilder {
    /// Creates a builder whose queriers answer from `querier`'s table.
    #[must_use]
    pub fn new(querier: MemoryQuerier) -> Self {
        Self {
            querier,
            built: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns the shared querier used to configure answers.
    #[must_use]
    pub const fn querier(&self) -> &MemoryQuerier {
        &self.querier
    }

    /// Returns every parameter set passed to [`QuerierBuilder::build_with_params`].
    #[must_use]
    pub fn built_params(&self) -> Vec<QuerierParams> {
        self.built.read().clone()
    }
}

impl QuerierBuilder for MemoryQuerierBuilder {
    fn build_with_params(&self, params: QuerierParams) -> Arc<dyn Querier> {
        self.built.write().push(params);
        let mut querier = self.querier.clone();
        querier.params = Some(params);
        Arc::new(querier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::querier::DatasourceType;

    #[tokio::test]
    async fn unknown_expression_returns_empty() {
        let q = MemoryQuerier::new();
        let ctx = EvalContext::new();
        let res = q.query(&ctx, "up").await.unwrap();
        assert!(res.is_empty());
        assert_eq!(q.query_count(), 1);
    }

    #[tokio::test]
    async fn blank_expression_is_invalid() {
        let q = MemoryQuerier::new();
        let ctx = EvalContext::new();
        let res = q.query(&ctx, "  ").await;
        assert!(matches!(res, Err(QueryError::InvalidExpression { .. })));
        assert_eq!(q.query_count(), 1);
    }

    #[tokio::test]
    async fn returns_configured_metrics() {
        let q = MemoryQuerier::new();
        q.set("up", vec![Metric::new(1.0, 100).label("job", "a")]);

        let ctx = EvalContext::new();
        let res = q.query(&ctx, "up").await.unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].label_value("job"), Some("a"));
    }

    #[tokio::test]
    async fn returns_configured_error() {
        let q = MemoryQuerier::new();
        q.set_error("up", QueryError::backend("down"));

        let ctx = EvalContext::new();
        let res = q.query(&ctx, "up").await;
        assert_eq!(res, Err(QueryError::backend("down")));

        q.remove("up");
        assert!(q.query(&ctx, "up").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_context_skips_backend() {
        let q = MemoryQuerier::new();
        let ctx = EvalContext::new();
        ctx.cancel();

        assert_eq!(q.query(&ctx, "up").await, Err(QueryError::Cancelled));
        assert_eq!(q.query_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_respects_deadline() {
        let q = MemoryQuerier::new();
        q.set_latency(Some(Duration::from_secs(30)));

        let ctx = EvalContext::new().with_timeout(Duration::from_secs(1));
        assert_eq!(q.query(&ctx, "up").await, Err(QueryError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn clones_share_answers() {
        let q = MemoryQuerier::new();
        let other = q.clone();
        q.set("up", vec![Metric::new(1.0, 1)]);

        let ctx = EvalContext::new();
        assert_eq!(other.query(&ctx, "up").await.unwrap().len(), 1);
    }

    #[test]
    fn builder_records_params() {
        let builder = MemoryQuerierBuilder::new(MemoryQuerier::new());
        let params = QuerierParams {
            datasource_type: DatasourceType::Graphite,
            evaluation_interval: Duration::from_secs(30),
        };

        let _querier = builder.build_with_params(params);
        assert_eq!(builder.built_params(), vec![params]);
        assert_eq!(builder.querier().params(), None);
    }
}
