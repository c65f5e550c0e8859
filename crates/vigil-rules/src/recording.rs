//! Recording rules.
//!
//! A [`RecordingRule`] evaluates its expression and turns every returned
//! sample into an output series named after the rule. The batch is
//! published only if no two series collide on their final label set.

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vigil_metrics::{
    DatasourceType, EvalContext, GaugeHandle, Label, METRIC_NAME_LABEL, Metric, MetricsRegistry,
    Querier, QuerierBuilder, QuerierParams, QueryError, TimeSeries, canonical_key,
};

use crate::config::{GroupInfo, RuleConfig};
use crate::error::{Result, RuleError};
use crate::rule::{ApiRule, ExecFuture, Rule};
use crate::status::{ExecState, RuleStatus};

/// Gauge family exposing 1 when a recording rule's last evaluation failed.
pub const ERROR_GAUGE: &str = "vigil_recording_rules_error";

/// Gauge family exposing the number of series of the last evaluation.
pub const SAMPLES_GAUGE: &str = "vigil_recording_rules_last_evaluation_samples";

/// The part of a recording rule a hot-reload may replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingSpec {
    /// Expression evaluated against the datasource.
    pub expr: String,
    /// Labels overriding queried labels on every output series.
    pub labels: HashMap<String, String>,
}

#[derive(Debug)]
struct RecordingRuleMetrics {
    errors: GaugeHandle,
    samples: GaugeHandle,
}

/// A rule that records the result of an expression as new series.
#[derive(Debug)]
pub struct RecordingRule {
    datasource_type: DatasourceType,
    rule_id: u64,
    name: String,
    group_id: u64,
    group_name: String,

    spec: RwLock<RecordingSpec>,
    querier: Arc<dyn Querier>,
    status: Arc<RuleStatus>,
    metrics: Mutex<Option<RecordingRuleMetrics>>,
}

impl RecordingRule {
    /// Creates a recording rule for `cfg` inside `group`.
    ///
    /// Binds a querier for the rule's datasource type and the group's
    /// interval and registers the rule's gauges. Nothing is queried yet.
    pub fn new(
        builder: &dyn QuerierBuilder,
        registry: &MetricsRegistry,
        group: &GroupInfo,
        cfg: RuleConfig,
    ) -> Self {
        let rule_id = cfg.resolved_id();
        let querier = builder.build_with_params(QuerierParams {
            datasource_type: cfg.datasource_type,
            evaluation_interval: group.interval,
        });

        let status = Arc::new(RuleStatus::new());
        let labels = gauge_labels(&cfg.record, &group.name, rule_id);

        let errors = {
            let status = Arc::clone(&status);
            registry.register_gauge(
                ERROR_GAUGE,
                "Whether the last evaluation of the recording rule failed",
                &labels,
                move || status.error_value(),
            )
        };
        let samples = {
            let status = Arc::clone(&status);
            registry.register_gauge(
                SAMPLES_GAUGE,
                "Number of series produced by the last evaluation of the recording rule",
                &labels,
                move || status.last_samples() as f64,
            )
        };

        debug!(
            rule_id,
            rule_name = %cfg.record,
            group = %group.name,
            "created recording rule"
        );

        Self {
            datasource_type: cfg.datasource_type,
            rule_id,
            name: cfg.record,
            group_id: group.id,
            group_name: group.name.clone(),
            spec: RwLock::new(RecordingSpec {
                expr: cfg.expr,
                labels: cfg.labels,
            }),
            querier,
            status,
            metrics: Mutex::new(Some(RecordingRuleMetrics { errors, samples })),
        }
    }

    /// Returns the name of the recorded series.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the datasource type.
    #[must_use]
    pub const fn datasource_type(&self) -> DatasourceType {
        self.datasource_type
    }

    /// Returns the name of the owning group.
    #[must_use]
    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    /// Returns the current expression and labels.
    #[must_use]
    pub fn spec(&self) -> RecordingSpec {
        self.spec.read().clone()
    }

    /// Returns a copy of the current execution status.
    #[must_use]
    pub fn status(&self) -> ExecState {
        self.status.snapshot()
    }

    /// Returns the labels the rule's gauges are registered under.
    #[must_use]
    pub fn metric_labels(&self) -> Vec<Label> {
        gauge_labels(&self.name, &self.group_name, self.rule_id)
    }

    /// Returns true until [`Rule::close`] has been called.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.metrics.lock().is_some()
    }

    /// Returns the API representation of the rule.
    #[must_use]
    pub fn rule_api(&self) -> ApiRecordingRule {
        let state = self.status.snapshot();
        let spec = self.spec();

        ApiRecordingRule {
            // encode as strings to avoid rounding
            id: self.rule_id.to_string(),
            group_id: self.group_id.to_string(),
            name: self.name.clone(),
            datasource_type: self.datasource_type.to_string(),
            expression: spec.expr,
            health: if state.is_healthy() { "ok" } else { "err" }.to_string(),
            last_error: state
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
            last_exec: state.time,
            last_samples: state.samples,
            evaluation_time: state.duration.as_secs_f64(),
            labels: spec.labels,
        }
    }

    async fn exec_series(&self, ctx: &EvalContext) -> Result<Vec<TimeSeries>> {
        let spec = self.spec();
        let started = Instant::now();
        let result = ctx.run(self.querier.query(ctx, &spec.expr)).await;
        self.record(&spec, result, started.elapsed())
    }

    /// Records the query outcome and builds the output batch.
    ///
    /// The status lock is held for the whole call, so readers see either
    /// the previous evaluation or this one, never a mix.
    fn record(
        &self,
        spec: &RecordingSpec,
        result: std::result::Result<Vec<Metric>, QueryError>,
        duration: Duration,
    ) -> Result<Vec<TimeSeries>> {
        let mut state = self.status.lock();
        state.time = Some(Utc::now());
        state.duration = duration;
        state.samples = 0;

        let metrics = match result {
            Ok(metrics) => {
                state.error = None;
                metrics
            }
            Err(source) => {
                let err = RuleError::Query {
                    expr: spec.expr.clone(),
                    source,
                };
                warn!(
                    rule_id = self.rule_id,
                    rule_name = %self.name,
                    group = %self.group_name,
                    error = %err,
                    "recording rule query failed"
                );
                state.error = Some(err.clone());
                return Err(err);
            }
        };

        let mut seen = HashSet::with_capacity(metrics.len());
        let mut series = Vec::with_capacity(metrics.len());
        for metric in &metrics {
            let ts = to_time_series(&self.name, &spec.labels, metric);
            let key = canonical_key(&ts.labels);
            if seen.contains(&key) {
                let err = RuleError::DuplicateSeries {
                    metric: metric.to_string(),
                    labels: key,
                };
                warn!(
                    rule_id = self.rule_id,
                    rule_name = %self.name,
                    group = %self.group_name,
                    error = %err,
                    "recording rule produced duplicate series"
                );
                state.error = Some(err.clone());
                return Err(err);
            }
            seen.insert(key);
            series.push(ts);
        }

        state.samples = series.len();
        debug!(
            rule_id = self.rule_id,
            rule_name = %self.name,
            series = series.len(),
            "recording rule evaluated"
        );
        Ok(series)
    }
}

/// Builds the output series for one query result.
///
/// The rule name is forced into `__name__`, then static labels are applied
/// on top, winning every collision including `__name__`.
fn to_time_series(name: &str, labels: &HashMap<String, String>, metric: &Metric) -> TimeSeries {
    let mut out: BTreeMap<String, String> = metric
        .labels
        .iter()
        .map(|l| (l.name.clone(), l.value.clone()))
        .collect();
    out.insert(METRIC_NAME_LABEL.to_string(), name.to_string());
    for (k, v) in labels {
        out.insert(k.clone(), v.clone());
    }
    TimeSeries::new(out, metric.value, metric.timestamp.saturating_mul(1000))
}

fn gauge_labels(record: &str, group: &str, id: u64) -> Vec<Label> {
    vec![
        Label::new("recording", record),
        Label::new("group", group),
        Label::new("id", id.to_string()),
    ]
}

impl fmt::Display for RecordingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Rule for RecordingRule {
    fn id(&self) -> u64 {
        self.rule_id
    }

    fn group_id(&self) -> u64 {
        self.group_id
    }

    fn kind(&self) -> &'static str {
        "recording"
    }

    fn exec<'a>(&'a self, ctx: &'a EvalContext, series: bool) -> ExecFuture<'a> {
        Box::pin(async move {
            if !series {
                return Ok(Vec::new());
            }
            self.exec_series(ctx).await
        })
    }

    fn update_with(&self, other: &dyn Rule) -> Result<()> {
        let Some(nr) = other.as_any().downcast_ref::<Self>() else {
            return Err(RuleError::TypeMismatch {
                expected: self.kind(),
                found: format!("{} rule {:?}", other.kind(), other.to_string()),
            });
        };

        let spec = nr.spec();
        *self.spec.write() = spec;
        info!(
            rule_id = self.rule_id,
            rule_name = %self.name,
            group = %self.group_name,
            "updated recording rule"
        );
        Ok(())
    }

    fn api(&self) -> ApiRule {
        ApiRule::Recording(self.rule_api())
    }

    fn close(&self) {
        let Some(metrics) = self.metrics.lock().take() else {
            debug!(rule_id = self.rule_id, rule_name = %self.name, "recording rule already closed");
            return;
        };
        metrics.errors.unregister();
        metrics.samples.unregister();
        info!(
            rule_id = self.rule_id,
            rule_name = %self.name,
            group = %self.group_name,
            "closed recording rule"
        );
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Read-only API view of a recording rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiRecordingRule {
    /// Rule ID, rendered as a string.
    pub id: String,
    /// Owning group ID, rendered as a string.
    pub group_id: String,
    /// Name of the recorded series.
    pub name: String,
    /// Datasource type.
    #[serde(rename = "type")]
    pub datasource_type: String,
    /// Current expression.
    pub expression: String,
    /// `"ok"` or `"err"`.
    pub health: String,
    /// Last error message; empty when healthy.
    pub last_error: String,
    /// When the rule last ran.
    pub last_exec: Option<DateTime<Utc>>,
    /// Number of series produced by the last run.
    pub last_samples: usize,
    /// Seconds spent in the last run's query.
    pub evaluation_time: f64,
    /// Static labels.
    pub labels: HashMap<String, String>,
}
