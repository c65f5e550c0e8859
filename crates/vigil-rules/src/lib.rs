//! Rule contract and recording rules for the Vigil rule engine.
//!
//! `vigil-rules` is the execution core a group scheduler drives: it
//! evaluates rule expressions against a query backend and turns the results
//! into new series, while keeping each rule's status safe to read from
//! metrics scrapes and status endpoints at any time.
//!
//! # Features
//!
//! - **Rule contract**: [`Rule`] is the capability set every variant implements
//! - **Recording rules**: [`RecordingRule`] records an expression as a new series
//! - **Duplicate guard**: a batch whose series collide on labels is rejected whole
//! - **Hot reload**: [`Rule::update_with`] swaps expression and labels in place
//! - **Health gauges**: per-rule gauges evaluated lazily at scrape time
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use vigil_metrics::{EvalContext, MemoryQuerier, MemoryQuerierBuilder, Metric, MetricsRegistry};
//! use vigil_rules::{GroupInfo, RecordingRule, Rule, RuleConfig};
//!
//! let querier = MemoryQuerier::new();
//! querier.set("count(up)", vec![Metric::new(1.0, 1_700_000_000).label("job", "a")]);
//!
//! let builder = MemoryQuerierBuilder::new(querier);
//! let registry = MetricsRegistry::new();
//! let group = GroupInfo::new("infra", Duration::from_secs(30));
//! let cfg = RuleConfig::new("up_count", "count(up)").with_label("env", "prod");
//!
//! let rule = RecordingRule::new(&builder, &registry, &group, cfg);
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! let series = rt.block_on(rule.exec(&EvalContext::new(), true)).unwrap();
//! assert_eq!(series[0].metric_name(), Some("up_count"));
//! assert_eq!(series[0].label_value("env"), Some("prod"));
//!
//! rule.close();
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/vigil-rules/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod error;
pub mod recording;
pub mod rule;
pub mod status;

// Re-export main types at crate root
pub use config::{DatasourceType, GroupInfo, RuleConfig};
pub use error::{Result, RuleError};
pub use recording::{ApiRecordingRule, ERROR_GAUGE, RecordingRule, RecordingSpec, SAMPLES_GAUGE};
pub use rule::{ApiRule, ExecFuture, Rule};
pub use status::{ExecState, RuleStatus};
