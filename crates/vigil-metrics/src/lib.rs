//! Label model, query-backend interface and metrics registry for Vigil.
#![forbid(unsafe_code)]
//!
//! `vigil-metrics` holds the pieces the rule engine shares with the
//! outside world:
//!
//! - **Label model**: [`Label`], [`Metric`] (query input) and [`TimeSeries`] (rule output)
//! - **Canonical keys**: [`canonical_key`] maps a label set to an order-independent string
//! - **Query backend**: the [`Querier`] / [`QuerierBuilder`] traits, driven by an [`EvalContext`]
//! - **In-memory backend**: [`MemoryQuerier`] for tests and embedding
//! - **Registry**: [`MetricsRegistry`] with lazily evaluated gauges
//!
//! # Example
//!
//! ```rust
//! use vigil_metrics::{EvalContext, Label, MemoryQuerier, Metric, Querier, canonical_key};
//!
//! let rt = tokio::runtime::Runtime::new().unwrap();
//! rt.block_on(async {
//!     let querier = MemoryQuerier::new();
//!     querier.set("up", vec![Metric::new(1.0, 1_700_000_000).label("job", "api")]);
//!
//!     let ctx = EvalContext::new();
//!     let metrics = querier.query(&ctx, "up").await.unwrap();
//!     assert_eq!(metrics.len(), 1);
//! });
//!
//! let key = canonical_key(&[Label::new("job", "a"), Label::new("env", "prod")]);
//! assert_eq!(key, "env=prod,job=a");
//! ```

#![doc(html_root_url = "https://docs.rs/vigil-metrics/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod context;
pub mod error;
pub mod key;
pub mod memory;
pub mod querier;
pub mod registry;
pub mod types;

// Re-export main types at crate root
pub use context::EvalContext;
pub use error::{QueryError, Result};
pub use key::canonical_key;
pub use memory::{MemoryQuerier, MemoryQuerierBuilder};
pub use querier::{DatasourceType, Querier, QuerierBuilder, QuerierParams, QueryFuture};
pub use registry::{GaugeHandle, MetricsRegistry};
pub use types::{Label, METRIC_NAME_LABEL, Metric, Sample, TimeSeries};
