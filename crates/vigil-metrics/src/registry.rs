//! Metrics registry with lazily evaluated gauges.
//!
//! Rules publish their health through gauges whose value is computed from
//! rule state at scrape time. Each registration returns a [`GaugeHandle`];
//! consuming the handle with [`GaugeHandle::unregister`] is the only way to
//! remove the gauge, so a registration is released at most once.
//!
//! Registration is get-or-create: the first callback under a family and
//! label set stays in place until its own handle releases it.
//!
//! # Example
//!
//! ```rust
//! use vigil_metrics::{Label, MetricsRegistry};
//!
//! let registry = MetricsRegistry::new();
//! let labels = vec![Label::new("recording", "up_count")];
//! let handle = registry.register_gauge("rule_error", "Rule error state", &labels, || 1.0);
//!
//! assert_eq!(registry.gauge_value("rule_error", &labels), Some(1.0));
//! assert!(registry.encode().contains("rule_error"));
//!
//! handle.unregister();
//! assert_eq!(registry.gauge_value("rule_error", &labels), None);
//! ```

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use prometheus_client::collector::Collector;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tracing::debug;

use crate::key::canonical_key;
use crate::types::Label;

type GaugeFn = Arc<dyn Fn() -> f64 + Send + Sync>;

struct GaugeEntry {
    id: u64,
    labels: Vec<(String, String)>,
    callback: GaugeFn,
}

#[derive(Default)]
struct GaugeFamily {
    help: String,
    gauges: BTreeMap<String, GaugeEntry>,
}

/// Shared table of lazy gauges, grouped by family name.
#[derive(Default)]
struct LazyGauges {
    families: RwLock<BTreeMap<String, GaugeFamily>>,
    next_id: AtomicU64,
}

impl LazyGauges {
    fn remove(&self, family: &str, key: &str, id: u64) -> bool {
        let mut families = self.families.write();
        let Some(fam) = families.get_mut(family) else {
            return false;
        };
        // only the owning registration may remove the entry
        if fam.gauges.get(key).is_none_or(|e| e.id != id) {
            return false;
        }
        fam.gauges.remove(key);
        if fam.gauges.is_empty() {
            families.remove(family);
        }
        true
    }

    fn callback(&self, family: &str, key: &str) -> Option<GaugeFn> {
        let families = self.families.read();
        families
            .get(family)
            .and_then(|fam| fam.gauges.get(key))
            .map(|e| Arc::clone(&e.callback))
    }
}

/// Snapshot of one family taken under the lock; callbacks run after release.
type FamilySnapshot = (String, String, Vec<(Vec<(String, String)>, GaugeFn)>);

/// Exposes [`LazyGauges`] to a prometheus-client [`Registry`].
struct LazyGaugeCollector {
    gauges: Arc<LazyGauges>,
}

impl fmt::Debug for LazyGaugeCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyGaugeCollector").finish_non_exhaustive()
    }
}

impl Collector for LazyGaugeCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        let snapshot: Vec<FamilySnapshot> = {
            let families = self.gauges.families.read();
            families
                .iter()
                .map(|(name, fam)| {
                    let entries = fam
                        .gauges
                        .values()
                        .map(|e| (e.labels.clone(), Arc::clone(&e.callback)))
                        .collect();
                    (name.clone(), fam.help.clone(), entries)
                })
                .collect()
        };

        for (name, help, entries) in &snapshot {
            let mut metric_encoder =
                encoder.encode_descriptor(name, help, None, MetricType::Gauge)?;
            for (labels, callback) in entries {
                let gauge = ConstGauge::new(callback());
                gauge.encode(metric_encoder.encode_family(labels)?)?;
            }
        }
        Ok(())
    }
}

/// Process-wide metrics registry.
///
/// Cloning is cheap; clones share the same gauges and exposition.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    gauges: Arc<LazyGauges>,
}

impl fmt::Debug for MetricsRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsRegistry")
            .field("gauges", &self.gauge_count())
            .finish_non_exhaustive()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let gauges = Arc::new(LazyGauges::default());
        let mut registry = Registry::default();
        registry.register_collector(Box::new(LazyGaugeCollector {
            gauges: Arc::clone(&gauges),
        }));

        Self {
            registry: Arc::new(registry),
            gauges,
        }
    }

    /// Registers a gauge whose value is computed by `callback` on demand.
    ///
    /// If the family and labels are already registered, the existing
    /// callback is kept and the returned handle does not own the entry:
    /// unregistering it is a no-op.
    pub fn register_gauge<F>(
        &self,
        family: &str,
        help: &str,
        labels: &[Label],
        callback: F,
    ) -> GaugeHandle
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let key = canonical_key(labels);
        let id = self.gauges.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = GaugeEntry {
            id,
            labels: labels
                .iter()
                .map(|l| (l.name.clone(), l.value.clone()))
                .collect(),
            callback: Arc::new(callback),
        };

        let existing = {
            let mut families = self.gauges.families.write();
            let fam = families.entry(family.to_string()).or_default();
            if fam.help.is_empty() {
                fam.help = help.to_string();
            }
            match fam.gauges.entry(key.clone()) {
                Entry::Occupied(_) => true,
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                    false
                }
            }
        };

        if existing {
            debug!(family = %family, labels = %key, "gauge already registered, keeping existing");
        } else {
            debug!(family = %family, labels = %key, "registered gauge");
        }

        GaugeHandle {
            family: family.to_string(),
            key,
            id,
            gauges: Arc::clone(&self.gauges),
        }
    }

    /// Evaluates one gauge now, if it is registered.
    #[must_use]
    pub fn gauge_value(&self, family: &str, labels: &[Label]) -> Option<f64> {
        let callback = self.gauges.callback(family, &canonical_key(labels))?;
        Some(callback())
    }

    /// Returns true if a gauge is registered under `family` and `labels`.
    #[must_use]
    pub fn is_registered(&self, family: &str, labels: &[Label]) -> bool {
        self.gauges
            .callback(family, &canonical_key(labels))
            .is_some()
    }

    /// Returns the number of registered gauges across all families.
    #[must_use]
    pub fn gauge_count(&self) -> usize {
        self.gauges
            .families
            .read()
            .values()
            .map(|f| f.gauges.len())
            .sum()
    }

    /// Encodes all metrics in the OpenMetrics text format.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("failed to encode metrics");
            return String::new();
        }
        buffer
    }
}

/// Ownership of one gauge registration.
///
/// Dropping the handle leaves the gauge registered; release it explicitly
/// with [`GaugeHandle::unregister`].
pub struct GaugeHandle {
    family: String,
    key: String,
    id: u64,
    gauges: Arc<LazyGauges>,
}

impl fmt::Debug for GaugeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaugeHandle")
            .field("family", &self.family)
            .field("labels", &self.key)
            .finish_non_exhaustive()
    }
}

impl GaugeHandle {
    /// Returns the gauge family name.
    #[must_use]
    pub fn family(&self) -> &str {
        &self.family
    }

    /// Returns the canonical key of the gauge's labels.
    #[must_use]
    pub fn labels_key(&self) -> &str {
        &self.key
    }

    /// Removes the gauge from the registry.
    ///
    /// Returns false if this handle did not own the entry, because another
    /// registration under the same labels came first.
    pub fn unregister(self) -> bool {
        let removed = self.gauges.remove(&self.family, &self.key, self.id);
        debug!(family = %self.family, labels = %self.key, removed, "unregistered gauge");
        removed
    }
}
