//! Rule and group configuration.
//!
//! [`RuleConfig`] is the parsed form of one recording rule entry.
//! [`GroupInfo`] carries the fields of the owning group that a rule needs
//! at construction: its identity and evaluation interval.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
pub use vigil_metrics::DatasourceType;

use crate::error::{Result, RuleError};

/// Configuration of one recording rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule ID, unique within its group. Zero means "derive from content".
    #[serde(default)]
    pub id: u64,
    /// Name of the series the rule records.
    pub record: String,
    /// Expression evaluated against the datasource.
    pub expr: String,
    /// Labels set on every output series, overriding queried ones.
    #[serde(default)]
    pub labels: HashMap<String, String>,
    /// Datasource the expression is written for.
    #[serde(default, rename = "type")]
    pub datasource_type: DatasourceType,
}

impl RuleConfig {
    /// Maximum allowed length for a record name.
    pub const MAX_NAME_LENGTH: usize = 256;

    /// Creates a configuration with no labels and a derived ID.
    pub fn new(record: impl Into<String>, expr: impl Into<String>) -> Self {
        Self {
            id: 0,
            record: record.into(),
            expr: expr.into(),
            labels: HashMap::new(),
            datasource_type: DatasourceType::default(),
        }
    }

    /// Sets an explicit rule ID.
    #[must_use]
    pub const fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Adds a static label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Sets the datasource type.
    #[must_use]
    pub const fn with_type(mut self, datasource_type: DatasourceType) -> Self {
        self.datasource_type = datasource_type;
        self
    }

    /// Parses and validates a configuration from JSON.
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::InvalidConfig` if:
    /// - The record name is empty, too long, or not a valid metric name
    /// - The expression is empty
    /// - A label name is empty
    pub fn validate(&self) -> Result<()> {
        validate_record_name(&self.record)?;

        if self.expr.trim().is_empty() {
            return Err(RuleError::InvalidConfig {
                reason: format!("rule {:?}: expression cannot be empty", self.record),
            });
        }

        if self.labels.keys().any(String::is_empty) {
            return Err(RuleError::InvalidConfig {
                reason: format!("rule {:?}: label name cannot be empty", self.record),
            });
        }

        Ok(())
    }

    /// Returns the configured ID, or one derived from the rule content.
    ///
    /// The derived ID hashes the datasource type, record name, expression
    /// and labels sorted by name, so label order never changes it.
    #[must_use]
    pub fn resolved_id(&self) -> u64 {
        if self.id != 0 {
            return self.id;
        }

        let mut hasher = blake3::Hasher::new();
        hasher.update(self.datasource_type.as_str().as_bytes());
        hasher.update(b"\xff");
        hasher.update(self.record.as_bytes());
        hasher.update(b"\xff");
        hasher.update(self.expr.as_bytes());

        let mut labels: Vec<_> = self.labels.iter().collect();
        labels.sort();
        for (k, v) in labels {
            hasher.update(b"\xff");
            hasher.update(k.as_bytes());
            hasher.update(b"=");
            hasher.update(v.as_bytes());
        }

        hash_to_u64(&hasher.finalize())
    }
}

fn validate_record_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RuleError::InvalidConfig {
            reason: "record name cannot be empty".to_string(),
        });
    }

    if name.len() > RuleConfig::MAX_NAME_LENGTH {
        return Err(RuleError::InvalidConfig {
            reason: format!(
                "record name exceeds maximum length of {} characters",
                RuleConfig::MAX_NAME_LENGTH
            ),
        });
    }

    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(RuleError::InvalidConfig {
            reason: format!("record name {name:?} must not start with a digit"),
        });
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '_' && *c != ':')
    {
        return Err(RuleError::InvalidConfig {
            reason: format!("invalid character '{c}' in record name {name:?}"),
        });
    }

    Ok(())
}

fn hash_to_u64(hash: &blake3::Hash) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

/// Identity and cadence of the group that owns a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// Group ID.
    pub id: u64,
    /// Group name.
    pub name: String,
    /// Evaluation interval shared by the group's rules.
    pub interval: Duration,
}

impl GroupInfo {
    /// Creates group info with an ID derived from the group name.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        let name = name.into();
        let id = hash_to_u64(&blake3::hash(name.as_bytes()));
        Self { id, name, interval }
    }

    /// Creates group info with an explicit ID.
    pub fn with_id(id: u64, name: impl Into<String>, interval: Duration) -> Self {
        Self {
            id,
            name: name.into(),
            interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod rule_config_tests {
        use super::*;
        use test_case::test_case;

        #[test]
        fn builder_sets_fields() {
            let cfg = RuleConfig::new("up_count", "count(up)")
                .with_id(7)
                .with_label("env", "prod")
                .with_type(DatasourceType::Graphite);

            assert_eq!(cfg.id, 7);
            assert_eq!(cfg.record, "up_count");
            assert_eq!(cfg.expr, "count(up)");
            assert_eq!(cfg.labels.get("env"), Some(&"prod".to_string()));
            assert_eq!(cfg.datasource_type, DatasourceType::Graphite);
        }

        #[test]
        fn from_json_with_defaults() {
            let cfg = RuleConfig::from_json(r#"{"record": "up_count", "expr": "count(up)"}"#)
                .unwrap();
            assert_eq!(cfg.id, 0);
            assert!(cfg.labels.is_empty());
            assert_eq!(cfg.datasource_type, DatasourceType::Prometheus);
        }

        #[test]
        fn from_json_full() {
            let cfg = RuleConfig::from_json(
                r#"{"id": 12, "record": "job:up:sum", "expr": "sum(up) by (job)",
                    "labels": {"env": "prod"}, "type": "graphite"}"#,
            )
            .unwrap();
            assert_eq!(cfg.id, 12);
            assert_eq!(cfg.labels.len(), 1);
            assert_eq!(cfg.datasource_type, DatasourceType::Graphite);
        }

        #[test]
        fn from_json_rejects_malformed() {
            let err = RuleConfig::from_json("{").unwrap_err();
            assert!(matches!(err, RuleError::Serialization(_)));
        }

        #[test]
        fn from_json_rejects_invalid() {
            let err = RuleConfig::from_json(r#"{"record": "up", "expr": ""}"#).unwrap_err();
            assert!(matches!(err, RuleError::InvalidConfig { .. }));
        }

        #[test_case("", "up" ; "empty record")]
        #[test_case("1up", "up" ; "record starts with digit")]
        #[test_case("up-count", "up" ; "record with hyphen")]
        #[test_case("up_count", "" ; "empty expression")]
        #[test_case("up_count", "   " ; "blank expression")]
        fn validate_rejects(record: &str, expr: &str) {
            assert!(RuleConfig::new(record, expr).validate().is_err());
        }

        #[test]
        fn validate_rejects_long_record() {
            let name = "a".repeat(RuleConfig::MAX_NAME_LENGTH + 1);
            assert!(RuleConfig::new(name, "up").validate().is_err());
        }

        #[test]
        fn validate_rejects_empty_label_name() {
            let cfg = RuleConfig::new("up_count", "up").with_label("", "x");
            assert!(cfg.validate().is_err());
        }

        #[test_case("up_count" ; "snake case")]
        #[test_case("job:up:sum" ; "recording rule convention")]
        #[test_case("_private" ; "leading underscore")]
        fn validate_accepts(record: &str) {
            assert!(RuleConfig::new(record, "up").validate().is_ok());
        }
    }

    mod id_tests {
        use super::*;

        #[test]
        fn explicit_id_wins() {
            let cfg = RuleConfig::new("up_count", "up").with_id(99);
            assert_eq!(cfg.resolved_id(), 99);
        }

        #[test]
        fn derived_id_is_stable() {
            let a = RuleConfig::new("up_count", "up").with_label("env", "prod");
            let b = RuleConfig::new("up_count", "up").with_label("env", "prod");
            assert_eq!(a.resolved_id(), b.resolved_id());
            assert_ne!(a.resolved_id(), 0);
        }

        #[test]
        fn derived_id_ignores_label_order() {
            let a = RuleConfig::new("up_count", "up")
                .with_label("env", "prod")
                .with_label("team", "core");
            let b = RuleConfig::new("up_count", "up")
                .with_label("team", "core")
                .with_label("env", "prod");
            assert_eq!(a.resolved_id(), b.resolved_id());
        }

        #[test]
        fn derived_id_changes_with_content() {
            let base = RuleConfig::new("up_count", "up");
            assert_ne!(
                base.resolved_id(),
                RuleConfig::new("up_count", "up == 1").resolved_id()
            );
            assert_ne!(
                base.resolved_id(),
                base.clone().with_type(DatasourceType::Graphite).resolved_id()
            );
            assert_ne!(
                base.resolved_id(),
                base.clone().with_label("env", "prod").resolved_id()
            );
        }
    }

    mod group_info_tests {
        use super::*;

        #[test]
        fn group_id_derived_from_name() {
            let a = GroupInfo::new("infra", Duration::from_secs(30));
            let b = GroupInfo::new("infra", Duration::from_secs(60));
            let c = GroupInfo::new("apps", Duration::from_secs(30));
            assert_eq!(a.id, b.id);
            assert_ne!(a.id, c.id);
        }

        #[test]
        fn group_with_explicit_id() {
            let g = GroupInfo::with_id(5, "infra", Duration::from_secs(15));
            assert_eq!(g.id, 5);
            assert_eq!(g.name, "infra");
            assert_eq!(g.interval, Duration::from_secs(15));
        }
    }
}
