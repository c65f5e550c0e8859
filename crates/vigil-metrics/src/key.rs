//! Canonical string keys for label sets.
//!
//! Two label sets with the same pairs map to the same key regardless of the
//! order the pairs arrive in. The rule engine uses the key to detect output
//! series that would collide in storage.

use crate::types::Label;

/// Builds the canonical key of a label set.
///
/// Labels are ordered by name (byte-wise, stable) and rendered as
/// `name=value` pairs joined by a single comma. Sets with zero or one label
/// skip the sort.
#[must_use]
pub fn canonical_key(labels: &[Label]) -> String {
    let mut ordered: Vec<&Label> = labels.iter().collect();
    if ordered.len() > 1 {
        ordered.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));
    }

    let capacity = ordered
        .iter()
        .map(|l| l.name.len() + l.value.len() + 2)
        .sum();
    let mut key = String::with_capacity(capacity);
    for (i, label) in ordered.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        key.push_str(&label.name);
        key.push('=');
        key.push_str(&label.value);
    }
    key
}
