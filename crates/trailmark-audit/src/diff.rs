//! Shallow change detection between a stored record and a submitted payload

use crate::record::{ChangeSet, FieldChange, DELETED_FIELD};
use serde_json::{Map, Value};

/// A record or payload as a flat JSON object.
pub type Snapshot = Map<String, Value>;

/// Compute the fields the caller changed.
///
/// Only keys present in `submitted` are considered; keys that exist only in
/// `before` are ignored. A `null` submitted value counts as "not submitted".
/// Comparison is shallow: scalars compare by value (numbers numerically),
/// while arrays and objects are always reported as changed.
pub fn diff(before: &Snapshot, submitted: &Snapshot) -> ChangeSet {
    submitted
        .iter()
        .filter(|(_, new)| !new.is_null())
        .filter_map(|(field, new)| {
            let old = before.get(field).unwrap_or(&Value::Null);
            if strictly_equal(old, new) {
                None
            } else {
                Some((
                    field.clone(),
                    FieldChange {
                        old: old.clone(),
                        new: new.clone(),
                    },
                ))
            }
        })
        .collect()
}

/// The change set recorded for a deletion: `deleted: true -> false`.
pub fn deletion_changes() -> ChangeSet {
    let mut changes = ChangeSet::new();
    changes.insert(DELETED_FIELD.to_string(), FieldChange::new(true, false));
    changes
}

fn strictly_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        // Composite values have identity, not value, equality
        _ => false,
    }
}
