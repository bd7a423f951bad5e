//! Audit record types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Identifier assigned to a record by its store.
pub type AuditRecordId = u64;

/// Field name to `{old, new}` mapping, ordered by field name.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// Name of the synthetic field recorded for deletions.
pub const DELETED_FIELD: &str = "deleted";

/// Kind of change an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    /// Record creation
    Create,
    /// Field-level update
    Update,
    /// Record deletion
    Delete,
}

impl AuditAction {
    /// Canonical upper-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown action name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid action. Use: CREATE, UPDATE or DELETE")]
pub struct UnknownAction(pub String);

impl FromStr for AuditAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            _ => Err(UnknownAction(s.to_string())),
        }
    }
}

/// Previous and submitted value of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the operation (`null` when the field was absent)
    pub old: Value,
    /// Value the caller submitted
    pub new: Value,
}

impl FieldChange {
    /// Create a change from `old` to `new`.
    pub fn new(old: impl Into<Value>, new: impl Into<Value>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }
}

/// A persisted audit record. Never modified after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Store-assigned identifier.
    pub id: AuditRecordId,
    /// Actor that performed the change.
    pub actor_id: i64,
    /// Unix timestamp in milliseconds, set at persistence.
    pub timestamp: u64,
    /// Lower-case entity name.
    pub entity_name: String,
    /// Identifier of the affected record.
    pub entity_id: i64,
    /// What happened.
    pub action: AuditAction,
    /// Changed fields.
    pub changed_fields: ChangeSet,
    /// Verb and path of the triggering request, e.g. `PUT /api/widgets/42`.
    pub operation_label: String,
}

impl AuditRecord {
    /// Serialize to a single JSON line.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Everything about a record except what the store assigns.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditDraft {
    /// Actor that performed the change.
    pub actor_id: i64,
    /// Lower-case entity name.
    pub entity_name: String,
    /// Identifier of the affected record.
    pub entity_id: i64,
    /// What happened.
    pub action: AuditAction,
    /// Changed fields.
    pub changed_fields: ChangeSet,
    /// Verb and path of the triggering request.
    pub operation_label: String,
}

impl AuditDraft {
    /// Create a draft; the entity name is normalized to lower case.
    pub fn new(
        actor_id: i64,
        entity_name: &str,
        entity_id: i64,
        action: AuditAction,
        changed_fields: ChangeSet,
        operation_label: impl Into<String>,
    ) -> Self {
        Self {
            actor_id,
            entity_name: entity_name.to_lowercase(),
            entity_id,
            action,
            changed_fields,
            operation_label: operation_label.into(),
        }
    }

    /// Turn the draft into a record with the store-assigned id and time.
    pub fn into_record(self, id: AuditRecordId, timestamp: u64) -> AuditRecord {
        AuditRecord {
            id,
            actor_id: self.actor_id,
            timestamp,
            entity_name: self.entity_name.to_lowercase(),
            entity_id: self.entity_id,
            action: self.action,
            changed_fields: self.changed_fields,
            operation_label: self.operation_label,
        }
    }
}

/// Current Unix time in milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
