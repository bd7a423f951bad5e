//! In-memory record tables backing the demo entities

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use trailmark_audit::{AccessorError, RecordAccessor, Snapshot};
use trailmark_extras::ActorDirectory;

#[derive(Default)]
struct Rows {
    records: BTreeMap<i64, Snapshot>,
    last_id: i64,
}

/// A table of JSON records keyed by integer id.
///
/// Clones share the same rows.
#[derive(Clone, Default)]
pub struct Table {
    rows: Arc<RwLock<Rows>>,
}

impl Table {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// All records in id order.
    pub async fn list(&self) -> Vec<Snapshot> {
        self.rows.read().await.records.values().cloned().collect()
    }

    /// A single record.
    pub async fn get(&self, id: i64) -> Option<Snapshot> {
        self.rows.read().await.records.get(&id).cloned()
    }

    /// Insert a new record and assign it the next id.
    pub async fn insert(&self, mut fields: Snapshot) -> Snapshot {
        let mut rows = self.rows.write().await;
        rows.last_id += 1;
        let id = rows.last_id;
        fields.insert("id".to_string(), Value::from(id));
        rows.records.insert(id, fields.clone());
        fields
    }

    /// Merge `fields` into record `id`.
    ///
    /// `null` values and the `id` field are ignored. Returns the updated
    /// record, or `None` when it does not exist.
    pub async fn update(&self, id: i64, fields: Snapshot) -> Option<Snapshot> {
        let mut rows = self.rows.write().await;
        let record = rows.records.get_mut(&id)?;
        for (key, value) in fields {
            if key == "id" || value.is_null() {
                continue;
            }
            record.insert(key, value);
        }
        Some(record.clone())
    }

    /// Remove record `id`, returning whether it existed.
    pub async fn remove(&self, id: i64) -> bool {
        self.rows.write().await.records.remove(&id).is_some()
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        self.rows.read().await.records.len()
    }

    /// Whether the table is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RecordAccessor for Table {
    async fn find_by_id(&self, id: i64) -> Result<Option<Snapshot>, AccessorError> {
        Ok(self.get(id).await)
    }
}

#[async_trait]
impl ActorDirectory for Table {
    async fn contains(&self, actor_id: i64) -> bool {
        self.get(actor_id).await.is_some()
    }
}

/// The demo entity tables.
#[derive(Clone, Default)]
pub struct Tables {
    pub widgets: Table,
    pub users: Table,
}

impl Tables {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Turn a JSON value into a record, rejecting anything but an object.
pub fn snapshot(value: Value) -> Option<Snapshot> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Snapshot {
        snapshot(value).unwrap()
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let table = Table::new();
        let first = table.insert(fields(json!({"color": "blue"}))).await;
        let second = table.insert(fields(json!({"color": "green", "id": 99}))).await;

        assert_eq!(first["id"], json!(1));
        assert_eq!(second["id"], json!(2));
        assert_eq!(table.len().await, 2);
    }

    #[tokio::test]
    async fn test_update_merges_and_keeps_id() {
        let table = Table::new();
        table.insert(fields(json!({"color": "blue", "size": 3}))).await;

        let updated = table
            .update(1, fields(json!({"id": 7, "color": "red", "size": null})))
            .await
            .unwrap();
        assert_eq!(updated, fields(json!({"id": 1, "color": "red", "size": 3})));
        assert!(table.update(2, Snapshot::new()).await.is_none());
    }

    #[tokio::test]
    async fn test_accessor_reads_current_state() {
        let table = Table::new();
        table.insert(fields(json!({"color": "blue"}))).await;

        assert!(table.find_by_id(1).await.unwrap().is_some());
        assert!(table.remove(1).await);
        assert!(table.find_by_id(1).await.unwrap().is_none());
        assert!(!table.remove(1).await);
    }

    #[tokio::test]
    async fn test_table_as_actor_directory() {
        let users = Table::new();
        users.insert(fields(json!({"name": "admin"}))).await;

        assert!(users.contains(1).await);
        assert!(!users.contains(2).await);
    }
}
