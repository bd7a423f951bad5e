//! Entity name to record accessor table

use crate::diff::Snapshot;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure of the underlying record store during a lookup.
#[derive(Debug, Clone, Error)]
#[error("record lookup failed: {0}")]
pub struct AccessorError(pub String);

/// Fetches a single record of one entity by id.
#[async_trait]
pub trait RecordAccessor: Send + Sync {
    /// Return the current state of record `id`, or `None` when it does not exist.
    async fn find_by_id(&self, id: i64) -> Result<Option<Snapshot>, AccessorError>;
}

/// Table of known entities, built once at startup.
///
/// Names are matched case-insensitively. Several names (e.g. plural and
/// singular) may share one accessor.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    accessors: HashMap<String, Arc<dyn RecordAccessor>>,
}

impl EntityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `accessor` under each of `names`.
    pub fn register(mut self, names: &[&str], accessor: Arc<dyn RecordAccessor>) -> Self {
        for name in names {
            self.accessors
                .insert(name.to_lowercase(), Arc::clone(&accessor));
        }
        self
    }

    /// Look up the accessor for an entity name.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn RecordAccessor>> {
        self.accessors.get(&name.to_lowercase()).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.accessors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for EntityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRegistry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed;

    #[async_trait]
    impl RecordAccessor for Fixed {
        async fn find_by_id(&self, id: i64) -> Result<Option<Snapshot>, AccessorError> {
            Ok((id == 1).then(|| {
                json!({"id": 1, "color": "blue"})
                    .as_object()
                    .cloned()
                    .unwrap_or_default()
            }))
        }
    }

    #[tokio::test]
    async fn test_resolve_is_case_insensitive_with_aliases() {
        let registry = EntityRegistry::new().register(&["Widgets", "widget"], Arc::new(Fixed));

        assert_eq!(registry.names(), vec!["widget", "widgets"]);
        let accessor = registry.resolve("WIDGETS").expect("registered");
        assert!(accessor.find_by_id(1).await.unwrap().is_some());
        assert!(accessor.find_by_id(2).await.unwrap().is_none());
        assert!(registry.resolve("widget").is_some());
        assert!(registry.resolve("gadgets").is_none());
    }
}
