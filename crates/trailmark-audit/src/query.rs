//! Query builder for audit records

use crate::record::{AuditAction, AuditRecord};
use crate::store::{AuditResult, AuditStore};

/// Query parameters for filtering audit records.
#[derive(Debug, Clone, Default)]
pub struct AuditQuery {
    /// Filter by actor id.
    pub actor_id: Option<i64>,
    /// Filter by action.
    pub action: Option<AuditAction>,
    /// Filter by entity name (case-insensitive).
    pub entity_name: Option<String>,
    /// Filter by entity id.
    pub entity_id: Option<i64>,
    /// Filter by start timestamp (inclusive, milliseconds).
    pub from_timestamp: Option<u64>,
    /// Filter by end timestamp (inclusive, milliseconds).
    pub to_timestamp: Option<u64>,
    /// Maximum number of results.
    pub limit: Option<usize>,
    /// Offset for pagination.
    pub offset: Option<usize>,
    /// Sort order (true = newest first).
    pub newest_first: bool,
}

impl AuditQuery {
    /// Create a new empty query, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Check if a record matches this query's filters.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(actor) = self.actor_id {
            if record.actor_id != actor {
                return false;
            }
        }

        if let Some(action) = self.action {
            if record.action != action {
                return false;
            }
        }

        if let Some(ref name) = self.entity_name {
            if !record.entity_name.eq_ignore_ascii_case(name) {
                return false;
            }
        }

        if let Some(entity_id) = self.entity_id {
            if record.entity_id != entity_id {
                return false;
            }
        }

        if let Some(from) = self.from_timestamp {
            if record.timestamp < from {
                return false;
            }
        }

        if let Some(to) = self.to_timestamp {
            if record.timestamp > to {
                return false;
            }
        }

        true
    }

    /// Filter, order and paginate `records`.
    ///
    /// Ordering is by timestamp, ties broken by id, so records created within
    /// the same millisecond keep their creation order.
    pub fn apply<'a, I>(&self, records: I) -> Vec<AuditRecord>
    where
        I: IntoIterator<Item = &'a AuditRecord>,
    {
        let mut results: Vec<AuditRecord> = records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect();

        results.sort_by_key(|r| (r.timestamp, r.id));
        if self.newest_first {
            results.reverse();
        }

        results
            .into_iter()
            .skip(self.offset.unwrap_or(0))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Builder for constructing audit queries against a store.
pub struct AuditQueryBuilder<'a> {
    store: &'a dyn AuditStore,
    query: AuditQuery,
}

impl<'a> AuditQueryBuilder<'a> {
    /// Create a new query builder.
    pub fn new(store: &'a dyn AuditStore) -> Self {
        Self {
            store,
            query: AuditQuery::new(),
        }
    }

    /// Filter by actor id.
    pub fn actor(mut self, actor_id: i64) -> Self {
        self.query.actor_id = Some(actor_id);
        self
    }

    /// Filter by action.
    pub fn action(mut self, action: AuditAction) -> Self {
        self.query.action = Some(action);
        self
    }

    /// Filter by entity name.
    pub fn entity_name(mut self, name: impl Into<String>) -> Self {
        self.query.entity_name = Some(name.into());
        self
    }

    /// Filter by entity (name and id).
    pub fn entity(mut self, name: impl Into<String>, id: i64) -> Self {
        self.query.entity_name = Some(name.into());
        self.query.entity_id = Some(id);
        self
    }

    /// Filter by time range (inclusive, milliseconds).
    pub fn time_range(mut self, from: u64, to: u64) -> Self {
        self.query.from_timestamp = Some(from);
        self.query.to_timestamp = Some(to);
        self
    }

    /// Set maximum results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Set offset for pagination.
    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Sort oldest first.
    pub fn oldest_first(mut self) -> Self {
        self.query.newest_first = false;
        self
    }

    /// Get the built query.
    pub fn build(self) -> AuditQuery {
        self.query
    }

    /// Execute the query.
    pub fn execute(self) -> AuditResult<Vec<AuditRecord>> {
        self.store.execute_query(&self.query)
    }

    /// Count matching records.
    pub fn count(self) -> AuditResult<usize> {
        self.store.count(&self.query)
    }
}
