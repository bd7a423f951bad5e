//! Read-only access to the audit trail

use crate::query::AuditQueryBuilder;
use crate::record::{AuditAction, AuditRecord, AuditRecordId};
use crate::store::{AuditResult, AuditStore};
use serde::Deserialize;
use std::sync::Arc;

/// Optional pagination window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Page {
    /// Maximum number of records.
    pub limit: Option<usize>,
    /// Number of records to skip.
    pub offset: Option<usize>,
}

impl Page {
    /// A window of `limit` records starting at `offset`.
    pub fn new(limit: usize, offset: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    fn apply<'a>(&self, mut builder: AuditQueryBuilder<'a>) -> AuditQueryBuilder<'a> {
        if let Some(limit) = self.limit {
            builder = builder.limit(limit);
        }
        if let Some(offset) = self.offset {
            builder = builder.offset(offset);
        }
        builder
    }
}

/// Queries over persisted audit records. Results are newest first.
#[derive(Clone)]
pub struct AuditQueryService {
    store: Arc<dyn AuditStore>,
}

impl AuditQueryService {
    /// Create a service reading from `store`.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    fn query(&self) -> AuditQueryBuilder<'_> {
        AuditQueryBuilder::new(self.store.as_ref())
    }

    /// Every record.
    pub fn list_all(&self, page: Page) -> AuditResult<Vec<AuditRecord>> {
        page.apply(self.query()).execute()
    }

    /// Records attributed to one actor.
    pub fn list_by_actor(&self, actor_id: i64, page: Page) -> AuditResult<Vec<AuditRecord>> {
        page.apply(self.query().actor(actor_id)).execute()
    }

    /// History of a single record.
    pub fn list_by_entity(
        &self,
        entity_name: &str,
        entity_id: i64,
        page: Page,
    ) -> AuditResult<Vec<AuditRecord>> {
        page.apply(self.query().entity(entity_name, entity_id)).execute()
    }

    /// Records of one kind of change.
    pub fn list_by_action(&self, action: AuditAction, page: Page) -> AuditResult<Vec<AuditRecord>> {
        page.apply(self.query().action(action)).execute()
    }

    /// A single record.
    pub fn get_by_id(&self, id: AuditRecordId) -> AuditResult<Option<AuditRecord>> {
        self.store.get(id)
    }
}

impl std::fmt::Debug for AuditQueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditQueryService").finish_non_exhaustive()
    }
}
