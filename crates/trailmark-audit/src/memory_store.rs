//! In-memory audit store implementation

use crate::query::AuditQuery;
use crate::record::{now_millis, AuditDraft, AuditRecord, AuditRecordId};
use crate::store::{AuditError, AuditResult, AuditStore};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Configuration for the in-memory audit store.
///
/// The default keeps every record. A bound is a retention policy and has to
/// be asked for.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAuditStoreConfig {
    /// Maximum number of records to keep, unbounded when `None`.
    pub max_records: Option<usize>,
    /// Whether to drop the oldest record when full instead of failing.
    pub evict_oldest: bool,
}

#[derive(Default)]
struct Inner {
    records: VecDeque<AuditRecord>,
    last_id: AuditRecordId,
}

/// In-memory audit store (development and tests).
///
/// Ids start at 1 and are never reused, even after eviction or `clear`.
pub struct InMemoryAuditStore {
    inner: RwLock<Inner>,
    config: InMemoryAuditStoreConfig,
}

impl InMemoryAuditStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::with_config(InMemoryAuditStoreConfig::default())
    }

    /// Create a store with a custom configuration.
    pub fn with_config(config: InMemoryAuditStoreConfig) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(config.max_records.unwrap_or(0).min(1000)),
                last_id: 0,
            }),
            config,
        }
    }

    /// Create a ring-buffer store holding at most `max_records`.
    pub fn bounded(max_records: usize) -> Self {
        Self::with_config(InMemoryAuditStoreConfig {
            max_records: Some(max_records),
            evict_oldest: true,
        })
    }

    fn read(&self) -> AuditResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| AuditError::ReadError(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> AuditResult<std::sync::RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| AuditError::WriteError(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for InMemoryAuditStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditStore for InMemoryAuditStore {
    fn create(&self, draft: AuditDraft) -> AuditResult<AuditRecord> {
        let mut inner = self.write()?;

        if let Some(max) = self.config.max_records {
            if inner.records.len() >= max {
                if !self.config.evict_oldest || max == 0 {
                    return Err(AuditError::StorageFull);
                }
                if let Some(evicted) = inner.records.pop_front() {
                    tracing::warn!(
                        evicted_id = evicted.id,
                        max_records = max,
                        "Audit store full, evicted oldest record"
                    );
                }
            }
        }

        inner.last_id += 1;
        let record = draft.into_record(inner.last_id, now_millis());
        inner.records.push_back(record.clone());
        Ok(record)
    }

    fn get(&self, id: AuditRecordId) -> AuditResult<Option<AuditRecord>> {
        Ok(self.read()?.records.iter().find(|r| r.id == id).cloned())
    }

    fn execute_query(&self, query: &AuditQuery) -> AuditResult<Vec<AuditRecord>> {
        Ok(query.apply(&self.read()?.records))
    }

    fn count(&self, query: &AuditQuery) -> AuditResult<usize> {
        Ok(self
            .read()?
            .records
            .iter()
            .filter(|r| query.matches(r))
            .count())
    }

    fn total_count(&self) -> AuditResult<usize> {
        Ok(self.read()?.records.len())
    }

    fn clear(&self) -> AuditResult<()> {
        self.write()?.records.clear();
        Ok(())
    }

    fn flush(&self) -> AuditResult<()> {
        Ok(())
    }
}
