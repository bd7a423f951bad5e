//! Audit store trait

use crate::query::{AuditQuery, AuditQueryBuilder};
use crate::record::{AuditDraft, AuditRecord, AuditRecordId};
use std::future::Future;
use std::pin::Pin;

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Errors that can occur during audit operations.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// Failed to write an audit record.
    #[error("Failed to write audit record: {0}")]
    WriteError(String),

    /// Failed to read audit records.
    #[error("Failed to read audit records: {0}")]
    ReadError(String),

    /// Storage is full.
    #[error("Audit storage is full")]
    StorageFull,

    /// Serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(String),
}

/// Storage backend for audit records.
///
/// Stores assign ids and timestamps; records are never updated afterwards.
pub trait AuditStore: Send + Sync {
    /// Persist a draft and return the stored record.
    fn create(&self, draft: AuditDraft) -> AuditResult<AuditRecord>;

    /// Persist a draft asynchronously.
    fn create_async(
        &self,
        draft: AuditDraft,
    ) -> Pin<Box<dyn Future<Output = AuditResult<AuditRecord>> + Send + '_>> {
        Box::pin(async move { self.create(draft) })
    }

    /// Get a record by id.
    fn get(&self, id: AuditRecordId) -> AuditResult<Option<AuditRecord>>;

    /// Create a query builder.
    fn query(&self) -> AuditQueryBuilder<'_>
    where
        Self: Sized,
    {
        AuditQueryBuilder::new(self)
    }

    /// Execute a query and return matching records.
    fn execute_query(&self, query: &AuditQuery) -> AuditResult<Vec<AuditRecord>>;

    /// Count records matching the query, ignoring its limit and offset.
    fn count(&self, query: &AuditQuery) -> AuditResult<usize>;

    /// Get the total number of stored records.
    fn total_count(&self) -> AuditResult<usize>;

    /// Remove all records (administration and tests only).
    fn clear(&self) -> AuditResult<()>;

    /// Flush buffered records to storage.
    fn flush(&self) -> AuditResult<()>;
}
