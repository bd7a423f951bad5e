//! # trailmark-audit
//!
//! Field-level audit trail for mutating HTTP requests.
//!
//! [`AuditLayer`] captures the state of a record before an update or delete
//! runs, waits until the response has been delivered, and writes an
//! [`AuditRecord`] describing what changed. Records are read back through
//! [`AuditQueryService`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trailmark_audit::{AuditConfig, AuditLayer, AuditRecorder, EntityRegistry, InMemoryAuditStore};
//!
//! let recorder = AuditRecorder::new(Arc::new(InMemoryAuditStore::new()));
//! let registry = EntityRegistry::new().register(&["widgets", "widget"], widgets);
//! let app = App::new()
//!     .layer(AuditLayer::new(registry, verifier, recorder.clone(), AuditConfig::default()));
//!
//! // on shutdown
//! recorder.settle().await;
//! ```

mod controller;
mod diff;
mod file_store;
mod memory_store;
mod query;
mod record;
mod recorder;
mod registry;
mod service;
mod store;

pub use controller::{parse_leading_int, AuditConfig, AuditLayer, AuditTarget, BypassReason};
pub use diff::{deletion_changes, diff, Snapshot};
pub use file_store::FileAuditStore;
pub use memory_store::{InMemoryAuditStore, InMemoryAuditStoreConfig};
pub use query::{AuditQuery, AuditQueryBuilder};
pub use record::{
    now_millis, AuditAction, AuditDraft, AuditRecord, AuditRecordId, ChangeSet, FieldChange,
    UnknownAction, DELETED_FIELD,
};
pub use recorder::{AuditRecorder, PendingGuard};
pub use registry::{AccessorError, EntityRegistry, RecordAccessor};
pub use service::{AuditQueryService, Page};
pub use store::{AuditError, AuditResult, AuditStore};
