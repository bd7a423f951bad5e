//! Persisting drafts and tracking in-flight audit work

use crate::record::{AuditDraft, AuditRecord};
use crate::store::AuditStore;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

/// Marks one unit of audit work as outstanding until dropped.
pub struct PendingGuard {
    pending: Arc<Pending>,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if self.pending.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.pending.idle.notify_waiters();
        }
    }
}

/// Writes audit drafts to a store.
///
/// Failures are logged and never retried; the request that triggered the
/// record has already been answered by the time it is written.
#[derive(Clone)]
pub struct AuditRecorder {
    store: Arc<dyn AuditStore>,
    pending: Arc<Pending>,
}

impl AuditRecorder {
    /// Create a recorder writing to `store`.
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self {
            store,
            pending: Arc::new(Pending::default()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn AuditStore> {
        &self.store
    }

    /// Persist a draft, logging the outcome.
    ///
    /// Returns the stored record, or `None` when the store rejected it.
    pub async fn record(&self, draft: AuditDraft) -> Option<AuditRecord> {
        let label = draft.operation_label.clone();
        match self.store.create_async(draft).await {
            Ok(record) => {
                tracing::info!(
                    audit_id = record.id,
                    actor_id = record.actor_id,
                    entity = %record.entity_name,
                    entity_id = record.entity_id,
                    action = %record.action,
                    "Audit record created for {}",
                    record.operation_label
                );
                Some(record)
            }
            Err(err) => {
                tracing::error!(error = %err, operation = %label, "Failed to persist audit record");
                None
            }
        }
    }

    /// Count one unit of outstanding work until the guard is dropped.
    pub fn track(&self) -> PendingGuard {
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        PendingGuard {
            pending: Arc::clone(&self.pending),
        }
    }

    /// Number of outstanding units of work.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Wait until no audit work is outstanding.
    pub async fn settle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for AuditRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditRecorder")
            .field("pending", &self.pending())
            .finish()
    }
}
