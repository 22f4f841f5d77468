//! # Sync Queue
//!
//! Ordered, durable log of pending mutations not yet confirmed by the
//! remote authority.
//!
//! ## Two Halves
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Sync Queue                                      │
//! │                                                                         │
//! │  In-memory (authoritative for this process)                            │
//! │  ┌───────────────────────────────────────────────┐                     │
//! │  │ VecDeque: [op1] [op2] [op3] ...  (FIFO)       │                     │
//! │  └───────────────────────────────────────────────┘                     │
//! │        ▲ loaded at startup          │ best-effort write-through        │
//! │        │                            ▼                                  │
//! │  Durable (survives restarts)                                           │
//! │  ┌───────────────────────────────────────────────┐                     │
//! │  │ sync_queue table (AUTOINCREMENT position)     │                     │
//! │  └───────────────────────────────────────────────┘                     │
//! │                                                                         │
//! │  RULES:                                                                │
//! │  • enqueue never fails the caller: memory first, durability            │
//! │    best-effort (a failed disk write logs a warning, the operation      │
//! │    is still held for the process lifetime)                             │
//! │  • acknowledge only on remote ack; idempotent                          │
//! │  • requeue bumps attempts IN PLACE - order is never violated, so a     │
//! │    customer creation always pushes before an update referencing it     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashSet, VecDeque};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use duka_core::SyncOperation;
use duka_db::Database;

use crate::error::SyncResult;

/// FIFO queue of pending sync operations.
pub struct SyncQueue {
    /// Pending operations in push order. Authoritative for this process.
    inner: Mutex<VecDeque<SyncOperation>>,

    /// Durable backing store.
    db: Database,
}

impl SyncQueue {
    /// Rebuilds the queue from the durable table.
    ///
    /// Called once at startup; the stored AUTOINCREMENT positions restore
    /// the exact FIFO order from before the restart.
    pub async fn load(db: Database) -> SyncResult<Self> {
        let pending = db.sync_queue().load_all().await?;
        debug!(count = pending.len(), "Loaded pending sync operations");

        Ok(SyncQueue {
            inner: Mutex::new(pending.into()),
            db,
        })
    }

    /// Appends an operation. Never fails the caller.
    ///
    /// The in-memory append always succeeds; the durable write is
    /// best-effort. If the disk write fails the operation survives for
    /// this process lifetime and the failure is logged.
    pub async fn enqueue(&self, op: SyncOperation) {
        if let Err(e) = self.db.sync_queue().insert(&op).await {
            warn!(id = %op.id, error = %e, "Failed to persist queue operation, holding in memory only");
        }
        self.enqueue_prepersisted(op).await;
    }

    /// Appends an operation whose durable half was already written by a
    /// transactional outbox write (see `TransactionRepository`).
    pub async fn enqueue_prepersisted(&self, op: SyncOperation) {
        let mut inner = self.inner.lock().await;
        debug!(id = %op.id, kind = %op.kind, position = inner.len(), "Enqueued sync operation");
        inner.push_back(op);
    }

    /// Returns up to `n` oldest operations without removing them.
    pub async fn peek_batch(&self, n: usize) -> Vec<SyncOperation> {
        let inner = self.inner.lock().await;
        inner.iter().take(n).cloned().collect()
    }

    /// Removes an operation after confirmed remote success.
    ///
    /// Idempotent: acknowledging an id that is already gone is a no-op.
    pub async fn acknowledge(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|op| op.id != id);

        if inner.len() < before {
            debug!(id = %id, "Acknowledged sync operation");
        }
        drop(inner);

        if let Err(e) = self.db.sync_queue().delete(id).await {
            warn!(id = %id, error = %e, "Failed to delete acknowledged operation from durable queue");
        }
    }

    /// Records a failed push attempt, leaving the operation at its
    /// original position. Order is preserved so causal chains (create
    /// before update) stay intact.
    pub async fn requeue(&self, id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(op) = inner.iter_mut().find(|op| op.id == id) {
            op.attempts += 1;
            debug!(id = %id, attempts = op.attempts, "Requeued sync operation in place");
        }
        drop(inner);

        if let Err(e) = self.db.sync_queue().record_attempt(id).await {
            warn!(id = %id, error = %e, "Failed to record attempt in durable queue");
        }
    }

    /// Number of pending operations.
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.len()
    }

    /// True if nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Entity ids referenced by pending operations.
    ///
    /// Feeds the store's merge protection: these entities keep their
    /// local version when a remote snapshot is applied.
    pub async fn pending_entity_ids(&self) -> HashSet<String> {
        let inner = self.inner.lock().await;
        inner.iter().map(|op| op.entity_id.clone()).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use duka_core::SyncOperationKind;
    use duka_db::DbConfig;
    use serde_json::json;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn op(kind: SyncOperationKind, entity_id: &str) -> SyncOperation {
        SyncOperation::new(kind, entity_id, json!({ "id": entity_id }))
    }

    #[tokio::test]
    async fn test_enqueue_peek_fifo() {
        let queue = SyncQueue::load(test_db().await).await.unwrap();

        let a = op(SyncOperationKind::AddCreditCustomer, "c1");
        let b = op(SyncOperationKind::UpdateCreditCustomer, "c1");
        queue.enqueue(a.clone()).await;
        queue.enqueue(b.clone()).await;

        let batch = queue.peek_batch(10).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, a.id);
        assert_eq!(batch[1].id, b.id);

        // Peek does not remove.
        assert_eq!(queue.pending_count().await, 2);
    }

    #[tokio::test]
    async fn test_peek_batch_is_bounded() {
        let queue = SyncQueue::load(test_db().await).await.unwrap();
        for i in 0..5 {
            queue
                .enqueue(op(SyncOperationKind::CreateTransaction, &format!("t{i}")))
                .await;
        }
        assert_eq!(queue.peek_batch(3).await.len(), 3);
    }

    #[tokio::test]
    async fn test_acknowledge_is_idempotent() {
        let queue = SyncQueue::load(test_db().await).await.unwrap();

        let a = op(SyncOperationKind::CreateTransaction, "t1");
        queue.enqueue(a.clone()).await;

        queue.acknowledge(&a.id).await;
        queue.acknowledge(&a.id).await;

        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_requeue_preserves_position() {
        let queue = SyncQueue::load(test_db().await).await.unwrap();

        let a = op(SyncOperationKind::AddCreditCustomer, "c1");
        let b = op(SyncOperationKind::UpdateCreditCustomer, "c1");
        queue.enqueue(a.clone()).await;
        queue.enqueue(b.clone()).await;

        // A fails repeatedly; it must stay ahead of B every time.
        queue.requeue(&a.id).await;
        queue.requeue(&a.id).await;

        let batch = queue.peek_batch(10).await;
        assert_eq!(batch[0].id, a.id);
        assert_eq!(batch[0].attempts, 2);
        assert_eq!(batch[1].id, b.id);
        assert_eq!(batch[1].attempts, 0);
    }

    #[tokio::test]
    async fn test_queue_survives_restart_in_order() {
        let db = test_db().await;

        let a = op(SyncOperationKind::CreateTransaction, "t1");
        let b = op(SyncOperationKind::CreateTransaction, "t2");
        {
            let queue = SyncQueue::load(db.clone()).await.unwrap();
            queue.enqueue(a.clone()).await;
            queue.enqueue(b.clone()).await;
        }

        // Same database, fresh queue: simulates a process restart.
        let revived = SyncQueue::load(db).await.unwrap();
        let batch = revived.peek_batch(10).await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].id, a.id);
        assert_eq!(batch[1].id, b.id);
    }

    #[tokio::test]
    async fn test_pending_entity_ids() {
        let queue = SyncQueue::load(test_db().await).await.unwrap();
        queue
            .enqueue(op(SyncOperationKind::AddCreditCustomer, "c1"))
            .await;
        queue
            .enqueue(op(SyncOperationKind::UpdateCreditCustomer, "c1"))
            .await;
        queue
            .enqueue(op(SyncOperationKind::CreateTransaction, "t1"))
            .await;

        let ids = queue.pending_entity_ids().await;
        assert_eq!(ids.len(), 2);
        assert!(ids.contains("c1"));
        assert!(ids.contains("t1"));
    }
}
