//! # Sync Queue Repository
//!
//! Durable half of the offline sync queue.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  LOCAL OPERATION (e.g., submit_sale)                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. INSERT INTO transactions (...)                             │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO sync_queue (id, kind, entity_id, payload)      │   │
//! │  │     VALUES (?, 'create-transaction', ?, <full sale JSON>)      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail (atomicity guaranteed)             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                SYNC ENGINE (async, duka-sync)                   │   │
//! │  │                                                                 │   │
//! │  │  1. load_all() at startup → rebuild in-memory queue            │   │
//! │  │  2. On remote ack: delete(id)                                  │   │
//! │  │  3. On failure:   record_attempt(id)                           │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  KEY GUARANTEES:                                                       │
//! │  • A sale is never recorded without its queue entry                    │
//! │  • Offline? No problem - entries queue up in FIFO order                │
//! │  • Restart? load_all() restores the exact pending set                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use duka_core::{SyncOperation, SyncOperationKind};

/// Repository for durable sync queue operations.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    /// Creates a new SyncQueueRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Persists a queue operation.
    ///
    /// `position` is assigned by SQLite (AUTOINCREMENT) so insertion order
    /// is the replay order.
    pub async fn insert(&self, op: &SyncOperation) -> DbResult<()> {
        debug!(id = %op.id, kind = %op.kind, "Persisting queue operation");
        insert_op(&self.pool, op).await
    }

    /// Loads every pending operation, oldest first.
    ///
    /// Called once at startup to rebuild the in-memory queue.
    pub async fn load_all(&self) -> DbResult<Vec<SyncOperation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, kind, entity_id, payload, enqueued_at, attempts
            FROM sync_queue
            ORDER BY position ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Removes an acknowledged operation. Idempotent: deleting an id that
    /// is already gone is not an error.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Increments the attempt counter after a failed push.
    pub async fn record_attempt(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE sync_queue SET attempts = attempts + 1 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Counts pending operations.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Inserts an operation through any executor, so callers can bundle the
/// write into a larger transaction (see `TransactionRepository`).
pub(crate) async fn insert_op<'e, E>(executor: E, op: &SyncOperation) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let payload = op.payload.to_string();

    sqlx::query(
        r#"
        INSERT INTO sync_queue (id, kind, entity_id, payload, enqueued_at, attempts)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&op.id)
    .bind(op.kind.to_string())
    .bind(&op.entity_id)
    .bind(payload)
    .bind(op.enqueued_at)
    .bind(op.attempts)
    .execute(executor)
    .await?;

    Ok(())
}

fn decode_row(row: SqliteRow) -> DbResult<SyncOperation> {
    let id: String = row.try_get("id")?;
    let kind: String = row.try_get("kind")?;
    let payload: String = row.try_get("payload")?;

    let kind = SyncOperationKind::from_str(&kind)
        .map_err(|e| DbError::QueryFailed(format!("sync_queue {id}: {e}")))?;
    let payload = serde_json::from_str(&payload)
        .map_err(|e| DbError::corrupt_json("sync_queue", &id, e))?;

    Ok(SyncOperation {
        id,
        kind,
        entity_id: row.try_get("entity_id")?,
        payload,
        enqueued_at: row.try_get("enqueued_at")?,
        attempts: row.try_get("attempts")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
