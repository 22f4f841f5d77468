//! # Transaction Repository
//!
//! Database operations for completed sales.
//!
//! Line items are stored as a JSON column rather than a child table: a sale
//! is immutable once recorded, is always read whole, and its items travel
//! as one payload over the sync wire anyway.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::queue;
use duka_core::{PaymentMethod, SyncOperation, Transaction, TransactionStatus};

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    /// Inserts a transaction.
    pub async fn insert(&self, tx: &Transaction) -> DbResult<()> {
        debug!(id = %tx.id, total = tx.total, "Inserting transaction");

        insert_tx(&self.pool, tx).await
    }

    /// Inserts a transaction and its outbox entry in one database
    /// transaction.
    ///
    /// This is the write path for checkout: either both the sale and the
    /// queued sync operation land, or neither does. A sale can never exist
    /// locally without a pending push, and a push can never reference a
    /// sale that was rolled back.
    pub async fn insert_with_queue_op(
        &self,
        tx: &Transaction,
        op: &SyncOperation,
    ) -> DbResult<()> {
        debug!(id = %tx.id, op_id = %op.id, "Inserting transaction with queue operation");

        let mut db_tx = self.pool.begin().await?;

        insert_tx(&mut *db_tx, tx).await?;
        queue::insert_op(&mut *db_tx, op).await?;

        db_tx.commit().await?;
        Ok(())
    }

    /// Gets a transaction by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Transaction>> {
        let row = sqlx::query(
            r#"
            SELECT id, items, total, payment_method, timestamp,
                   cashier, credit_customer_id, credit_customer_name, status
            FROM transactions
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    /// Lists all transactions, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<Transaction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, items, total, payment_method, timestamp,
                   cashier, credit_customer_id, credit_customer_name, status
            FROM transactions
            ORDER BY timestamp ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Rebuilds the table from a reconciled snapshot.
    ///
    /// Delete-then-insert in one database transaction, so readers never
    /// observe a half-rebuilt table. Rows with a pending `sync_queue` entry
    /// are never deleted, and the snapshot does not overwrite a surviving
    /// row: checkout commits the sale and its queue entry atomically, so a
    /// sale committed while a pull is merging keeps its row here.
    pub async fn replace_reconciled(&self, txs: &[Transaction]) -> DbResult<()> {
        debug!(count = txs.len(), "Rebuilding transactions table");

        let mut db_tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM transactions WHERE id NOT IN (SELECT entity_id FROM sync_queue)")
            .execute(&mut *db_tx)
            .await?;

        for tx in txs {
            insert_tx_if_absent(&mut *db_tx, tx).await?;
        }

        db_tx.commit().await?;
        Ok(())
    }

    /// Counts stored transactions.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

async fn insert_tx<'e, E>(executor: E, tx: &Transaction) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let items =
        serde_json::to_string(&tx.items).map_err(|e| DbError::corrupt_json("transaction", &tx.id, e))?;

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, items, total, payment_method, timestamp,
            cashier, credit_customer_id, credit_customer_name, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&tx.id)
    .bind(items)
    .bind(tx.total)
    .bind(tx.payment_method)
    .bind(tx.timestamp)
    .bind(&tx.cashier)
    .bind(&tx.credit_customer_id)
    .bind(&tx.credit_customer_name)
    .bind(tx.status)
    .execute(executor)
    .await?;

    Ok(())
}

async fn insert_tx_if_absent<'e, E>(executor: E, tx: &Transaction) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let items =
        serde_json::to_string(&tx.items).map_err(|e| DbError::corrupt_json("transaction", &tx.id, e))?;

    sqlx::query(
        r#"
        INSERT INTO transactions (
            id, items, total, payment_method, timestamp,
            cashier, credit_customer_id, credit_customer_name, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO NOTHING
        "#,
    )
    .bind(&tx.id)
    .bind(items)
    .bind(tx.total)
    .bind(tx.payment_method)
    .bind(tx.timestamp)
    .bind(&tx.cashier)
    .bind(&tx.credit_customer_id)
    .bind(&tx.credit_customer_name)
    .bind(tx.status)
    .execute(executor)
    .await?;

    Ok(())
}

fn decode_row(row: SqliteRow) -> DbResult<Transaction> {
    let id: String = row.try_get("id")?;
    let items: String = row.try_get("items")?;
    let items =
        serde_json::from_str(&items).map_err(|e| DbError::corrupt_json("transaction", &id, e))?;

    Ok(Transaction {
        id,
        items,
        total: row.try_get("total")?,
        payment_method: row.try_get::<PaymentMethod, _>("payment_method")?,
        timestamp: row.try_get("timestamp")?,
        cashier: row.try_get("cashier")?,
        credit_customer_id: row.try_get("credit_customer_id")?,
        credit_customer_name: row.try_get("credit_customer_name")?,
        status: row.try_get::<TransactionStatus, _>("status")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
