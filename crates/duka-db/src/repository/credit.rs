//! # Credit Customer Repository
//!
//! Database operations for credit customers and their running balances.
//!
//! Customer mutations are billable and must reach the remote authority, so
//! the write paths here pair the entity write with its sync queue entry in
//! one SQLite transaction, the same outbox pairing `TransactionRepository`
//! uses for sales. A customer or balance change can never be persisted
//! without its pending push.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::queue;
use duka_core::{CreditCustomer, SyncOperation};

/// Repository for credit customer database operations.
#[derive(Debug, Clone)]
pub struct CreditCustomerRepository {
    pool: SqlitePool,
}

impl CreditCustomerRepository {
    /// Creates a new CreditCustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CreditCustomerRepository { pool }
    }

    /// Inserts a new credit customer.
    pub async fn insert(&self, customer: &CreditCustomer) -> DbResult<()> {
        debug!(id = %customer.id, name = %customer.name, "Inserting credit customer");

        insert_customer(&self.pool, customer).await
    }

    /// Inserts a customer and their outbox entry in one database
    /// transaction: either both land or neither does.
    pub async fn insert_with_queue_op(
        &self,
        customer: &CreditCustomer,
        op: &SyncOperation,
    ) -> DbResult<()> {
        debug!(id = %customer.id, op_id = %op.id, "Inserting credit customer with queue operation");

        let mut db_tx = self.pool.begin().await?;

        insert_customer(&mut *db_tx, customer).await?;
        queue::insert_op(&mut *db_tx, op).await?;

        db_tx.commit().await?;
        Ok(())
    }

    /// Sets a customer's balance to an absolute value.
    ///
    /// Returns NotFound if the customer does not exist.
    pub async fn set_balance(&self, id: &str, balance: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE credit_customers SET balance = ?2 WHERE id = ?1")
            .bind(id)
            .bind(balance)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CreditCustomer", id));
        }

        Ok(())
    }

    /// Sets a customer's balance and writes the outbox entry in one
    /// database transaction. An unknown customer rolls both back.
    pub async fn set_balance_with_queue_op(
        &self,
        id: &str,
        balance: i64,
        op: &SyncOperation,
    ) -> DbResult<()> {
        debug!(id = %id, balance, op_id = %op.id, "Updating balance with queue operation");

        let mut db_tx = self.pool.begin().await?;

        let result = sqlx::query("UPDATE credit_customers SET balance = ?2 WHERE id = ?1")
            .bind(id)
            .bind(balance)
            .execute(&mut *db_tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls it back; no orphan queue row.
            return Err(DbError::not_found("CreditCustomer", id));
        }

        queue::insert_op(&mut *db_tx, op).await?;

        db_tx.commit().await?;
        Ok(())
    }

    /// Gets a credit customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CreditCustomer>> {
        let row = sqlx::query(
            "SELECT id, name, phone, balance, created_at FROM credit_customers WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(decode_row).transpose()
    }

    /// Lists all credit customers, ordered by name.
    pub async fn list_all(&self) -> DbResult<Vec<CreditCustomer>> {
        let rows = sqlx::query(
            "SELECT id, name, phone, balance, created_at FROM credit_customers ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Rebuilds the table from a reconciled snapshot.
    ///
    /// Rows with a pending `sync_queue` entry are never deleted, and the
    /// snapshot does not overwrite a surviving row. Because outbox writes
    /// commit the entity and its queue entry atomically, a customer
    /// mutation committed while a pull is merging can never be lost here.
    pub async fn replace_reconciled(&self, customers: &[CreditCustomer]) -> DbResult<()> {
        debug!(count = customers.len(), "Rebuilding credit_customers table");

        let mut db_tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM credit_customers WHERE id NOT IN (SELECT entity_id FROM sync_queue)",
        )
        .execute(&mut *db_tx)
        .await?;

        for customer in customers {
            sqlx::query(
                r#"
                INSERT INTO credit_customers (id, name, phone, balance, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO NOTHING
                "#,
            )
            .bind(&customer.id)
            .bind(&customer.name)
            .bind(&customer.phone)
            .bind(customer.balance)
            .bind(customer.created_at)
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;
        Ok(())
    }
}

async fn insert_customer<'e, E>(executor: E, customer: &CreditCustomer) -> DbResult<()>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO credit_customers (id, name, phone, balance, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(&customer.id)
    .bind(&customer.name)
    .bind(&customer.phone)
    .bind(customer.balance)
    .bind(customer.created_at)
    .execute(executor)
    .await?;

    Ok(())
}

fn decode_row(row: SqliteRow) -> DbResult<CreditCustomer> {
    Ok(CreditCustomer {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        phone: row.try_get("phone")?,
        balance: row.try_get("balance")?,
        created_at: row.try_get("created_at")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
