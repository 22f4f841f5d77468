//! # Product Repository
//!
//! Catalog cache. The product table is owned by the remote authority and
//! rebuilt from snapshots during pull; the client only ever reads it.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use duka_core::Product;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts or updates a product.
    pub async fn upsert(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, category, stock)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                category = excluded.category,
                stock = excluded.stock
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.category)
        .bind(product.stock)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query("SELECT id, name, price, category, stock FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(decode_row).transpose()
    }

    /// Lists all products, ordered by name.
    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let rows =
            sqlx::query("SELECT id, name, price, category, stock FROM products ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(decode_row).collect()
    }

    /// Replaces the whole table with a reconciled snapshot.
    pub async fn replace_all(&self, products: &[Product]) -> DbResult<()> {
        debug!(count = products.len(), "Replacing products table");

        let mut db_tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM products")
            .execute(&mut *db_tx)
            .await?;

        for product in products {
            sqlx::query(
                r#"
                INSERT INTO products (id, name, price, category, stock)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )
            .bind(&product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(&product.category)
            .bind(product.stock)
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;
        Ok(())
    }
}

fn decode_row(row: SqliteRow) -> DbResult<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price: row.try_get("price")?,
        category: row.try_get("category")?,
        stock: row.try_get("stock")?,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn product(id: &str, name: &str, price: i64) -> Product {
        Product {
            id: id.to_string(),
            name: name.to_string(),
            price,
            category: Some("Drinks".to_string()),
            stock: Some(24),
        }
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.upsert(&product("p1", "Soda", 250)).await.unwrap();
        repo.upsert(&product("p1", "Soda 500ml", 300)).await.unwrap();

        let loaded = repo.get_by_id("p1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Soda 500ml");
        assert_eq!(loaded.price, 300);
    }

    #[tokio::test]
    async fn test_replace_all_drops_stale_products() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.products();

        repo.upsert(&product("p1", "Soda", 250)).await.unwrap();
        repo.replace_all(&[product("p2", "Bread", 300)]).await.unwrap();

        assert!(repo.get_by_id("p1").await.unwrap().is_none());
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }
}
