//! # Local Store
//!
//! The device's current optimistic view of the world: in-memory maps of
//! transactions, credit customers and products, loaded from SQLite at
//! startup. Mutations land here memory-first; their durable half is the
//! caller's transactional outbox write, which pairs each entity with its
//! queue operation.
//!
//! ## Merge Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    apply_remote(snapshot)                               │
//! │                                                                         │
//! │  For each entity id:                                                   │
//! │                                                                         │
//! │    in snapshot, NOT queue-protected  → remote version wins             │
//! │    in snapshot, queue-protected      → LOCAL version retained          │
//! │    local only,  queue-protected      → retained (created offline,     │
//! │                                         push not yet acknowledged)     │
//! │    local only,  NOT protected        → dropped (server authoritative) │
//! │                                                                         │
//! │  Products: server wins wholesale - the catalog is never edited         │
//! │  locally, so there is nothing to protect.                              │
//! │                                                                         │
//! │  Protection ends the moment the entity's pending operation is          │
//! │  acknowledged; the next pull then overwrites with the confirmed        │
//! │  remote state.                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use duka_core::{CoreError, CreditCustomer, Product, Transaction};
use duka_db::Database;

use crate::client::RemoteSnapshot;
use crate::error::SyncResult;

// =============================================================================
// Local Store
// =============================================================================

#[derive(Default)]
struct StoreState {
    transactions: HashMap<String, Transaction>,
    credit_customers: HashMap<String, CreditCustomer>,
    products: HashMap<String, Product>,
}

/// Optimistic local state, owned exclusively by this store.
///
/// Callers get owned snapshots, never references into the maps.
pub struct LocalStore {
    inner: RwLock<StoreState>,
    db: Database,
}

impl LocalStore {
    /// Loads the store from the local database.
    pub async fn load(db: Database) -> SyncResult<Self> {
        let transactions = db.transactions().list_all().await?;
        let credit_customers = db.credit_customers().list_all().await?;
        let products = db.products().list_all().await?;

        debug!(
            transactions = transactions.len(),
            credit_customers = credit_customers.len(),
            products = products.len(),
            "Loaded local store"
        );

        let state = StoreState {
            transactions: transactions.into_iter().map(|t| (t.id.clone(), t)).collect(),
            credit_customers: credit_customers
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
            products: products.into_iter().map(|p| (p.id.clone(), p)).collect(),
        };

        Ok(LocalStore {
            inner: RwLock::new(state),
            db,
        })
    }

    // =========================================================================
    // Optimistic Writes
    // =========================================================================

    /// Records a completed sale in memory.
    ///
    /// The durable half is written by the caller's transactional outbox
    /// write, paired with the sale's queue operation.
    pub async fn record_transaction(&self, tx: Transaction) {
        let mut inner = self.inner.write().await;
        inner.transactions.insert(tx.id.clone(), tx);
    }

    /// Adds a credit customer in memory.
    ///
    /// The durable half is written by the caller's transactional outbox
    /// write, paired with the customer's queue operation.
    pub async fn add_credit_customer(&self, customer: CreditCustomer) {
        let mut inner = self.inner.write().await;
        inner.credit_customers.insert(customer.id.clone(), customer);
    }

    /// Adjusts a customer's balance by `delta` in memory and returns the
    /// new absolute balance. Durability follows the same outbox pairing as
    /// [`add_credit_customer`](Self::add_credit_customer).
    pub async fn adjust_credit_balance(&self, id: &str, delta: i64) -> SyncResult<i64> {
        let mut inner = self.inner.write().await;
        let customer = inner
            .credit_customers
            .get_mut(id)
            .ok_or_else(|| CoreError::CreditCustomerNotFound(id.to_string()))?;
        customer.balance += delta;

        Ok(customer.balance)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Looks up a transaction.
    pub async fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.inner.read().await.transactions.get(id).cloned()
    }

    /// Looks up a credit customer.
    pub async fn get_credit_customer(&self, id: &str) -> Option<CreditCustomer> {
        self.inner.read().await.credit_customers.get(id).cloned()
    }

    /// Looks up a product.
    pub async fn get_product(&self, id: &str) -> Option<Product> {
        self.inner.read().await.products.get(id).cloned()
    }

    /// All transactions, oldest first. Owned snapshot for the aggregator.
    pub async fn transactions_snapshot(&self) -> Vec<Transaction> {
        let inner = self.inner.read().await;
        let mut txs: Vec<Transaction> = inner.transactions.values().cloned().collect();
        txs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        txs
    }

    /// All credit customers, sorted by name.
    pub async fn credit_customers_snapshot(&self) -> Vec<CreditCustomer> {
        let inner = self.inner.read().await;
        let mut customers: Vec<CreditCustomer> =
            inner.credit_customers.values().cloned().collect();
        customers.sort_by(|a, b| a.name.cmp(&b.name));
        customers
    }

    /// The product catalog, sorted by name.
    pub async fn products_snapshot(&self) -> Vec<Product> {
        let inner = self.inner.read().await;
        let mut products: Vec<Product> = inner.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Merges an authoritative snapshot.
    ///
    /// `protected` is the set of entity ids with pending queue
    /// operations; those entities keep their local version until their
    /// operation is acknowledged. Everything else follows the server.
    pub async fn apply_remote(&self, snapshot: RemoteSnapshot, protected: &HashSet<String>) {
        let mut retained_local = 0usize;

        let (transactions, credit_customers, products) = {
            let mut inner = self.inner.write().await;

            let mut transactions: HashMap<String, Transaction> = snapshot
                .transactions
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect();
            for (id, tx) in inner.transactions.drain() {
                if protected.contains(&id) {
                    retained_local += 1;
                    transactions.insert(id, tx);
                }
            }

            let mut credit_customers: HashMap<String, CreditCustomer> = snapshot
                .credit_customers
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect();
            for (id, customer) in inner.credit_customers.drain() {
                if protected.contains(&id) {
                    retained_local += 1;
                    credit_customers.insert(id, customer);
                }
            }

            let products: HashMap<String, Product> = snapshot
                .products
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect();

            inner.transactions = transactions.clone();
            inner.credit_customers = credit_customers.clone();
            inner.products = products.clone();

            (transactions, credit_customers, products)
        };

        debug!(
            transactions = transactions.len(),
            credit_customers = credit_customers.len(),
            products = products.len(),
            retained_local,
            "Applied remote snapshot"
        );

        // Durable rebuild, best-effort. The in-memory view is already
        // reconciled either way. The rebuilds leave rows with pending
        // queue entries untouched, so an outbox write that commits between
        // the lock release above and this point cannot be deleted.
        let txs: Vec<Transaction> = transactions.into_values().collect();
        if let Err(e) = self.db.transactions().replace_reconciled(&txs).await {
            warn!(error = %e, "Failed to persist reconciled transactions");
        }

        let customers: Vec<CreditCustomer> = credit_customers.into_values().collect();
        if let Err(e) = self.db.credit_customers().replace_reconciled(&customers).await {
            warn!(error = %e, "Failed to persist reconciled credit customers");
        }

        let catalog: Vec<Product> = products.into_values().collect();
        if let Err(e) = self.db.products().replace_all(&catalog).await {
            warn!(error = %e, "Failed to persist reconciled products");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use duka_core::{LineItem, PaymentMethod, SyncOperation, SyncOperationKind, TransactionStatus};
    use duka_db::DbConfig;
    use serde_json::json;

    async fn test_store() -> LocalStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        LocalStore::load(db).await.unwrap()
    }

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            items: vec![LineItem {
                product_id: "p1".to_string(),
                name: "Soda".to_string(),
                price: 250,
                quantity: 1,
                category: None,
            }],
            total: 250,
            payment_method: PaymentMethod::Cash,
            timestamp: Utc::now(),
            cashier: Some("Alice".to_string()),
            credit_customer_id: None,
            credit_customer_name: None,
            status: TransactionStatus::Completed,
        }
    }

    fn customer(id: &str, name: &str, balance: i64) -> CreditCustomer {
        CreditCustomer {
            id: id.to_string(),
            name: name.to_string(),
            phone: None,
            balance,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_record_and_snapshot() {
        let store = test_store().await;
        store.record_transaction(tx("t1")).await;
        store.record_transaction(tx("t2")).await;

        let snapshot = store.transactions_snapshot().await;
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_adjust_balance() {
        let store = test_store().await;
        store.add_credit_customer(customer("c1", "Wanjiku", 100)).await;

        let balance = store.adjust_credit_balance("c1", 500).await.unwrap();
        assert_eq!(balance, 600);

        let loaded = store.get_credit_customer("c1").await.unwrap();
        assert_eq!(loaded.balance, 600);
    }

    #[tokio::test]
    async fn test_adjust_balance_missing_customer() {
        let store = test_store().await;
        let err = store.adjust_credit_balance("nope", 100).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_apply_remote_rebuild_spares_outbox_committed_sale() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let store = LocalStore::load(db.clone()).await.unwrap();

        // A sale committed through the outbox after the store loaded, as
        // checkout does while a pull may be merging concurrently.
        let sale = tx("t-checkout");
        let op = SyncOperation::new(
            SyncOperationKind::CreateTransaction,
            "t-checkout",
            json!({ "id": "t-checkout" }),
        );
        db.transactions().insert_with_queue_op(&sale, &op).await.unwrap();

        // A merge that has never heard of the sale must not delete its
        // row: the pending queue entry guards it.
        store
            .apply_remote(RemoteSnapshot::default(), &HashSet::new())
            .await;

        let persisted = db.transactions().get_by_id("t-checkout").await.unwrap();
        assert!(persisted.is_some());
    }

    #[tokio::test]
    async fn test_apply_remote_server_wins_for_unprotected() {
        let store = test_store().await;
        store.add_credit_customer(customer("c1", "Wanjiku", 100)).await;

        let snapshot = RemoteSnapshot {
            credit_customers: vec![customer("c1", "Wanjiku", 900)],
            ..Default::default()
        };
        store.apply_remote(snapshot, &HashSet::new()).await;

        let merged = store.get_credit_customer("c1").await.unwrap();
        assert_eq!(merged.balance, 900);
    }

    #[tokio::test]
    async fn test_apply_remote_keeps_queue_protected_entities() {
        let store = test_store().await;
        store.add_credit_customer(customer("c1", "Wanjiku", 600)).await;

        // c1 has a pending balance update in the queue: the stale remote
        // balance must not clobber the local one.
        let snapshot = RemoteSnapshot {
            credit_customers: vec![customer("c1", "Wanjiku", 100)],
            ..Default::default()
        };
        let protected: HashSet<String> = ["c1".to_string()].into_iter().collect();
        store.apply_remote(snapshot, &protected).await;

        let merged = store.get_credit_customer("c1").await.unwrap();
        assert_eq!(merged.balance, 600);
    }

    #[tokio::test]
    async fn test_apply_remote_retains_protected_local_only_entities() {
        let store = test_store().await;
        store.record_transaction(tx("t-offline")).await;

        // Created offline, not yet pushed: absent from the snapshot but
        // protected by its pending create operation.
        let protected: HashSet<String> = ["t-offline".to_string()].into_iter().collect();
        store.apply_remote(RemoteSnapshot::default(), &protected).await;

        assert_eq!(store.transactions_snapshot().await.len(), 1);
    }

    #[tokio::test]
    async fn test_apply_remote_drops_unprotected_local_only_entities() {
        let store = test_store().await;
        store.record_transaction(tx("t-stale")).await;

        store
            .apply_remote(RemoteSnapshot::default(), &HashSet::new())
            .await;

        assert!(store.transactions_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_remote_replaces_catalog() {
        let store = test_store().await;

        let snapshot = RemoteSnapshot {
            products: vec![Product {
                id: "p1".to_string(),
                name: "Bread".to_string(),
                price: 550,
                category: None,
                stock: Some(10),
            }],
            ..Default::default()
        };
        store.apply_remote(snapshot, &HashSet::new()).await;

        let catalog = store.products_snapshot().await;
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].name, "Bread");
    }
}
