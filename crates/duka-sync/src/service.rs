//! # POS Service
//!
//! The offline-first facade the till talks to. Every operation completes
//! against local state without touching the network; synchronization is
//! the engine's problem.
//!
//! ## Write Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       submit_sale()                                     │
//! │                                                                         │
//! │  validate ──▶ build Transaction ──▶ ONE SQLite transaction:            │
//! │                                       sale row + queue row             │
//! │                                     (both land or neither does)        │
//! │                    │                                                   │
//! │                    ├──▶ store (optimistic view)                        │
//! │                    ├──▶ queue (in-memory FIFO)                         │
//! │                    └──▶ engine.trigger_push()   (non-blocking nudge)   │
//! │                                                                         │
//! │  Credit sales additionally bump the customer's balance and enqueue     │
//! │  an update op carrying the ABSOLUTE new balance, ordered after the     │
//! │  sale op.                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use duka_core::{
    report, ClosingReport, CoreError, CreditBalanceUpdate, CreditCustomer, LineItem,
    PaymentMethod, Product, SyncOperation, SyncOperationKind, Transaction, TransactionStatus,
    MAX_SALE_ITEMS,
};
use duka_db::Database;

use crate::client::{HttpRemote, RemoteAuthority};
use crate::config::SyncConfig;
use crate::connection::{ConnectionMonitor, ConnectionState};
use crate::engine::{SyncEngine, SyncEngineHandle};
use crate::error::SyncResult;
use crate::queue::SyncQueue;
use crate::store::LocalStore;

// =============================================================================
// Inputs & Status
// =============================================================================

/// A sale as entered at the till.
#[derive(Debug, Clone)]
pub struct SaleInput {
    /// Line items in entry order.
    pub items: Vec<LineItem>,

    /// How the customer paid.
    pub payment_method: PaymentMethod,

    /// Who rang it up. Optional; missing cashiers report as "Unknown".
    pub cashier: Option<String>,

    /// Target customer for credit sales. Required when paying on credit.
    pub credit_customer_id: Option<String>,
}

/// Sync state snapshot for the UI status strip.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// Last-known connection state.
    pub state: ConnectionState,

    /// Whether the last network attempt succeeded.
    pub is_online: bool,

    /// Number of operations waiting to be pushed.
    pub pending_count: usize,
}

// =============================================================================
// POS Service
// =============================================================================

/// Offline-first POS facade: local store, sync queue, connection monitor
/// and a handle to the background engine.
pub struct PosService {
    store: Arc<LocalStore>,
    queue: Arc<SyncQueue>,
    monitor: Arc<ConnectionMonitor>,
    remote: Arc<dyn RemoteAuthority>,
    db: Database,
    engine: SyncEngineHandle,
}

impl PosService {
    /// Builds the service and its (not yet running) engine.
    ///
    /// The caller owns spawning: `tokio::spawn(engine.run())`. Tests skip
    /// the spawn and drive the engine directly.
    pub async fn new(
        config: SyncConfig,
        db: Database,
        remote: Arc<dyn RemoteAuthority>,
    ) -> SyncResult<(Self, SyncEngine)> {
        let store = Arc::new(LocalStore::load(db.clone()).await?);
        let queue = Arc::new(SyncQueue::load(db.clone()).await?);
        let monitor = Arc::new(ConnectionMonitor::new());

        let (engine, handle) = SyncEngine::new(
            store.clone(),
            queue.clone(),
            monitor.clone(),
            remote.clone(),
            config.sync.clone(),
        );

        let service = PosService {
            store,
            queue,
            monitor,
            remote,
            db,
            engine: handle,
        };

        Ok((service, engine))
    }

    /// Builds the service against the configured HTTP remote and spawns
    /// the engine.
    pub async fn start(config: SyncConfig, db: Database) -> SyncResult<Self> {
        config.validate()?;
        let remote: Arc<dyn RemoteAuthority> = Arc::new(HttpRemote::new(&config)?);

        let (service, engine) = Self::new(config, db, remote).await?;
        tokio::spawn(engine.run());

        info!("POS service started");
        Ok(service)
    }

    /// Stops the background engine gracefully.
    pub async fn shutdown(&self) {
        self.engine.shutdown().await;
        self.db.close().await;
    }

    // =========================================================================
    // Sales
    // =========================================================================

    /// Records a sale. Always succeeds locally when the input is valid,
    /// online or not.
    pub async fn submit_sale(&self, input: SaleInput) -> SyncResult<Transaction> {
        self.validate_sale(&input).await?;

        let credit_customer_name = match &input.credit_customer_id {
            Some(id) => self.store.get_credit_customer(id).await.map(|c| c.name),
            None => None,
        };

        let total = input.items.iter().map(LineItem::line_total).sum();
        let tx = Transaction {
            id: Uuid::new_v4().to_string(),
            items: input.items,
            total,
            payment_method: input.payment_method,
            timestamp: Utc::now(),
            cashier: input.cashier,
            credit_customer_id: input.credit_customer_id.clone(),
            credit_customer_name,
            status: TransactionStatus::Completed,
        };

        let op = SyncOperation::new(
            SyncOperationKind::CreateTransaction,
            &tx.id,
            serde_json::to_value(&tx)?,
        );

        // Sale row and queue row commit atomically; a failed disk write
        // still leaves both halves live in memory for this process.
        if let Err(e) = self.db.transactions().insert_with_queue_op(&tx, &op).await {
            warn!(id = %tx.id, error = %e, "Failed to persist sale, continuing in memory");
        }
        self.store.record_transaction(tx.clone()).await;
        self.queue.enqueue_prepersisted(op).await;

        // A credit sale also moves the customer's balance, as a second
        // operation ordered after the sale.
        if tx.payment_method == PaymentMethod::Credit {
            if let Some(customer_id) = &input.credit_customer_id {
                let balance = self.store.adjust_credit_balance(customer_id, total).await?;
                self.enqueue_balance_update(customer_id, balance).await;
            }
        }

        info!(id = %tx.id, total = tx.total, method = %tx.payment_method, "Sale recorded");
        self.engine.trigger_push();

        Ok(tx)
    }

    async fn validate_sale(&self, input: &SaleInput) -> SyncResult<()> {
        if input.items.is_empty() {
            return Err(CoreError::EmptySale.into());
        }

        if input.items.len() > MAX_SALE_ITEMS {
            return Err(CoreError::SaleTooLarge { max: MAX_SALE_ITEMS }.into());
        }

        for item in &input.items {
            if item.quantity <= 0 {
                return Err(CoreError::InvalidQuantity {
                    name: item.name.clone(),
                    quantity: item.quantity,
                }
                .into());
            }
        }

        if input.payment_method == PaymentMethod::Credit {
            let id = input.credit_customer_id.as_deref().ok_or_else(|| {
                CoreError::Required {
                    field: "credit_customer_id".to_string(),
                }
            })?;

            if self.store.get_credit_customer(id).await.is_none() {
                return Err(CoreError::CreditCustomerNotFound(id.to_string()).into());
            }
        }

        Ok(())
    }

    // =========================================================================
    // Credit Customers
    // =========================================================================

    /// Registers a credit customer with a zero opening balance.
    pub async fn add_credit_customer(
        &self,
        name: impl Into<String>,
        phone: Option<String>,
    ) -> SyncResult<CreditCustomer> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoreError::Required {
                field: "name".to_string(),
            }
            .into());
        }

        let customer = CreditCustomer {
            id: Uuid::new_v4().to_string(),
            name,
            phone,
            balance: 0,
            created_at: Utc::now(),
        };

        let op = SyncOperation::new(
            SyncOperationKind::AddCreditCustomer,
            &customer.id,
            serde_json::to_value(&customer)?,
        );

        // Customer row and queue row commit atomically, the same outbox
        // pairing submit_sale uses.
        if let Err(e) = self
            .db
            .credit_customers()
            .insert_with_queue_op(&customer, &op)
            .await
        {
            warn!(id = %customer.id, error = %e, "Failed to persist credit customer, continuing in memory");
        }
        self.store.add_credit_customer(customer.clone()).await;
        self.queue.enqueue_prepersisted(op).await;

        info!(id = %customer.id, name = %customer.name, "Credit customer added");
        self.engine.trigger_push();

        Ok(customer)
    }

    /// Records a repayment (or manual adjustment) against a customer's
    /// balance. Negative `delta` pays debt down. Returns the new balance.
    pub async fn adjust_credit_balance(&self, customer_id: &str, delta: i64) -> SyncResult<i64> {
        let balance = self.store.adjust_credit_balance(customer_id, delta).await?;
        self.enqueue_balance_update(customer_id, balance).await;

        info!(id = %customer_id, balance, "Credit balance adjusted");
        self.engine.trigger_push();

        Ok(balance)
    }

    /// Enqueues an update op carrying the absolute new balance, pairing
    /// the durable balance write with the queue row in one database
    /// transaction. Absolute values make server replays idempotent; a
    /// replayed delta would double-charge.
    async fn enqueue_balance_update(&self, customer_id: &str, balance: i64) {
        let update = CreditBalanceUpdate {
            id: customer_id.to_string(),
            balance,
        };

        // Serializing two owned fields cannot fail.
        let payload = serde_json::to_value(&update).unwrap_or_default();
        let op = SyncOperation::new(SyncOperationKind::UpdateCreditCustomer, customer_id, payload);

        if let Err(e) = self
            .db
            .credit_customers()
            .set_balance_with_queue_op(customer_id, balance, &op)
            .await
        {
            warn!(id = %customer_id, error = %e, "Failed to persist balance change, continuing in memory");
        }
        self.queue.enqueue_prepersisted(op).await;
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// The product catalog, sorted by name.
    pub async fn products(&self) -> Vec<Product> {
        self.store.products_snapshot().await
    }

    /// All credit customers, sorted by name.
    pub async fn credit_customers(&self) -> Vec<CreditCustomer> {
        self.store.credit_customers_snapshot().await
    }

    /// Looks up a single transaction.
    pub async fn get_transaction(&self, id: &str) -> Option<Transaction> {
        self.store.get_transaction(id).await
    }

    /// Computes the closing report for `date` from local state. Pure
    /// derivation; nothing is stored.
    pub async fn closing_report(&self, date: NaiveDate) -> ClosingReport {
        let transactions = self.store.transactions_snapshot().await;
        report::aggregate(&transactions, date)
    }

    /// Current sync state for the UI status strip.
    pub async fn sync_status(&self) -> SyncStatus {
        SyncStatus {
            state: self.monitor.state(),
            is_online: self.monitor.is_online(),
            pending_count: self.queue.pending_count().await,
        }
    }

    // =========================================================================
    // Connection Control
    // =========================================================================

    /// Clears a rejected-credential state and nudges the engine. Called
    /// after the operator re-enters the API key (the new key takes effect
    /// on service restart, when the HTTP client is rebuilt from config).
    pub fn reconnect(&self) {
        self.monitor.reset();
        self.engine.trigger_push();
        self.engine.trigger_pull();
    }

    // =========================================================================
    // Printing
    // =========================================================================

    /// Fires a receipt print at the remote printer. Best-effort: failures
    /// are logged, never surfaced, and the sale itself is unaffected.
    pub fn print_receipt(&self, transaction: Transaction) {
        let remote = self.remote.clone();
        tokio::spawn(async move {
            if let Err(e) = remote.print_receipt(&transaction).await {
                warn!(id = %transaction.id, error = %e, "Receipt print failed");
            }
        });
    }

    /// Computes the closing report for `date` and fires a print at the
    /// remote. Best-effort, same as receipts.
    pub async fn print_closing_report(&self, date: NaiveDate) {
        let report = self.closing_report(date).await;
        let remote = self.remote.clone();
        tokio::spawn(async move {
            if let Err(e) = remote.print_report(&report).await {
                warn!(date = %report.date, error = %e, "Report print failed");
            }
        });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use duka_db::DbConfig;

    use crate::client::{PushResponse, RemoteSnapshot};
    use crate::error::SyncResult;

    /// Always-reachable remote that records print requests.
    #[derive(Default)]
    struct QuietRemote {
        printed_receipts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteAuthority for QuietRemote {
        async fn probe(&self) -> SyncResult<()> {
            Ok(())
        }

        async fn fetch_snapshot(&self) -> SyncResult<RemoteSnapshot> {
            Ok(RemoteSnapshot::default())
        }

        async fn push_operations(&self, _: &[SyncOperation]) -> SyncResult<PushResponse> {
            Ok(PushResponse::default())
        }

        async fn print_receipt(&self, tx: &Transaction) -> SyncResult<()> {
            self.printed_receipts.lock().await.push(tx.id.clone());
            Ok(())
        }

        async fn print_report(&self, _: &ClosingReport) -> SyncResult<()> {
            Ok(())
        }
    }

    /// Service with the engine parked (never spawned), so the queue holds
    /// everything the service writes.
    async fn offline_service() -> (PosService, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (service, _engine) = PosService::new(
            SyncConfig::default(),
            db.clone(),
            Arc::new(QuietRemote::default()),
        )
        .await
        .unwrap();
        (service, db)
    }

    fn item(name: &str, price: i64, quantity: i64) -> LineItem {
        LineItem {
            product_id: format!("p-{name}"),
            name: name.to_string(),
            price,
            quantity,
            category: None,
        }
    }

    fn cash_sale(items: Vec<LineItem>, cashier: Option<&str>) -> SaleInput {
        SaleInput {
            items,
            payment_method: PaymentMethod::Cash,
            cashier: cashier.map(String::from),
            credit_customer_id: None,
        }
    }

    #[tokio::test]
    async fn test_offline_sale_lands_in_store_queue_and_disk() {
        let (service, db) = offline_service().await;

        let tx = service
            .submit_sale(cash_sale(vec![item("Soda", 250, 2)], Some("Alice")))
            .await
            .unwrap();
        assert_eq!(tx.total, 500);
        assert_eq!(tx.status, TransactionStatus::Completed);

        // Optimistic view.
        assert!(service.get_transaction(&tx.id).await.is_some());

        // Exactly one queued op, referencing the sale.
        let status = service.sync_status().await;
        assert_eq!(status.pending_count, 1);
        assert!(!status.is_online);

        // Both durable halves of the outbox write.
        assert!(db.transactions().get_by_id(&tx.id).await.unwrap().is_some());
        assert_eq!(db.sync_queue().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_sale_is_rejected() {
        let (service, _db) = offline_service().await;
        let err = service.submit_sale(cash_sale(vec![], None)).await;
        assert!(err.is_err());
        assert_eq!(service.sync_status().await.pending_count, 0);
    }

    #[tokio::test]
    async fn test_oversized_sale_is_rejected() {
        let (service, _db) = offline_service().await;
        let items: Vec<LineItem> = (0..=MAX_SALE_ITEMS as i64)
            .map(|i| item(&format!("item-{i}"), 10, 1))
            .collect();
        assert!(service.submit_sale(cash_sale(items, None)).await.is_err());
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let (service, _db) = offline_service().await;
        let err = service
            .submit_sale(cash_sale(vec![item("Soda", 250, 0)], None))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_credit_sale_requires_known_customer() {
        let (service, _db) = offline_service().await;

        let no_customer = SaleInput {
            items: vec![item("Bread", 550, 1)],
            payment_method: PaymentMethod::Credit,
            cashier: None,
            credit_customer_id: None,
        };
        assert!(service.submit_sale(no_customer).await.is_err());

        let unknown_customer = SaleInput {
            items: vec![item("Bread", 550, 1)],
            payment_method: PaymentMethod::Credit,
            cashier: None,
            credit_customer_id: Some("ghost".to_string()),
        };
        assert!(service.submit_sale(unknown_customer).await.is_err());
    }

    #[tokio::test]
    async fn test_credit_sale_moves_balance_and_enqueues_ordered_ops() {
        let (service, _db) = offline_service().await;

        let customer = service
            .add_credit_customer("Wanjiku", Some("0712345678".to_string()))
            .await
            .unwrap();
        assert_eq!(customer.balance, 0);

        let sale = SaleInput {
            items: vec![item("Bread", 550, 1)],
            payment_method: PaymentMethod::Credit,
            cashier: Some("Alice".to_string()),
            credit_customer_id: Some(customer.id.clone()),
        };
        let tx = service.submit_sale(sale).await.unwrap();
        assert_eq!(tx.credit_customer_name.as_deref(), Some("Wanjiku"));

        let updated = service
            .credit_customers()
            .await
            .into_iter()
            .find(|c| c.id == customer.id)
            .unwrap();
        assert_eq!(updated.balance, 550);

        // Causal order in the queue: creation, then the sale, then the
        // balance update it caused.
        let pending = service.queue.peek_batch(10).await;
        let kinds: Vec<SyncOperationKind> = pending.iter().map(|op| op.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SyncOperationKind::AddCreditCustomer,
                SyncOperationKind::CreateTransaction,
                SyncOperationKind::UpdateCreditCustomer,
            ]
        );

        // The update carries the absolute balance.
        assert_eq!(pending[2].payload["balance"], 550);
    }

    #[tokio::test]
    async fn test_repayment_reduces_balance() {
        let (service, _db) = offline_service().await;
        let customer = service.add_credit_customer("Otieno", None).await.unwrap();

        service
            .adjust_credit_balance(&customer.id, 1000)
            .await
            .unwrap();
        let balance = service
            .adjust_credit_balance(&customer.id, -400)
            .await
            .unwrap();
        assert_eq!(balance, 600);
    }

    #[tokio::test]
    async fn test_customer_writes_pair_with_queue_entries() {
        let (service, db) = offline_service().await;

        let customer = service
            .add_credit_customer("Wanjiku", Some("0712345678".to_string()))
            .await
            .unwrap();

        // Registration committed the customer row and its queue row
        // together.
        assert!(db
            .credit_customers()
            .get_by_id(&customer.id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(db.sync_queue().count().await.unwrap(), 1);

        service
            .adjust_credit_balance(&customer.id, 700)
            .await
            .unwrap();

        // The balance update is durable, and paired with a second queue
        // row in the same database transaction.
        let persisted = db
            .credit_customers()
            .get_by_id(&customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(persisted.balance, 700);
        assert_eq!(db.sync_queue().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_blank_customer_name_is_rejected() {
        let (service, _db) = offline_service().await;
        assert!(service.add_credit_customer("  ", None).await.is_err());
    }

    #[tokio::test]
    async fn test_closing_report_groups_by_cashier_with_unknown_fallback() {
        let (service, _db) = offline_service().await;

        service
            .submit_sale(cash_sale(vec![item("Soda", 250, 2)], Some("Alice")))
            .await
            .unwrap();
        service
            .submit_sale(cash_sale(vec![item("Bread", 550, 1)], Some("Alice")))
            .await
            .unwrap();
        service
            .submit_sale(cash_sale(vec![item("Milk", 120, 1)], None))
            .await
            .unwrap();

        let report = service.closing_report(Utc::now().date_naive()).await;

        assert_eq!(report.grand_total, 1170);
        assert_eq!(report.cashiers.len(), 2);

        let alice = &report.cashiers[0];
        assert_eq!(alice.cashier_name, "Alice");
        assert_eq!(alice.total_sales, 1050);
        assert_eq!(alice.items[0].name, "Bread");
        assert_eq!(alice.items[1].name, "Soda");

        assert_eq!(report.cashiers[1].cashier_name, duka_core::UNKNOWN_CASHIER);
    }

    #[tokio::test]
    async fn test_reconnect_clears_auth_required() {
        let (service, _db) = offline_service().await;
        service.monitor.mark_auth_required();

        service.reconnect();
        assert_eq!(service.sync_status().await.state, ConnectionState::Offline);
    }

    #[tokio::test]
    async fn test_print_receipt_is_fire_and_forget() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Arc::new(QuietRemote::default());
        let (service, _engine) = PosService::new(SyncConfig::default(), db, remote.clone())
            .await
            .unwrap();

        let tx = service
            .submit_sale(cash_sale(vec![item("Soda", 250, 1)], None))
            .await
            .unwrap();
        service.print_receipt(tx.clone());

        // The spawned task runs on this runtime; yield until it lands.
        tokio::task::yield_now().await;
        for _ in 0..10 {
            if !remote.printed_receipts.lock().await.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(*remote.printed_receipts.lock().await, vec![tx.id]);
    }
}
