//! # Domain Types
//!
//! Core domain types used throughout Duka POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   Transaction   │   │ CreditCustomer  │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (opaque)    │   │  id (opaque)    │   │  id (opaque)    │       │
//! │  │  items[]        │   │  name, phone    │   │  name           │       │
//! │  │  total          │   │  balance        │   │  price          │       │
//! │  │  payment_method │   │  created_at     │   │  category       │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌───────────────────┐   ┌─────────────────┐     │
//! │  │  SyncOperation  │   │ TransactionStatus │   │ PaymentMethod   │     │
//! │  │  ─────────────  │   │  ───────────────  │   │  ─────────────  │     │
//! │  │  kind           │   │  Pending          │   │  Cash           │     │
//! │  │  entity_id      │   │  Completed        │   │  Mpesa          │     │
//! │  │  payload (JSON) │   └───────────────────┘   │  Credit         │     │
//! │  │  attempts       │                           └─────────────────┘     │
//! │  └─────────────────┘                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! The remote authority (the shop's desktop server) speaks camelCase JSON, so
//! every type that crosses the wire carries `rename_all = "camelCase"`. The
//! same JSON is what the sync queue persists as its opaque payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Payment Method
// =============================================================================

/// How a sale was paid.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Mobile money payment (M-Pesa).
    Mpesa,
    /// Sale on credit against a registered credit customer.
    Credit,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Mpesa => write!(f, "mpesa"),
            PaymentMethod::Credit => write!(f, "credit"),
        }
    }
}

// =============================================================================
// Transaction Status
// =============================================================================

/// The status of a recorded sale.
///
/// Checkout records sales as `Completed` immediately - an offline sale is
/// final the moment it is queued. The remote authority may overwrite the
/// status on a later pull (e.g., a voided sale reconciled from the server).
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Awaiting remote confirmation.
    Pending,
    /// Finalized sale; the only status the closing report counts.
    Completed,
}

impl Default for TransactionStatus {
    fn default() -> Self {
        TransactionStatus::Completed
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the local catalog.
///
/// The catalog is owned by the remote authority; the pull path replaces it
/// wholesale. Checkout snapshots name/price into line items, so later product
/// edits never rewrite past sales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (opaque to this client).
    pub id: String,

    /// Display name shown to the cashier and on receipts.
    pub name: String,

    /// Unit price in minor currency units.
    #[serde(default)]
    pub price: i64,

    /// Category used for receipt grouping.
    #[serde(default)]
    pub category: Option<String>,

    /// Stock on hand, if the authority tracks it.
    #[serde(default)]
    pub stock: Option<i64>,
}

// =============================================================================
// Line Item
// =============================================================================

/// A line item in a transaction.
///
/// Snapshot pattern: product data is frozen at time of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product id at time of sale.
    pub product_id: String,

    /// Product name at time of sale (frozen).
    pub name: String,

    /// Unit price at time of sale (frozen). Missing prices degrade to zero
    /// rather than aborting the sale.
    #[serde(default)]
    pub price: i64,

    /// Quantity sold.
    pub quantity: i64,

    /// Category at time of sale (frozen).
    #[serde(default)]
    pub category: Option<String>,
}

impl LineItem {
    /// Line total (price × quantity).
    #[inline]
    pub fn line_total(&self) -> i64 {
        self.price * self.quantity
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A recorded sale.
///
/// Immutable once created, except for status transitions driven by remote
/// confirmation. The invariant `total == Σ line_total` is informational:
/// checkout computes it, but nothing re-validates synced data against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Opaque identifier.
    pub id: String,

    /// Ordered line items.
    pub items: Vec<LineItem>,

    /// Total amount in minor currency units.
    pub total: i64,

    /// How the sale was paid.
    pub payment_method: PaymentMethod,

    /// When the sale happened.
    pub timestamp: DateTime<Utc>,

    /// Operator identity. `None` is grouped under [`crate::UNKNOWN_CASHIER`]
    /// by the closing report.
    #[serde(default)]
    pub cashier: Option<String>,

    /// Credit customer reference, set only for credit sales.
    #[serde(default)]
    pub credit_customer_id: Option<String>,

    /// Credit customer name snapshot at time of sale.
    #[serde(default)]
    pub credit_customer_name: Option<String>,

    /// Sale status.
    #[serde(default)]
    pub status: TransactionStatus,
}

impl Transaction {
    /// Sum of line totals. Should equal `total`, but is not enforced.
    pub fn computed_total(&self) -> i64 {
        self.items.iter().map(LineItem::line_total).sum()
    }
}

// =============================================================================
// Credit Customer
// =============================================================================

/// A customer allowed to buy on credit.
///
/// The running balance is the amount owed (positive = owes the shop). It is
/// only ever adjusted through queued balance-update operations so the remote
/// authority sees every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCustomer {
    /// Opaque identifier.
    pub id: String,

    /// Customer name.
    pub name: String,

    /// Phone number, when the shopkeeper recorded one.
    #[serde(default)]
    pub phone: Option<String>,

    /// Running balance owed, in minor currency units. Signed: repayments can
    /// drive it negative (shop owes the customer change).
    #[serde(default)]
    pub balance: i64,

    /// When the customer was registered.
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sync Operations
// =============================================================================

/// The kind of a queued mutation.
///
/// Serialized in kebab-case to match the wire protocol
/// (`"create-transaction"`, `"add-credit-customer"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncOperationKind {
    /// A new sale to record remotely.
    CreateTransaction,
    /// A new credit customer to register remotely.
    AddCreditCustomer,
    /// A balance change for an existing credit customer.
    UpdateCreditCustomer,
}

impl std::fmt::Display for SyncOperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncOperationKind::CreateTransaction => write!(f, "create-transaction"),
            SyncOperationKind::AddCreditCustomer => write!(f, "add-credit-customer"),
            SyncOperationKind::UpdateCreditCustomer => write!(f, "update-credit-customer"),
        }
    }
}

impl std::str::FromStr for SyncOperationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create-transaction" => Ok(SyncOperationKind::CreateTransaction),
            "add-credit-customer" => Ok(SyncOperationKind::AddCreditCustomer),
            "update-credit-customer" => Ok(SyncOperationKind::UpdateCreditCustomer),
            other => Err(format!("unknown sync operation kind: {other}")),
        }
    }
}

/// A durable sync queue entry.
///
/// The payload is opaque to the queue: it is the kind-specific JSON that the
/// remote authority consumes verbatim. Ordering identity is positional (the
/// queue preserves strict FIFO); `dedup_key` exists so replays of the same
/// logical mutation are idempotent on the server side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// Unique operation id (UUID v4).
    pub id: String,

    /// What this operation does remotely.
    pub kind: SyncOperationKind,

    /// Id of the entity this operation targets.
    pub entity_id: String,

    /// Kind-specific JSON payload, sent verbatim.
    pub payload: serde_json::Value,

    /// When the operation was enqueued.
    pub enqueued_at: DateTime<Utc>,

    /// Number of failed push attempts so far.
    #[serde(default)]
    pub attempts: i64,
}

impl SyncOperation {
    /// Creates a new operation with a fresh id and zero attempts.
    pub fn new(
        kind: SyncOperationKind,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        SyncOperation {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            entity_id: entity_id.into(),
            payload,
            enqueued_at: Utc::now(),
            attempts: 0,
        }
    }

    /// Deduplication key: kind + target entity id.
    ///
    /// Two replays of the same logical mutation share this key, letting the
    /// remote authority drop duplicates after a lost acknowledgement.
    pub fn dedup_key(&self) -> String {
        format!("{}:{}", self.kind, self.entity_id)
    }
}

/// Payload for [`SyncOperationKind::UpdateCreditCustomer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditBalanceUpdate {
    /// The customer being updated.
    pub id: String,

    /// New absolute balance after the adjustment.
    pub balance: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
