//! # Closing Report Aggregator
//!
//! Derives the end-of-day closing report from transaction data. The report is
//! never stored: it is a pure, deterministic function of the transactions and
//! a calendar date, recomputed on demand.
//!
//! ## Aggregation Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Closing Report Pipeline                              │
//! │                                                                         │
//! │  transactions ──► filter(date, completed) ──► group by cashier         │
//! │                                                    │                    │
//! │                              ┌─────────────────────┴──────────────┐    │
//! │                              ▼                                    ▼    │
//! │                    per-method subtotals                 item rollup    │
//! │                    (cash / mpesa / credit)          (keyed by NAME,    │
//! │                              │                     sorted by revenue)  │
//! │                              └─────────────────────┬──────────────┘    │
//! │                                                    ▼                    │
//! │                                             grand totals                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Deliberate Behaviors
//! - Transactions without a cashier fall into the [`UNKNOWN_CASHIER`] bucket.
//! - Item rows are keyed by product *name*, not id: two distinct product ids
//!   with the same display name merge into one report line. Shops rename and
//!   re-create products freely; the report reads the way the shelf is
//!   labelled.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{PaymentMethod, Transaction, TransactionStatus};
use crate::UNKNOWN_CASHIER;

// =============================================================================
// Report Types
// =============================================================================

/// One aggregated item row within a cashier group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSale {
    /// Product display name (the aggregation key).
    pub name: String,

    /// Total quantity sold.
    pub quantity: i64,

    /// Total revenue for this item.
    pub total: i64,
}

/// Per-cashier rollup for the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashierReport {
    /// Cashier name (or the `"Unknown"` fallback).
    pub cashier_name: String,

    /// Sum across all payment methods.
    pub total_sales: i64,

    /// Cash subtotal.
    pub cash_total: i64,

    /// Mobile-money subtotal.
    pub mpesa_total: i64,

    /// Credit subtotal.
    pub credit_total: i64,

    /// Item rollup, sorted descending by revenue.
    pub items: Vec<ItemSale>,

    /// Number of transactions in this group.
    pub transaction_count: usize,
}

/// The full closing report for one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosingReport {
    /// The date the report covers.
    pub date: NaiveDate,

    /// Per-cashier groups, in order of first appearance.
    pub cashiers: Vec<CashierReport>,

    /// Grand cash total across all cashiers.
    pub total_cash: i64,

    /// Grand mobile-money total across all cashiers.
    pub total_mpesa: i64,

    /// Grand credit total across all cashiers.
    pub total_credit: i64,

    /// Sum of all three grand totals.
    pub grand_total: i64,
}

// =============================================================================
// Aggregation
// =============================================================================

/// Builds the closing report for `date` from `transactions`.
///
/// Pure and deterministic: no side effects, and identical inputs always
/// produce identical output (group order follows first appearance in the
/// input; item ties keep insertion order under the stable sort).
pub fn aggregate(transactions: &[Transaction], date: NaiveDate) -> ClosingReport {
    let day: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.status == TransactionStatus::Completed && t.timestamp.date_naive() == date)
        .collect();

    // Group indices by cashier, preserving first-appearance order.
    let mut group_order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&Transaction>> = HashMap::new();
    for tx in &day {
        let name = tx
            .cashier
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(UNKNOWN_CASHIER)
            .to_string();
        if !groups.contains_key(&name) {
            group_order.push(name.clone());
        }
        groups.entry(name).or_default().push(tx);
    }

    let cashiers: Vec<CashierReport> = group_order
        .into_iter()
        .map(|name| {
            let txs = &groups[&name];
            aggregate_cashier(name, txs)
        })
        .collect();

    let total_cash = cashiers.iter().map(|c| c.cash_total).sum();
    let total_mpesa = cashiers.iter().map(|c| c.mpesa_total).sum();
    let total_credit = cashiers.iter().map(|c| c.credit_total).sum();

    ClosingReport {
        date,
        cashiers,
        total_cash,
        total_mpesa,
        total_credit,
        grand_total: total_cash + total_mpesa + total_credit,
    }
}

/// Rolls up one cashier's transactions.
fn aggregate_cashier(cashier_name: String, txs: &[&Transaction]) -> CashierReport {
    let mut cash_total = 0;
    let mut mpesa_total = 0;
    let mut credit_total = 0;

    for tx in txs {
        match tx.payment_method {
            PaymentMethod::Cash => cash_total += tx.total,
            PaymentMethod::Mpesa => mpesa_total += tx.total,
            PaymentMethod::Credit => credit_total += tx.total,
        }
    }

    // Item rollup keyed by display name, first-appearance order before the
    // revenue sort so equal-revenue ties stay deterministic.
    let mut item_order: Vec<String> = Vec::new();
    let mut item_map: HashMap<String, ItemSale> = HashMap::new();

    for tx in txs {
        for item in &tx.items {
            let name = if item.name.is_empty() {
                "Item".to_string()
            } else {
                item.name.clone()
            };
            let entry = item_map.entry(name.clone()).or_insert_with(|| {
                item_order.push(name.clone());
                ItemSale {
                    name,
                    quantity: 0,
                    total: 0,
                }
            });
            entry.quantity += item.quantity;
            entry.total += item.line_total();
        }
    }

    let mut items: Vec<ItemSale> = item_order
        .into_iter()
        .map(|name| item_map.remove(&name).expect("item recorded in order list"))
        .collect();
    items.sort_by(|a, b| b.total.cmp(&a.total));

    CashierReport {
        cashier_name,
        total_sales: cash_total + mpesa_total + credit_total,
        cash_total,
        mpesa_total,
        credit_total,
        items,
        transaction_count: txs.len(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
