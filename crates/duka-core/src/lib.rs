//! # duka-core: Pure Business Logic for Duka POS
//!
//! The heart of the offline-first POS client. Everything in this crate is a
//! pure function over plain data: domain types, sync operation payloads, and
//! the end-of-day closing report aggregator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Duka POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Presentation (out of scope)                     │   │
//! │  │     Checkout UI ──► Customers UI ──► Closing Report UI         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ PosService calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                duka-sync (store, queue, engine)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ duka-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │  report   │  │   error   │                  │   │
//! │  │   │Transaction│  │  Closing  │  │ CoreError │                  │   │
//! │  │   │ Customer  │  │  Report   │  │           │                  │   │
//! │  │   │  SyncOp   │  │ aggregate │  │           │                  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input = same output, always
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all amounts are minor currency units (i64), never floats
//! 4. **Explicit Errors**: all errors are typed, never strings or panics

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod report;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult};
pub use report::{aggregate, CashierReport, ClosingReport, ItemSale};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Cashier bucket used when a transaction carries no operator identity.
///
/// Malformed transactions (imported from older clients, or synced from
/// devices that never recorded a cashier) must still be counted. Grouping
/// them under a well-known name is the only defined behavior for that data,
/// so every consumer uses this constant rather than its own fallback string.
pub const UNKNOWN_CASHIER: &str = "Unknown";

/// Maximum line items allowed in a single sale.
///
/// Prevents runaway carts and keeps sync payloads bounded.
pub const MAX_SALE_ITEMS: usize = 100;
