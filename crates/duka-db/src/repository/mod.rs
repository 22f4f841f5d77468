//! # Repository Module
//!
//! Database repository implementations for Duka POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  duka-sync (store / queue / service)                                   │
//! │       │                                                                 │
//! │       │  db.transactions().insert_with_queue_op(&tx, &op)              │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  TransactionRepository                                                 │
//! │  ├── insert(&self, tx)                                                 │
//! │  ├── get_by_id(&self, id)                                              │
//! │  └── replace_reconciled(&self, txs)                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • SQL is isolated in one place                                        │
//! │  • Repositories are cheap handles over the shared pool                 │
//! │  • duka-sync never sees a row, only domain types                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`TransactionRepository`] - Completed sales, with transactional outbox writes
//! - [`CreditCustomerRepository`] - Credit customers and balances
//! - [`ProductRepository`] - Catalog cache
//! - [`SyncQueueRepository`] - Durable FIFO outbox
//!
//! [`TransactionRepository`]: transaction::TransactionRepository
//! [`CreditCustomerRepository`]: credit::CreditCustomerRepository
//! [`ProductRepository`]: product::ProductRepository
//! [`SyncQueueRepository`]: queue::SyncQueueRepository

pub mod credit;
pub mod product;
pub mod queue;
pub mod transaction;
