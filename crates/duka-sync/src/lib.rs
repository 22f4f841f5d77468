//! # duka-sync: Offline-First Sync Core for Duka POS
//!
//! Everything between the till and the remote authority: the optimistic
//! local store, the durable FIFO mutation queue, the connection monitor,
//! and the background engine that reconciles the two sides.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           duka-sync                                     │
//! │                                                                         │
//! │   Till / UI                                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐   local-only, never blocks on the network            │
//! │  │  PosService  │──────────────┬──────────────────┐                    │
//! │  └──────────────┘              │                  │                    │
//! │       │                        ▼                  ▼                    │
//! │       │                 ┌────────────┐     ┌────────────┐              │
//! │       │                 │ LocalStore │     │ SyncQueue  │              │
//! │       │                 │ (RwLock)   │     │ (FIFO)     │              │
//! │       │                 └─────┬──────┘     └─────┬──────┘              │
//! │       │                       │    duka-db       │                    │
//! │       │                       └───────┬──────────┘                    │
//! │       │                               ▼                               │
//! │       │                        SQLite (WAL)                           │
//! │       │                                                               │
//! │       ▼                                                               │
//! │  ┌──────────────┐  push / pull  ┌─────────────────┐     HTTP/JSON     │
//! │  │  SyncEngine  │◀─────────────▶│ RemoteAuthority │◀────────────────▶ │
//! │  │  (actor)     │               │ (trait seam)    │   remote server   │
//! │  └──────┬───────┘               └─────────────────┘                   │
//! │         │                                                             │
//! │         ▼                                                             │
//! │  ConnectionMonitor (offline / online / auth-required)                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Guarantees
//!
//! 1. **Sales never fail for network reasons**: every mutation completes
//!    against local state; synchronization happens later.
//! 2. **FIFO replay**: queued operations push strictly in creation order,
//!    so causal chains (create customer, then update their balance)
//!    arrive intact.
//! 3. **Idempotent acknowledgement**: an operation is removed exactly
//!    once, no matter how often the remote confirms it.
//! 4. **Server wins on pull**, except for entities with operations still
//!    in flight, which keep their local version until acknowledged.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod queue;
pub mod service;
pub mod store;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use client::{HttpRemote, PushRequest, PushResponse, RemoteAuthority, RemoteSnapshot};
pub use config::{ConnectionSettings, SyncConfig, SyncSettings};
pub use connection::{ConnectionMonitor, ConnectionState};
pub use engine::{SyncEngine, SyncEngineHandle};
pub use error::{SyncError, SyncResult};
pub use queue::SyncQueue;
pub use service::{PosService, SaleInput, SyncStatus};
pub use store::LocalStore;
