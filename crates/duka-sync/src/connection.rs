//! # Connection Monitor
//!
//! Tracks reachability of the remote authority.
//!
//! The state is a single `AtomicU8`: the engine is the only writer (after
//! every real network attempt), while the service and UI read it freely.
//! Single-writer multi-reader, so no lock is needed, only atomic visibility.

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::debug;

use crate::client::RemoteAuthority;

// =============================================================================
// Connection State
// =============================================================================

/// Last-known reachability of the remote authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Last network attempt failed or no attempt has been made yet.
    Offline = 0,

    /// Last network attempt succeeded.
    Online = 1,

    /// The credential was rejected. Distinct from Offline because retries
    /// will not self-heal; the operator must reconnect with a valid key.
    AuthRequired = 2,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Online,
            2 => ConnectionState::AuthRequired,
            _ => ConnectionState::Offline,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Offline => write!(f, "offline"),
            ConnectionState::Online => write!(f, "online"),
            ConnectionState::AuthRequired => write!(f, "auth-required"),
        }
    }
}

// =============================================================================
// Connection Monitor
// =============================================================================

/// Shared reachability flag. Starts Offline until proven otherwise.
#[derive(Debug, Default)]
pub struct ConnectionMonitor {
    state: AtomicU8,
}

impl ConnectionMonitor {
    /// Creates a monitor in the Offline state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last-known state without blocking.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Relaxed))
    }

    /// Returns true if the last network attempt succeeded.
    pub fn is_online(&self) -> bool {
        self.state() == ConnectionState::Online
    }

    /// Records a successful network attempt.
    pub fn mark_online(&self) {
        self.transition(ConnectionState::Online);
    }

    /// Records a failed network attempt.
    pub fn mark_offline(&self) {
        self.transition(ConnectionState::Offline);
    }

    /// Records a rejected credential.
    pub fn mark_auth_required(&self) {
        self.transition(ConnectionState::AuthRequired);
    }

    /// Clears AuthRequired back to Offline so the next attempt runs with
    /// whatever credential is now configured. Called when the operator
    /// reconnects.
    pub fn reset(&self) {
        self.transition(ConnectionState::Offline);
    }

    /// Probes the remote authority's public status endpoint and updates
    /// the state. Failures classify as offline and are never propagated.
    ///
    /// The probe is unauthenticated, so it cannot clear or set
    /// AuthRequired; only a real authenticated attempt does that.
    pub async fn probe(&self, remote: &dyn RemoteAuthority) -> bool {
        match remote.probe().await {
            Ok(()) => {
                // Leave AuthRequired standing: the server being reachable
                // says nothing about the key.
                if self.state() != ConnectionState::AuthRequired {
                    self.mark_online();
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "Status probe failed");
                if self.state() != ConnectionState::AuthRequired {
                    self.mark_offline();
                }
                false
            }
        }
    }

    fn transition(&self, next: ConnectionState) {
        let prev = self.state.swap(next as u8, Ordering::Relaxed);
        if prev != next as u8 {
            debug!(
                from = %ConnectionState::from_u8(prev),
                to = %next,
                "Connection state changed"
            );
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
