//! # Sync Error Types
//!
//! Error types for the offline core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Network      │  │     Remote              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Unreachable    │  │  AuthRequired           │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  RemoteRejected         │ │
//! │  │  ConfigLoad/Save│  │                 │  │  InvalidResponse        │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Database     │  │    Domain       │                              │
//! │  │                 │  │                 │                              │
//! │  │  DatabaseError  │  │  Core(CoreError)│                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all failures in the offline core.
///
/// ## Design Principles
/// - Each variant includes enough context for debugging
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote base URL.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Network Errors
    // =========================================================================
    /// The remote authority could not be reached.
    #[error("Remote unreachable: {0}")]
    Unreachable(String),

    /// A request exceeded its bounded timeout.
    #[error("Request timed out")]
    Timeout,

    // =========================================================================
    // Remote Errors
    // =========================================================================
    /// The credential was rejected (HTTP 401/403).
    ///
    /// Retries will not self-heal; the UI must surface a distinct
    /// "needs reconnect" state.
    #[error("Authentication required")]
    AuthRequired,

    /// The remote authority rejected the request.
    #[error("Remote rejected request with status {status}: {message}")]
    RemoteRejected { status: u16, message: String },

    /// The remote authority answered with a body we could not decode.
    #[error("Invalid response from remote: {0}")]
    InvalidResponse(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Local database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Business rule violation from duka-core.
    #[error(transparent)]
    Core(#[from] duka_core::CoreError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Failed to serialize a payload.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<duka_db::DbError> for SyncError {
    fn from(err: duka_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::InvalidResponse(err.to_string())
        } else {
            SyncError::Unreachable(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if this error is transient and the operation can be
    /// retried with backoff.
    ///
    /// ## Retryable Errors
    /// - Unreachable host (network issues)
    /// - Timeouts
    /// - Remote 5xx responses
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Authentication failures (need new credentials)
    /// - Remote 4xx rejections
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Unreachable(_) | SyncError::Timeout => true,
            SyncError::RemoteRejected { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if this error means the credential was rejected.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, SyncError::AuthRequired)
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Unreachable("connection refused".into()).is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::RemoteRejected {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());

        assert!(!SyncError::AuthRequired.is_retryable());
        assert!(!SyncError::RemoteRejected {
            status: 400,
            message: "bad batch".into()
        }
        .is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
    }

    #[test]
    fn test_auth_categorization() {
        assert!(SyncError::AuthRequired.is_auth_error());
        assert!(!SyncError::Timeout.is_auth_error());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::RemoteRejected {
            status: 422,
            message: "duplicate operation".into(),
        };
        assert!(err.to_string().contains("422"));
        assert!(err.to_string().contains("duplicate operation"));
    }
}
