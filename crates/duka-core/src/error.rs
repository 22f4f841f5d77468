//! # Error Types
//!
//! Domain-specific error types for duka-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  duka-core errors (this file)                                           │
//! │  └── CoreError        - Business rule violations                        │
//! │                                                                         │
//! │  duka-db errors (separate crate)                                        │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  duka-sync errors (separate crate)                                      │
//! │  └── SyncError        - Network, config and engine failures             │
//! │                                                                         │
//! │  Flow: CoreError → SyncError → caller                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (entity ID, counts, etc.)
//! 3. Errors are enum variants, never String

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations. They should be caught
/// and translated to user-facing messages by the presentation layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A sale was submitted with no line items.
    #[error("Sale must contain at least one item")]
    EmptySale,

    /// A sale exceeded the maximum number of line items.
    #[error("Sale cannot have more than {max} items")]
    SaleTooLarge { max: usize },

    /// A line item carried a non-positive quantity.
    #[error("Item '{name}' has invalid quantity {quantity}")]
    InvalidQuantity { name: String, quantity: i64 },

    /// A credit sale referenced a customer that does not exist locally.
    #[error("Credit customer not found: {0}")]
    CreditCustomerNotFound(String),

    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidQuantity {
            name: "Soda".to_string(),
            quantity: 0,
        };
        assert_eq!(err.to_string(), "Item 'Soda' has invalid quantity 0");

        let err = CoreError::SaleTooLarge { max: 100 };
        assert_eq!(err.to_string(), "Sale cannot have more than 100 items");

        let err = CoreError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");
    }
}
