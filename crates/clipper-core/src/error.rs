//! # Error Types
//!
//! Domain-specific error types for clipper-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Error Types                            │
//! │                                                              │
//! │  clipper-core errors (this file)                             │
//! │  ├── CoreError        - Business rule violations             │
//! │  └── ValidationError  - Input validation failures            │
//! │                                                              │
//! │  clipper-db errors (separate crate)                          │
//! │  └── DbError          - Persistence failures (wraps both)    │
//! │                                                              │
//! │  Flow: ValidationError → CoreError → DbError → request layer │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (ids, balances, amounts)
//! 3. Errors are enum variants, never String
//! 4. Balance failures are distinct and catchable, never silently clamped

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. The persistence layer wraps
/// them unchanged so callers can match on the specific failure.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A named prepaid account cannot cover the requested amount.
    ///
    /// ## When This Occurs
    /// - `use_amount` was given an explicit account id whose remaining
    ///   balance is below the requested draw
    /// - A concurrent draw won the race and consumed the balance first
    #[error("Prepaid account {account_id} has {remaining} remaining, requested {requested}")]
    InsufficientBalance {
        account_id: String,
        remaining: i64,
        requested: i64,
    },

    /// Auto-selection found no prepaid account able to cover the amount.
    ///
    /// Distinct from [`CoreError::InsufficientBalance`]: no account was
    /// named, and none of the customer's accounts qualifies on its own.
    #[error("No prepaid account with at least {requested} available")]
    NoAccountAvailable { requested: i64 },

    /// A point redemption or negative adjustment exceeds the balance.
    #[error("Insufficient points: balance {balance}, requested {requested}")]
    InsufficientPoints { balance: i64, requested: i64 },

    /// Visit is not in a status that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Finalizing a visit that is already finalized
    #[error("Visit {visit_id} is {current_status}, cannot perform operation")]
    InvalidVisitStatus {
        visit_id: String,
        current_status: String,
    },

    /// A line item references a catalog entry that does not exist.
    ///
    /// Only raised under [`MissingRefPolicy::Reject`]; the default policy
    /// prices the line at zero instead.
    ///
    /// [`MissingRefPolicy::Reject`]: crate::pricing::MissingRefPolicy
    #[error("Line {line} references missing catalog entry {item_id}")]
    MissingCatalogRef { line: usize, item_id: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a request doesn't meet field-level requirements.
/// Used for early validation before any write begins.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
