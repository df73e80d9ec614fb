//! # clipper-core: Pure Business Logic for Clipper POS
//!
//! This crate is the **heart** of Clipper POS. It contains the pricing and
//! settlement logic for salon visits as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   Clipper POS Architecture                   │
//! │                                                              │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │       Embedding request layer (out of this repo)       │  │
//! │  └───────────────────────────┬────────────────────────────┘  │
//! │                              │                               │
//! │  ┌───────────────────────────▼────────────────────────────┐  │
//! │  │              ★ clipper-core (THIS CRATE) ★             │  │
//! │  │                                                        │  │
//! │  │  ┌────────┐ ┌────────┐ ┌─────────┐ ┌──────────────┐    │  │
//! │  │  │ types  │ │ money  │ │ pricing │ │  validation  │    │  │
//! │  │  │ Visit  │ │ Money  │ │ engine+ │ │    rules     │    │  │
//! │  │  │ Ledgers│ │ math   │ │ matcher │ │    checks    │    │  │
//! │  │  └────────┘ └────────┘ └─────────┘ └──────────────┘    │  │
//! │  │                                                        │  │
//! │  │  NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS    │  │
//! │  └───────────────────────────┬────────────────────────────┘  │
//! │                              │                               │
//! │  ┌───────────────────────────▼────────────────────────────┐  │
//! │  │              clipper-db (Database Layer)               │  │
//! │  │      SQLite repositories, ledgers, orchestration       │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Visit, VisitLine, rules, ledger rows, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Pricing engine and discount rule matcher
//! - [`visit`] - Derived visit totals and the aggregate read model
//! - [`error`] - Domain error types
//! - [`validation`] - Field and request validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: same input, same output, no side effects
//! 2. **No I/O**: database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: all monetary values are i64 minor units
//! 4. **Explicit Errors**: typed errors, never strings or panics
//! 5. **Derived Aggregates**: balances and totals are sums over children,
//!    never independently stored state
//!
//! ## Example Usage
//!
//! ```rust
//! use clipper_core::money::Money;
//! use clipper_core::pricing::{price_line, LineToPrice, PricingTarget};
//!
//! let target = PricingTarget::Service {
//!     service_id: "svc-cut".to_string(),
//!     category_id: None,
//! };
//!
//! let priced = price_line(
//!     &LineToPrice {
//!         target: &target,
//!         list_price: Money::from_minor(30_000),
//!         qty: 1,
//!         discount_rate: None,
//!         discount_amount: None,
//!         rule_id: None,
//!         prepaid_used: Money::zero(),
//!     },
//!     &[],
//!     chrono::Utc::now(),
//! );
//!
//! assert_eq!(priced.net_total.minor(), 30_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;
pub mod visit;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use clipper_core::Money` instead of
// `use clipper_core::money::Money`.

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{price_line, LineToPrice, MissingRefPolicy, PricedLine, PricingConfig, PricingTarget};
pub use types::*;
pub use visit::{paid_amount, visit_totals, VisitDetail, VisitTotals};

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum line items allowed in a single visit.
///
/// ## Business Reason
/// Prevents runaway requests and keeps transactions reviewable at the
/// counter. Can be made configurable per-store in future versions.
pub const MAX_VISIT_LINES: usize = 100;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., typing 1000 instead of 10).
pub const MAX_LINE_QTY: i64 = 999;
