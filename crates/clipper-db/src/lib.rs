//! # clipper-db: Database Layer for Clipper POS
//!
//! This crate provides persistence for the Clipper POS core.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Clipper POS Data Flow                     │
//! │                                                              │
//! │  Embedding request layer                                     │
//! │       │                                                      │
//! │       ▼                                                      │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                clipper-db (THIS CRATE)                 │  │
//! │  │                                                        │  │
//! │  │  ┌──────────┐  ┌──────────────┐  ┌─────────────────┐   │  │
//! │  │  │ Database │  │ Repositories │  │   Migrations    │   │  │
//! │  │  │ (pool)   │◄─│ visit/ledgers│  │   (embedded)    │   │  │
//! │  │  └──────────┘  └──────────────┘  └─────────────────┘   │  │
//! │  │                                                        │  │
//! │  │  Pricing math is delegated to clipper-core; this       │  │
//! │  │  crate owns transactions, tenancy scoping, and the     │  │
//! │  │  guarded ledger appends.                               │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │       │                                                      │
//! │       ▼                                                      │
//! │  SQLite database (WAL mode, foreign keys ON)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use clipper_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/clipper.db")).await?;
//!
//! // Create a visit atomically
//! let detail = db.visits().create_visit(&store_id, &request).await?;
//!
//! // Ledger operations (sequenced by the caller, not by create_visit)
//! db.prepaid().use_amount(&store_id, &customer_id, amount, None, None, None).await?;
//! db.points().earn_from_visit(&store_id, &detail.visit.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::{CatalogRepository, NewDiscountRule, NewPointRule};
pub use repository::inventory::InventoryRepository;
pub use repository::points::PointRepository;
pub use repository::prepaid::PrepaidRepository;
pub use repository::visit::VisitRepository;
