//! # Repository Module
//!
//! Database repository implementations for Clipper POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  The Repository pattern keeps SQL behind a typed API.        │
//! │                                                              │
//! │  Embedding layer                                             │
//! │       │   db.visits().create_visit(store_id, request)        │
//! │       ▼                                                      │
//! │  VisitRepository / PrepaidRepository / ...                   │
//! │       │   SQL (store-scoped, ledger-guarded)                 │
//! │       ▼                                                      │
//! │  SQLite database                                             │
//! │                                                              │
//! │  Benefits:                                                   │
//! │  • SQL is isolated in one place per aggregate                │
//! │  • Ledger balance guards cannot be bypassed by callers       │
//! │  • Each repository is independently testable in-memory       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Store-scoped master data
//! - [`visit::VisitRepository`] - Visit creation, finalize, void
//! - [`prepaid::PrepaidRepository`] - Stored-value accounts
//! - [`points::PointRepository`] - Loyalty point ledger
//! - [`inventory::InventoryRepository`] - Stock event ledger

pub mod catalog;
pub mod inventory;
pub mod points;
pub mod prepaid;
pub mod visit;
