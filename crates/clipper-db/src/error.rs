//! # Database Error Types
//!
//! Error types for persistence operations.
//!
//! ## Error Flow
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Error Propagation                        │
//! │                                                              │
//! │  SQLite Error (sqlx::Error)                                  │
//! │       │                                                      │
//! │       ▼                                                      │
//! │  DbError (this module) ← adds context and categorization     │
//! │       │      ▲                                               │
//! │       │      └── CoreError (balance guards, status checks)   │
//! │       ▼          passes through unchanged so callers can     │
//! │  Request layer   match on the specific business failure      │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

use clipper_core::CoreError;
use thiserror::Error;

/// Database operation errors.
///
/// Wraps sqlx errors with context and carries business failures from
/// clipper-core through the persistence boundary untranslated.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found.
    ///
    /// ## When This Occurs
    /// - ID doesn't exist
    /// - ID exists under a DIFFERENT store (cross-tenant lookups must be
    ///   indistinguishable from a miss; there is deliberately no
    ///   "forbidden" variant)
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A business rule refused the operation (insufficient balance,
    /// insufficient points, invalid visit status, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Request validation failed; the message is every field problem
    /// joined into one human-readable diagnostic.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates the joined-message validation failure from collected field
    /// errors.
    pub fn validation(errors: &[clipper_core::ValidationError]) -> Self {
        DbError::Validation(clipper_core::validation::join_messages(errors))
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // UNIQUE: "UNIQUE constraint failed: <table>.<column>"
                // FK: "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
