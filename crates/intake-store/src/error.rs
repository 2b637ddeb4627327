//! Error types for the ledger.

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The durable store cannot be reached or rejected the statement.
    #[error("database error: {0}")]
    Database(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The entity kind that was looked up.
        entity: &'static str,
        /// The id that was not found.
        id: i64,
    },

    /// A uniqueness constraint rejected the write.
    ///
    /// For the redemption tables this is the expected "lost the race"
    /// signal and is absorbed by the caller; for admin writes (duplicate
    /// code or slug) it surfaces as a plain conflict.
    #[error("conflict: {0}")]
    Conflict(String),
}

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db) = err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                return Self::Conflict(db.message().to_string());
            }
        }
        Self::Database(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(err.to_string())
    }
}
