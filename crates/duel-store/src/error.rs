use common::DuelId;
use domain::DuelError;
use thiserror::Error;

/// Errors that can occur when reading or writing duels.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The duel does not exist.
    #[error("Duel not found: {0}")]
    DuelNotFound(DuelId),

    /// A uniqueness or reference constraint was violated.
    #[error("Constraint violated: {0}")]
    Conflict(String),

    /// A stored row could not be turned back into a domain value.
    #[error("Invalid stored data: {0}")]
    InvalidData(#[from] DuelError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
