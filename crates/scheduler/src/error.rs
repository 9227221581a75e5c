use thiserror::Error;

/// Errors that can occur when scheduling or claiming auto-roll tasks.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The backing queue rejected the operation.
    #[error("Scheduler unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;
