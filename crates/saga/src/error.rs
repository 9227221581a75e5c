//! Command error types.

use common::{DuelId, UserId};
use domain::{DuelError, ItemId};
use duel_store::StoreError;
use scheduler::SchedulerError;
use thiserror::Error;

/// Errors that can occur while running a duel command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The duel rejected the change.
    #[error("Domain error: {0}")]
    Domain(#[from] DuelError),

    /// Duel storage failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The auto-roll scheduler failed.
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Custody service error.
    #[error("Custody service error: {0}")]
    Custody(String),

    /// Dice service error.
    #[error("Dice service error: {0}")]
    Dice(String),

    /// Event publisher error.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Duel not found.
    #[error("Duel not found: {0}")]
    DuelNotFound(DuelId),

    /// The request named no items to stake.
    #[error("At least one item is required")]
    NoItems,

    /// The request named more items than the duel allows per player.
    #[error("Too many items: {count} (max {max_gifts})")]
    TooManyItems { count: usize, max_gifts: u8 },

    /// The request named the same item twice.
    #[error("Duplicate item: {0}")]
    DuplicateItem(ItemId),

    /// Only the creator may cancel a duel.
    #[error("User {user_id} is not the creator of this duel")]
    NotCreator { user_id: UserId },
}

impl CommandError {
    /// Returns true if the error came from an external collaborator rather
    /// than from the request itself.
    pub fn is_external(&self) -> bool {
        matches!(
            self,
            CommandError::Store(_)
                | CommandError::Scheduler(_)
                | CommandError::Custody(_)
                | CommandError::Dice(_)
                | CommandError::Publish(_)
                | CommandError::Serialization(_)
        )
    }
}

/// Convenience type alias for command results.
pub type Result<T> = std::result::Result<T, CommandError>;
