//! Shared types used across the duel service crates.

pub mod amount;
pub mod pagination;
pub mod types;

pub use amount::{Amount, AmountError};
pub use pagination::PageRequest;
pub use types::{DuelId, IdError, UserId};
