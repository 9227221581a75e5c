//! Duel commands.
//!
//! Each command is a method on [`DuelCoordinator`](crate::DuelCoordinator)
//! taking one of the request types below.

mod auto_roll;
mod cancel_duel;
mod create_duel;
mod join_duel;
mod roll_dice;

pub use cancel_duel::CancelDuel;
pub use create_duel::CreateDuel;
pub use join_duel::JoinDuel;
pub use roll_dice::{RollDice, RollResult};
