//! Duel command orchestration.
//!
//! Commands drive the duel aggregate through one storage transaction each,
//! coordinating with services that do not share that transaction:
//!
//! - custody reserves the staked items
//! - the dice service supplies rolls
//! - the scheduler arms the per-round auto-roll
//! - the publisher announces what happened
//!
//! Custody reservations are the only effects that need undoing. If a create
//! or join aborts, every item it reserved is released through the
//! [`CompensationLedger`] before the error is returned.

pub mod commands;
pub mod compensation;
pub mod coordinator;
pub mod error;
pub mod query;
pub mod services;

pub use commands::{CancelDuel, CreateDuel, JoinDuel, RollDice, RollResult};
pub use compensation::CompensationLedger;
pub use coordinator::{DuelCoordinator, RoundProgress};
pub use error::{CommandError, Result};
pub use query::{DuelPage, DuelQueries};
pub use services::{
    CustodyService, DiceService, EventPublisher, InMemoryCustodyService, InMemoryEventPublisher,
    ItemDetails, PublishedMessage, RandomDiceService, ScriptedDiceService,
};
