//! Duel aggregate and related types.

mod aggregate;
mod entry_price;
mod events;
mod round;
mod state;
mod value_objects;

pub use aggregate::{Duel, DuelSnapshot, TIMEOUT_AFTER_FIRST_ROUND, TIMEOUT_BEFORE_FIRST_ROUND};
pub use entry_price::{ENTRY_PRICE_TOLERANCE_PERCENT, EntryPriceRange, entry_price_range, validate_entry};
pub use events::{
    DuelCancelledData, DuelCompletedData, DuelCreatedData, DuelEvent, DuelJoinedData,
    ReservationReleaseData, TOPIC_DUEL_CANCELLED, TOPIC_DUEL_COMPLETED, TOPIC_DUEL_CREATE_FAILED,
    TOPIC_DUEL_CREATED, TOPIC_DUEL_JOINED,
};
pub use round::{Round, RoundOutcome};
pub use state::DuelStatus;
pub use value_objects::{
    DiceValue, DuelParams, ItemId, MaxGifts, MaxPlayers, Participant, Roll, Stake, StakedItem,
};

use common::{Amount, AmountError, IdError, UserId};
use thiserror::Error;

/// Errors that can occur during duel operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuelError {
    /// Duel or user identifier was malformed.
    #[error(transparent)]
    InvalidId(#[from] IdError),

    /// Stake value was malformed.
    #[error(transparent)]
    InvalidAmount(#[from] AmountError),

    /// Max players must be between 2 and 4.
    #[error("Invalid max players: {0} (must be between 2 and 4)")]
    InvalidMaxPlayers(u8),

    /// Max gifts must be between 1 and 10.
    #[error("Invalid max gifts: {0} (must be between 1 and 10)")]
    InvalidMaxGifts(u8),

    /// Dice values range from 1 to 6.
    #[error("Invalid dice value: {0} (must be between 1 and 6)")]
    InvalidDiceValue(u8),

    /// Round numbers start at 1.
    #[error("Invalid round number: {0} (must be greater than 0)")]
    InvalidRoundNumber(u32),

    /// A round needs at least one participant.
    #[error("Round has no participants")]
    NoParticipants,

    /// Staked item ID is required.
    #[error("Item ID is required")]
    EmptyItemId,

    /// Staked item title is required.
    #[error("Item title is required")]
    EmptyItemTitle,

    /// Unknown status string read from storage.
    #[error("Unknown duel status: {0}")]
    UnknownStatus(String),

    /// Duel already has `max_players` participants.
    #[error("Duel is full: max {max_players} players")]
    MaxPlayersExceeded { max_players: u8 },

    /// User is already a participant.
    #[error("User {user_id} already joined this duel")]
    AlreadyJoined { user_id: UserId },

    /// User is not a participant of the duel or the current round.
    #[error("Participant not found: {user_id}")]
    ParticipantNotFound { user_id: UserId },

    /// Operation needs an in-progress duel.
    #[error("Duel is not in progress (status: {status})")]
    DuelNotInProgress { status: DuelStatus },

    /// Duel is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: DuelStatus,
        action: &'static str,
    },

    /// Duel cannot start until every seat is taken.
    #[error("Duel is not full: {joined} of {required} players joined")]
    NotEnoughParticipants { joined: usize, required: u8 },

    /// No round has been started yet.
    #[error("No round started")]
    NoRoundStarted,

    /// User already rolled in the current round.
    #[error("User {user_id} already rolled in this round")]
    AlreadyRolled { user_id: UserId },

    /// Duel has no creator participant.
    #[error("Creator not found")]
    CreatorNotFound,

    /// Creator staked nothing of value, so no entry band exists.
    #[error("Creator has no stakes")]
    NoStakesFromCreator,

    /// Joiner's total stake falls outside the entry band.
    #[error("Stake {stake} is out of range [{min}, {max}]")]
    StakeOutOfRange { stake: Amount, min: Amount, max: Amount },
}
