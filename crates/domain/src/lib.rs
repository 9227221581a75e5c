//! Domain layer for the dice duel service.
//!
//! This crate provides:
//! - The `Duel` aggregate with its status machine
//! - Round resolution (tie-break rounds)
//! - The entry-price band that joiners' stakes must fall into
//! - Domain events published after state changes commit

pub mod duel;

pub use duel::{
    DiceValue, Duel, DuelCancelledData, DuelCompletedData, DuelCreatedData, DuelError, DuelEvent,
    DuelJoinedData, DuelParams, DuelSnapshot, DuelStatus, ENTRY_PRICE_TOLERANCE_PERCENT,
    EntryPriceRange, ItemId, MaxGifts, MaxPlayers, Participant, ReservationReleaseData, Roll,
    Round, RoundOutcome, Stake, StakedItem, TIMEOUT_AFTER_FIRST_ROUND, TIMEOUT_BEFORE_FIRST_ROUND,
    TOPIC_DUEL_CANCELLED, TOPIC_DUEL_COMPLETED, TOPIC_DUEL_CREATE_FAILED, TOPIC_DUEL_CREATED,
    TOPIC_DUEL_JOINED, entry_price_range, validate_entry,
};
