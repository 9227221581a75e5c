//! Entry-price band.
//!
//! Joiners must stake a total within a tolerance of the creator's total so
//! every player risks roughly the same value.

use common::{Amount, UserId};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Duel, DuelError};

/// Allowed deviation from the creator's stake, in percent.
pub const ENTRY_PRICE_TOLERANCE_PERCENT: u32 = 5;

/// Inclusive range a joiner's total stake must fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntryPriceRange {
    pub min: Amount,
    pub max: Amount,
}

impl EntryPriceRange {
    /// Returns true if `amount` lies within the band, bounds included.
    pub fn contains(&self, amount: Amount) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Computes the band around the creator's total stake.
pub fn entry_price_range(duel: &Duel) -> Result<EntryPriceRange, DuelError> {
    let creator = duel.creator().ok_or(DuelError::CreatorNotFound)?;

    let creator_total = duel.stake_value_of(creator.user_id);
    if creator_total.is_zero() {
        return Err(DuelError::NoStakesFromCreator);
    }

    let tolerance = Decimal::new(i64::from(ENTRY_PRICE_TOLERANCE_PERCENT), 2);
    Ok(EntryPriceRange {
        min: creator_total.scale(Decimal::ONE - tolerance)?,
        max: creator_total.scale(Decimal::ONE + tolerance)?,
    })
}

/// Checks that everything `user_id` staked so far fits the entry band.
pub fn validate_entry(duel: &Duel, user_id: UserId) -> Result<(), DuelError> {
    if !duel.is_participant(user_id) {
        return Err(DuelError::ParticipantNotFound { user_id });
    }

    let range = entry_price_range(duel)?;
    let stake = duel.stake_value_of(user_id);
    if !range.contains(stake) {
        return Err(DuelError::StakeOutOfRange {
            stake,
            min: range.min,
            max: range.max,
        });
    }

    Ok(())
}
