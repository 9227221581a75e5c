//! Rounds and round resolution.

use common::UserId;
use serde::{Deserialize, Serialize};

use super::{DuelError, Roll};

/// One round of dice throws.
///
/// The first round includes every participant; tie-break rounds include only
/// the players who shared the highest roll of the previous round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    round_number: u32,
    participants: Vec<UserId>,
    rolls: Vec<Roll>,
}

/// Result of evaluating a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Some participants have not rolled yet.
    Pending,

    /// Exactly one participant rolled the highest value.
    Winner(UserId),

    /// Several participants share the highest value and roll again.
    Tie(Vec<UserId>),
}

impl RoundOutcome {
    /// Returns true once every participant has rolled.
    pub fn is_finished(&self) -> bool {
        !matches!(self, RoundOutcome::Pending)
    }

    /// Players holding the highest roll. Empty while pending.
    pub fn winners(&self) -> Vec<UserId> {
        match self {
            RoundOutcome::Pending => Vec::new(),
            RoundOutcome::Winner(user_id) => vec![*user_id],
            RoundOutcome::Tie(users) => users.clone(),
        }
    }
}

impl Round {
    /// Creates an empty round.
    pub fn new(round_number: u32, participants: Vec<UserId>) -> Result<Self, DuelError> {
        if round_number == 0 {
            return Err(DuelError::InvalidRoundNumber(round_number));
        }
        if participants.is_empty() {
            return Err(DuelError::NoParticipants);
        }
        Ok(Self {
            round_number,
            participants,
            rolls: Vec::new(),
        })
    }

    /// Rebuilds a round loaded from storage.
    pub fn restore(
        round_number: u32,
        participants: Vec<UserId>,
        rolls: Vec<Roll>,
    ) -> Result<Self, DuelError> {
        let mut round = Self::new(round_number, participants)?;
        round.rolls = rolls;
        Ok(round)
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    pub fn rolls(&self) -> &[Roll] {
        &self.rolls
    }

    /// Returns true if the user plays in this round.
    pub fn includes(&self, user_id: UserId) -> bool {
        self.participants.contains(&user_id)
    }

    /// Returns true if the user already rolled in this round.
    pub fn has_rolled(&self, user_id: UserId) -> bool {
        self.rolls.iter().any(|r| r.user_id == user_id)
    }

    /// Participants that still owe a roll, in seating order.
    pub fn pending_participants(&self) -> Vec<UserId> {
        self.participants
            .iter()
            .copied()
            .filter(|user_id| !self.has_rolled(*user_id))
            .collect()
    }

    pub(crate) fn add_roll(&mut self, roll: Roll) -> Result<(), DuelError> {
        if !self.includes(roll.user_id) {
            return Err(DuelError::ParticipantNotFound {
                user_id: roll.user_id,
            });
        }
        if self.has_rolled(roll.user_id) {
            return Err(DuelError::AlreadyRolled {
                user_id: roll.user_id,
            });
        }
        self.rolls.push(roll);
        Ok(())
    }

    /// Resolves the round.
    ///
    /// Finished once the number of rolls covers every participant. Winners
    /// are all players holding the maximum value, in roll order.
    pub fn evaluate(&self) -> RoundOutcome {
        if self.rolls.len() < self.participants.len() {
            return RoundOutcome::Pending;
        }

        let Some(max) = self.rolls.iter().map(|r| r.dice_value).max() else {
            return RoundOutcome::Pending;
        };

        let mut winners: Vec<UserId> = self
            .rolls
            .iter()
            .filter(|r| r.dice_value == max)
            .map(|r| r.user_id)
            .collect();

        if winners.len() == 1 {
            RoundOutcome::Winner(winners.remove(0))
        } else {
            RoundOutcome::Tie(winners)
        }
    }
}
