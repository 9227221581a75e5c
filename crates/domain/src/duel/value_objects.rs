//! Value objects for the duel domain.

use chrono::{DateTime, Utc};
use common::{Amount, UserId};
use serde::{Deserialize, Serialize};

use super::DuelError;

/// Number of seats in a duel (2 to 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MaxPlayers(u8);

impl MaxPlayers {
    pub const MIN: u8 = 2;
    pub const MAX: u8 = 4;

    pub fn new(value: u8) -> Result<Self, DuelError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(DuelError::InvalidMaxPlayers(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MaxPlayers {
    type Error = DuelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MaxPlayers> for u8 {
    fn from(value: MaxPlayers) -> Self {
        value.0
    }
}

/// Maximum number of items a single player may stake (1 to 10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct MaxGifts(u8);

impl MaxGifts {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    pub fn new(value: u8) -> Result<Self, DuelError> {
        if !(Self::MIN..=Self::MAX).contains(&value) {
            return Err(DuelError::InvalidMaxGifts(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for MaxGifts {
    type Error = DuelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MaxGifts> for u8 {
    fn from(value: MaxGifts) -> Self {
        value.0
    }
}

/// Settings chosen by the creator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuelParams {
    /// Private duels are joined by invitation only.
    pub is_private: bool,
    pub max_players: MaxPlayers,
    pub max_gifts: MaxGifts,
}

impl DuelParams {
    pub fn new(is_private: bool, max_players: MaxPlayers, max_gifts: MaxGifts) -> Self {
        Self {
            is_private,
            max_players,
            max_gifts,
        }
    }
}

/// A player seated in a duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub photo_url: String,
    pub is_creator: bool,
}

impl Participant {
    /// The player who opened the duel.
    pub fn creator(user_id: UserId, photo_url: impl Into<String>) -> Self {
        Self {
            user_id,
            photo_url: photo_url.into(),
            is_creator: true,
        }
    }

    /// A player joining an existing duel.
    pub fn joiner(user_id: UserId, photo_url: impl Into<String>) -> Self {
        Self {
            user_id,
            photo_url: photo_url.into(),
            is_creator: false,
        }
    }
}

/// Identifier of an item held by the custody service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Result<Self, DuelError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DuelError::EmptyItemId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ItemId {
    type Error = DuelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ItemId> for String {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

/// An item put into the pot.
///
/// `value` always comes from the custody service, never from the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakedItem {
    pub id: ItemId,
    pub title: String,
    pub slug: String,
    pub value: Amount,
}

impl StakedItem {
    pub fn new(
        id: ItemId,
        title: impl Into<String>,
        slug: impl Into<String>,
        value: Amount,
    ) -> Result<Self, DuelError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(DuelError::EmptyItemTitle);
        }
        Ok(Self {
            id,
            title,
            slug: slug.into(),
            value,
        })
    }
}

/// An item staked by a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub user_id: UserId,
    pub item: StakedItem,
}

impl Stake {
    pub fn new(user_id: UserId, item: StakedItem) -> Self {
        Self { user_id, item }
    }
}

/// Face value of a six-sided die.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DiceValue(u8);

impl DiceValue {
    pub fn new(value: u8) -> Result<Self, DuelError> {
        if !(1..=6).contains(&value) {
            return Err(DuelError::InvalidDiceValue(value));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for DiceValue {
    type Error = DuelError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiceValue> for u8 {
    fn from(value: DiceValue) -> Self {
        value.0
    }
}

impl std::fmt::Display for DiceValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single die throw within a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub user_id: UserId,
    pub dice_value: DiceValue,
    pub rolled_at: DateTime<Utc>,
    /// Set when the server rolled on the player's behalf after the deadline.
    pub is_auto_rolled: bool,
}

impl Roll {
    /// A roll made by the player.
    pub fn manual(user_id: UserId, dice_value: DiceValue) -> Self {
        Self {
            user_id,
            dice_value,
            rolled_at: Utc::now(),
            is_auto_rolled: false,
        }
    }

    /// A roll made by the server after the deadline passed.
    pub fn auto(user_id: UserId, dice_value: DiceValue) -> Self {
        Self {
            user_id,
            dice_value,
            rolled_at: Utc::now(),
            is_auto_rolled: true,
        }
    }
}
