use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced when constructing identifiers from raw input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Duel id was empty.
    #[error("duel id is required")]
    EmptyDuelId,

    /// User ids are positive integers.
    #[error("user id must be greater than 0, got {0}")]
    InvalidUserId(i64),
}

/// Unique identifier for a duel.
///
/// Opaque and never empty. New duels get a random UUID string, but any
/// non-empty string loaded from storage is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DuelId(String);

impl DuelId {
    /// Creates a new random duel ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parses a duel ID, rejecting empty strings.
    pub fn parse(id: impl Into<String>) -> Result<Self, IdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdError::EmptyDuelId);
        }
        Ok(Self(id))
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for DuelId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DuelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DuelId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DuelId> for String {
    fn from(id: DuelId) -> Self {
        id.0
    }
}

impl AsRef<str> for DuelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Telegram user identifier of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct UserId(i64);

impl UserId {
    /// Creates a user ID, rejecting zero and negative values.
    pub fn new(id: i64) -> Result<Self, IdError> {
        if id <= 0 {
            return Err(IdError::InvalidUserId(id));
        }
        Ok(Self(id))
    }

    /// Returns the raw integer value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for UserId {
    type Error = IdError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for i64 {
    fn from(id: UserId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duel_id_new_creates_unique_ids() {
        let id1 = DuelId::new();
        let id2 = DuelId::new();
        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn duel_id_rejects_empty_string() {
        assert_eq!(DuelId::parse(""), Err(IdError::EmptyDuelId));
        assert_eq!(DuelId::parse("duel-1").unwrap().as_str(), "duel-1");
    }

    #[test]
    fn duel_id_deserialization_validates() {
        let result: Result<DuelId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());

        let id: DuelId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(id.to_string(), "abc");
    }

    #[test]
    fn user_id_must_be_positive() {
        assert_eq!(UserId::new(0), Err(IdError::InvalidUserId(0)));
        assert_eq!(UserId::new(-5), Err(IdError::InvalidUserId(-5)));
        assert_eq!(UserId::new(42).unwrap().as_i64(), 42);
    }

    #[test]
    fn user_id_serializes_as_plain_integer() {
        let id = UserId::new(777).unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "777");
        assert!(serde_json::from_str::<UserId>("-1").is_err());
    }
}
