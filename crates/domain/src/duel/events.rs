//! Duel domain events.
//!
//! Published after the state change they describe has been committed.

use chrono::{DateTime, Utc};
use common::{Amount, DuelId, UserId};
use serde::{Deserialize, Serialize};

use super::{Duel, DuelParams, ItemId, Stake};

pub const TOPIC_DUEL_CREATED: &str = "duel.created";
pub const TOPIC_DUEL_JOINED: &str = "duel.joined";
pub const TOPIC_DUEL_COMPLETED: &str = "duel.completed";
pub const TOPIC_DUEL_CANCELLED: &str = "duel.cancelled";
/// Tells the custody service to hand a reserved item back to its owner.
pub const TOPIC_DUEL_CREATE_FAILED: &str = "duel.create.failed";

/// Events emitted by duel commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DuelEvent {
    /// Duel was opened.
    DuelCreated(DuelCreatedData),

    /// A player took a seat.
    DuelJoined(DuelJoinedData),

    /// A winner was determined.
    DuelCompleted(DuelCompletedData),

    /// Creator cancelled the duel.
    DuelCancelled(DuelCancelledData),

    /// A reserved item must be returned.
    ReservationReleased(ReservationReleaseData),
}

impl DuelEvent {
    /// Returns the bus topic for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            DuelEvent::DuelCreated(_) => TOPIC_DUEL_CREATED,
            DuelEvent::DuelJoined(_) => TOPIC_DUEL_JOINED,
            DuelEvent::DuelCompleted(_) => TOPIC_DUEL_COMPLETED,
            DuelEvent::DuelCancelled(_) => TOPIC_DUEL_CANCELLED,
            DuelEvent::ReservationReleased(_) => TOPIC_DUEL_CREATE_FAILED,
        }
    }

    /// Returns the message key: the duel ID, or the item ID for releases.
    pub fn key(&self) -> &str {
        match self {
            DuelEvent::DuelCreated(data) => data.duel_id.as_str(),
            DuelEvent::DuelJoined(data) => data.duel_id.as_str(),
            DuelEvent::DuelCompleted(data) => data.duel_id.as_str(),
            DuelEvent::DuelCancelled(data) => data.duel_id.as_str(),
            DuelEvent::ReservationReleased(data) => data.item_id.as_str(),
        }
    }

    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            DuelEvent::DuelCreated(_) => "DuelCreated",
            DuelEvent::DuelJoined(_) => "DuelJoined",
            DuelEvent::DuelCompleted(_) => "DuelCompleted",
            DuelEvent::DuelCancelled(_) => "DuelCancelled",
            DuelEvent::ReservationReleased(_) => "ReservationReleased",
        }
    }

    /// Serializes the event for the wire.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

// Event constructors
impl DuelEvent {
    pub fn duel_created(duel: &Duel) -> Self {
        DuelEvent::DuelCreated(DuelCreatedData {
            duel_id: duel.id().clone(),
            display_number: duel.display_number(),
            params: *duel.params(),
            creator_id: duel.creator().map(|p| p.user_id),
            stakes: duel.stakes().to_vec(),
            created_at: duel.created_at(),
        })
    }

    pub fn duel_joined(duel: &Duel, user_id: UserId) -> Self {
        DuelEvent::DuelJoined(DuelJoinedData {
            duel_id: duel.id().clone(),
            user_id,
            participant_count: duel.participants().len(),
            status: duel.status().as_str().to_string(),
            next_roll_deadline: duel.next_roll_deadline(),
            joined_at: Utc::now(),
        })
    }

    /// Returns `None` while the duel has no winner.
    pub fn duel_completed(duel: &Duel) -> Option<Self> {
        let winner_id = duel.winner_id()?;
        Some(DuelEvent::DuelCompleted(DuelCompletedData {
            duel_id: duel.id().clone(),
            display_number: duel.display_number(),
            winner_id,
            total_stake_value: duel.total_stake_value(),
            stakes: duel.stakes().to_vec(),
            completed_at: duel.completed_at().unwrap_or_else(Utc::now),
        }))
    }

    pub fn duel_cancelled(duel: &Duel) -> Self {
        DuelEvent::DuelCancelled(DuelCancelledData {
            duel_id: duel.id().clone(),
            cancelled_at: duel.completed_at().unwrap_or_else(Utc::now),
        })
    }

    pub fn reservation_released(item_id: ItemId, duel_id: Option<DuelId>) -> Self {
        DuelEvent::ReservationReleased(ReservationReleaseData { item_id, duel_id })
    }
}

/// Data for DuelCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelCreatedData {
    pub duel_id: DuelId,
    pub display_number: i64,
    pub params: DuelParams,
    pub creator_id: Option<UserId>,
    pub stakes: Vec<Stake>,
    pub created_at: DateTime<Utc>,
}

/// Data for DuelJoined event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelJoinedData {
    pub duel_id: DuelId,
    pub user_id: UserId,
    pub participant_count: usize,
    /// Status after the join; `in_progress` when the join filled the duel.
    pub status: String,
    pub next_roll_deadline: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

/// Data for DuelCompleted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelCompletedData {
    pub duel_id: DuelId,
    pub display_number: i64,
    pub winner_id: UserId,
    pub total_stake_value: Amount,
    /// Every staked item; all of them go to the winner.
    pub stakes: Vec<Stake>,
    pub completed_at: DateTime<Utc>,
}

/// Data for DuelCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuelCancelledData {
    pub duel_id: DuelId,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for ReservationReleased event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationReleaseData {
    pub item_id: ItemId,
    /// Unknown when the duel never made it to storage.
    pub duel_id: Option<DuelId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duel::{MaxGifts, MaxPlayers, Participant};

    fn duel() -> Duel {
        let params = DuelParams::new(true, MaxPlayers::new(2).unwrap(), MaxGifts::new(1).unwrap());
        Duel::create(params, UserId::new(10).unwrap(), "")
    }

    #[test]
    fn test_topics() {
        let duel = duel();
        assert_eq!(DuelEvent::duel_created(&duel).topic(), "duel.created");
        assert_eq!(DuelEvent::duel_cancelled(&duel).topic(), "duel.cancelled");
        let release = DuelEvent::reservation_released(ItemId::new("gift-9").unwrap(), None);
        assert_eq!(release.topic(), "duel.create.failed");
        assert_eq!(release.key(), "gift-9");
    }

    #[test]
    fn test_joined_event_reports_start() {
        let mut duel = duel();
        let joiner = UserId::new(11).unwrap();
        duel.add_participant(Participant::joiner(joiner, "")).unwrap();
        duel.start().unwrap();

        let DuelEvent::DuelJoined(data) = DuelEvent::duel_joined(&duel, joiner) else {
            panic!("expected DuelJoined");
        };
        assert_eq!(data.participant_count, 2);
        assert_eq!(data.status, "in_progress");
        assert!(data.next_roll_deadline.is_some());
    }

    #[test]
    fn test_completed_requires_winner() {
        let mut duel = duel();
        assert!(DuelEvent::duel_completed(&duel).is_none());

        let joiner = UserId::new(11).unwrap();
        duel.add_participant(Participant::joiner(joiner, "")).unwrap();
        duel.start().unwrap();
        duel.complete(joiner).unwrap();

        let event = DuelEvent::duel_completed(&duel).unwrap();
        assert_eq!(event.topic(), "duel.completed");
        assert_eq!(event.key(), duel.id().as_str());
    }

    #[test]
    fn test_payload_is_tagged_json() {
        let event = DuelEvent::duel_created(&duel());
        let payload = event.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["type"], "DuelCreated");
        assert_eq!(value["data"]["creator_id"], 10);
    }
}
