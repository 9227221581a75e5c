//! Duel aggregate implementation.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::{Amount, DuelId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    DuelError, DuelParams, DuelStatus, ItemId, Participant, Roll, Round, RoundOutcome, Stake,
};

/// Time players get to roll in the first round.
pub const TIMEOUT_BEFORE_FIRST_ROUND: Duration = Duration::from_secs(60);

/// Time players get to roll in every tie-break round.
pub const TIMEOUT_AFTER_FIRST_ROUND: Duration = Duration::from_secs(30);

/// Duel aggregate root.
///
/// Owns the seating, the pot and the rounds of a single duel. All mutation
/// goes through the command methods below, which enforce the status machine
/// in [`DuelStatus`] and the per-round roll rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duel {
    id: DuelId,

    /// Sequential number assigned by storage, zero until persisted.
    display_number: i64,

    params: DuelParams,
    status: DuelStatus,
    winner_id: Option<UserId>,

    /// When the auto-roll for the current round fires.
    next_roll_deadline: Option<DateTime<Utc>>,

    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,

    /// Seating order; the creator is always first.
    participants: Vec<Participant>,
    stakes: Vec<Stake>,
    rounds: Vec<Round>,
}

/// Full duel state as loaded from storage.
#[derive(Debug, Clone)]
pub struct DuelSnapshot {
    pub id: DuelId,
    pub display_number: i64,
    pub params: DuelParams,
    pub status: DuelStatus,
    pub winner_id: Option<UserId>,
    pub next_roll_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub participants: Vec<Participant>,
    pub stakes: Vec<Stake>,
    pub rounds: Vec<Round>,
}

impl Duel {
    /// Opens a new duel seated with its creator.
    pub fn create(params: DuelParams, creator_id: UserId, photo_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: DuelId::new(),
            display_number: 0,
            params,
            status: DuelStatus::WaitingForOpponent,
            winner_id: None,
            next_roll_deadline: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            participants: vec![Participant::creator(creator_id, photo_url)],
            stakes: Vec::new(),
            rounds: Vec::new(),
        }
    }

    /// Rebuilds a duel from stored state without re-running validation.
    pub fn restore(snapshot: DuelSnapshot) -> Self {
        Self {
            id: snapshot.id,
            display_number: snapshot.display_number,
            params: snapshot.params,
            status: snapshot.status,
            winner_id: snapshot.winner_id,
            next_roll_deadline: snapshot.next_roll_deadline,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            completed_at: snapshot.completed_at,
            participants: snapshot.participants,
            stakes: snapshot.stakes,
            rounds: snapshot.rounds,
        }
    }

    /// Records the display number handed out by storage.
    pub fn assign_display_number(&mut self, display_number: i64) {
        self.display_number = display_number;
    }
}

// Query methods
impl Duel {
    pub fn id(&self) -> &DuelId {
        &self.id
    }

    pub fn display_number(&self) -> i64 {
        self.display_number
    }

    pub fn params(&self) -> &DuelParams {
        &self.params
    }

    pub fn status(&self) -> DuelStatus {
        self.status
    }

    pub fn winner_id(&self) -> Option<UserId> {
        self.winner_id
    }

    pub fn next_roll_deadline(&self) -> Option<DateTime<Utc>> {
        self.next_roll_deadline
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn stakes(&self) -> &[Stake] {
        &self.stakes
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// Returns the latest round, if any.
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.last()
    }

    /// Returns the participant who opened the duel.
    pub fn creator(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.is_creator)
    }

    pub fn participant(&self, user_id: UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn is_participant(&self, user_id: UserId) -> bool {
        self.participant(user_id).is_some()
    }

    /// Returns true once every seat is taken.
    pub fn is_full(&self) -> bool {
        self.participants.len() >= usize::from(self.params.max_players.get())
    }

    /// Returns the stakes placed by one user.
    pub fn stakes_of(&self, user_id: UserId) -> impl Iterator<Item = &Stake> {
        self.stakes.iter().filter(move |s| s.user_id == user_id)
    }

    /// Sum of the values staked by one user.
    pub fn stake_value_of(&self, user_id: UserId) -> Amount {
        self.stakes_of(user_id).map(|s| s.item.value).sum()
    }

    /// Sum of every staked item's value.
    pub fn total_stake_value(&self) -> Amount {
        self.stakes.iter().map(|s| s.item.value).sum()
    }

    /// How long players get to roll: longer before the first round exists.
    pub fn timeout_for_round(&self) -> Duration {
        if self.rounds.is_empty() {
            TIMEOUT_BEFORE_FIRST_ROUND
        } else {
            TIMEOUT_AFTER_FIRST_ROUND
        }
    }

    /// Returns true if the duel is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods
impl Duel {
    /// Seats a new player.
    pub fn add_participant(&mut self, participant: Participant) -> Result<(), DuelError> {
        if self.is_participant(participant.user_id) {
            return Err(DuelError::AlreadyJoined {
                user_id: participant.user_id,
            });
        }

        if self.is_full() {
            return Err(DuelError::MaxPlayersExceeded {
                max_players: self.params.max_players.get(),
            });
        }

        if !self.status.can_join() {
            return Err(DuelError::InvalidStateTransition {
                current_state: self.status,
                action: "join",
            });
        }

        self.participants.push(participant);
        self.touch();
        Ok(())
    }

    /// Adds an item to the pot.
    ///
    /// The per-user `max_gifts` limit is enforced by the caller, which sees
    /// the whole batch of items at once.
    pub fn place_stake(&mut self, stake: Stake) -> Result<(), DuelError> {
        if !self.is_participant(stake.user_id) {
            return Err(DuelError::ParticipantNotFound {
                user_id: stake.user_id,
            });
        }

        self.stakes.push(stake);
        self.touch();
        Ok(())
    }

    /// Replaces the value of a staked item with a fresh quote from custody.
    ///
    /// Returns false if no stake holds the item.
    pub fn revalue_stake(&mut self, item_id: &ItemId, value: Amount) -> bool {
        match self.stakes.iter_mut().find(|s| &s.item.id == item_id) {
            Some(stake) => {
                stake.item.value = value;
                true
            }
            None => false,
        }
    }

    /// Moves a full duel into play and opens round 1 over every participant.
    pub fn start(&mut self) -> Result<(), DuelError> {
        if !self.status.can_start() {
            return Err(DuelError::InvalidStateTransition {
                current_state: self.status,
                action: "start",
            });
        }

        if !self.is_full() {
            return Err(DuelError::NotEnoughParticipants {
                joined: self.participants.len(),
                required: self.params.max_players.get(),
            });
        }

        // The first round gets the longer timeout, so compute it before the
        // round exists.
        let timeout = self.timeout_for_round();
        let players = self.participants.iter().map(|p| p.user_id).collect();
        self.start_round(players)?;
        self.status = DuelStatus::InProgress;
        self.next_roll_deadline = Some(Utc::now() + to_delta(timeout));
        self.touch();
        Ok(())
    }

    /// Appends the next round over exactly `players`.
    pub fn start_round(&mut self, players: Vec<UserId>) -> Result<&Round, DuelError> {
        let number = u32::try_from(self.rounds.len() + 1)
            .map_err(|_| DuelError::InvalidRoundNumber(u32::MAX))?;
        let round = Round::new(number, players)?;
        self.rounds.push(round);
        self.touch();
        Ok(&self.rounds[self.rounds.len() - 1])
    }

    /// Pushes the roll deadline out by the current round timeout.
    pub fn renew_roll_deadline(&mut self) -> DateTime<Utc> {
        let deadline = Utc::now() + to_delta(self.timeout_for_round());
        self.next_roll_deadline = Some(deadline);
        self.touch();
        deadline
    }

    /// Records a roll in the current round.
    pub fn add_roll_to_current_round(&mut self, roll: Roll) -> Result<(), DuelError> {
        let status = self.status;
        let round = self.rounds.last_mut().ok_or(DuelError::NoRoundStarted)?;

        if !status.can_roll() {
            return Err(DuelError::DuelNotInProgress { status });
        }

        round.add_roll(roll)?;
        self.touch();
        Ok(())
    }

    /// Resolves the current round.
    pub fn evaluate_current_round(&self) -> Result<RoundOutcome, DuelError> {
        self.current_round()
            .map(Round::evaluate)
            .ok_or(DuelError::NoRoundStarted)
    }

    /// Ends the duel with a winner.
    pub fn complete(&mut self, winner_id: UserId) -> Result<(), DuelError> {
        if !self.status.can_complete() {
            return Err(DuelError::DuelNotInProgress {
                status: self.status,
            });
        }

        if !self.is_participant(winner_id) {
            return Err(DuelError::ParticipantNotFound { user_id: winner_id });
        }

        let now = Utc::now();
        self.status = DuelStatus::Completed;
        self.winner_id = Some(winner_id);
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Cancels a duel that has not started.
    pub fn cancel(&mut self) -> Result<(), DuelError> {
        if !self.status.can_cancel() {
            return Err(DuelError::InvalidStateTransition {
                current_state: self.status,
                action: "cancel",
            });
        }

        let now = Utc::now();
        self.status = DuelStatus::Cancelled;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duel::{DiceValue, ItemId, MaxGifts, MaxPlayers, StakedItem};

    fn user(id: i64) -> UserId {
        UserId::new(id).unwrap()
    }

    fn params(max_players: u8) -> DuelParams {
        DuelParams::new(
            false,
            MaxPlayers::new(max_players).unwrap(),
            MaxGifts::new(3).unwrap(),
        )
    }

    fn stake(user_id: i64, item: &str, value: &str) -> Stake {
        Stake::new(
            user(user_id),
            StakedItem::new(
                ItemId::new(item).unwrap(),
                format!("Gift {item}"),
                item,
                value.parse().unwrap(),
            )
            .unwrap(),
        )
    }

    fn roll(user_id: i64, value: u8) -> Roll {
        Roll::manual(user(user_id), DiceValue::new(value).unwrap())
    }

    fn started_duel() -> Duel {
        let mut duel = Duel::create(params(2), user(1), "");
        duel.add_participant(Participant::joiner(user(2), "")).unwrap();
        duel.start().unwrap();
        duel
    }

    #[test]
    fn test_create_seats_creator() {
        let duel = Duel::create(params(2), user(1), "https://photo");
        assert_eq!(duel.status(), DuelStatus::WaitingForOpponent);
        assert_eq!(duel.participants().len(), 1);
        assert_eq!(duel.creator().unwrap().user_id, user(1));
        assert!(duel.rounds().is_empty());
        assert!(duel.next_roll_deadline().is_none());
    }

    #[test]
    fn test_add_participant_rejects_duplicate() {
        let mut duel = Duel::create(params(3), user(1), "");
        let result = duel.add_participant(Participant::joiner(user(1), ""));
        assert_eq!(result, Err(DuelError::AlreadyJoined { user_id: user(1) }));
        assert_eq!(duel.participants().len(), 1);
    }

    #[test]
    fn test_add_participant_respects_capacity() {
        let mut duel = Duel::create(params(2), user(1), "");
        duel.add_participant(Participant::joiner(user(2), "")).unwrap();

        let result = duel.add_participant(Participant::joiner(user(3), ""));
        assert_eq!(result, Err(DuelError::MaxPlayersExceeded { max_players: 2 }));
        assert_eq!(duel.participants().len(), 2);
    }

    #[test]
    fn test_join_cancelled_duel_fails() {
        let mut duel = Duel::create(params(3), user(1), "");
        duel.cancel().unwrap();
        let result = duel.add_participant(Participant::joiner(user(2), ""));
        assert!(matches!(
            result,
            Err(DuelError::InvalidStateTransition { action: "join", .. })
        ));
    }

    #[test]
    fn test_place_stake_requires_participant() {
        let mut duel = Duel::create(params(2), user(1), "");
        duel.place_stake(stake(1, "a", "1.00")).unwrap();

        let result = duel.place_stake(stake(2, "b", "1.00"));
        assert_eq!(result, Err(DuelError::ParticipantNotFound { user_id: user(2) }));
        assert_eq!(duel.stakes().len(), 1);
    }

    #[test]
    fn test_stake_totals() {
        let mut duel = Duel::create(params(2), user(1), "");
        duel.add_participant(Participant::joiner(user(2), "")).unwrap();
        duel.place_stake(stake(1, "a", "2.50")).unwrap();
        duel.place_stake(stake(1, "b", "1.25")).unwrap();
        duel.place_stake(stake(2, "c", "4.00")).unwrap();

        assert_eq!(duel.stake_value_of(user(1)).to_string(), "3.75");
        assert_eq!(duel.total_stake_value().to_string(), "7.75");
        assert_eq!(duel.stakes_of(user(2)).count(), 1);
    }

    #[test]
    fn test_start_opens_first_round_with_deadline() {
        let before = Utc::now();
        let duel = started_duel();

        assert_eq!(duel.status(), DuelStatus::InProgress);
        assert_eq!(duel.rounds().len(), 1);
        let round = duel.current_round().unwrap();
        assert_eq!(round.round_number(), 1);
        assert_eq!(round.participants(), &[user(1), user(2)]);

        let deadline = duel.next_roll_deadline().unwrap();
        assert!(deadline >= before + TimeDelta::seconds(60));
    }

    #[test]
    fn test_start_requires_full_duel() {
        let mut duel = Duel::create(params(3), user(1), "");
        duel.add_participant(Participant::joiner(user(2), "")).unwrap();
        assert_eq!(
            duel.start(),
            Err(DuelError::NotEnoughParticipants {
                joined: 2,
                required: 3
            })
        );
        assert_eq!(duel.status(), DuelStatus::WaitingForOpponent);
    }

    #[test]
    fn test_start_twice_fails() {
        let mut duel = started_duel();
        assert!(matches!(
            duel.start(),
            Err(DuelError::InvalidStateTransition { action: "start", .. })
        ));
        assert_eq!(duel.rounds().len(), 1);
    }

    #[test]
    fn test_timeout_shrinks_after_first_round() {
        let waiting = Duel::create(params(2), user(1), "");
        assert_eq!(waiting.timeout_for_round(), TIMEOUT_BEFORE_FIRST_ROUND);
        assert_eq!(started_duel().timeout_for_round(), TIMEOUT_AFTER_FIRST_ROUND);
    }

    #[test]
    fn test_roll_without_round_fails() {
        let mut duel = Duel::create(params(2), user(1), "");
        assert_eq!(
            duel.add_roll_to_current_round(roll(1, 3)),
            Err(DuelError::NoRoundStarted)
        );
        assert_eq!(
            duel.evaluate_current_round(),
            Err(DuelError::NoRoundStarted)
        );
    }

    #[test]
    fn test_duplicate_roll_rejected() {
        let mut duel = started_duel();
        duel.add_roll_to_current_round(roll(1, 3)).unwrap();

        assert_eq!(
            duel.add_roll_to_current_round(roll(1, 5)),
            Err(DuelError::AlreadyRolled { user_id: user(1) })
        );
        assert_eq!(duel.current_round().unwrap().rolls().len(), 1);
    }

    #[test]
    fn test_evaluation_finished_only_when_all_rolled() {
        let mut duel = started_duel();
        assert!(!duel.evaluate_current_round().unwrap().is_finished());

        duel.add_roll_to_current_round(roll(2, 2)).unwrap();
        assert!(!duel.evaluate_current_round().unwrap().is_finished());

        duel.add_roll_to_current_round(roll(1, 2)).unwrap();
        let outcome = duel.evaluate_current_round().unwrap();
        assert!(outcome.is_finished());
        assert!(!outcome.winners().is_empty());
    }

    #[test]
    fn test_tie_then_winner_completes() {
        let mut duel = started_duel();
        duel.add_roll_to_current_round(roll(1, 4)).unwrap();
        duel.add_roll_to_current_round(roll(2, 4)).unwrap();

        let RoundOutcome::Tie(tied) = duel.evaluate_current_round().unwrap() else {
            panic!("expected a tie");
        };
        assert_eq!(tied, vec![user(1), user(2)]);

        duel.start_round(tied).unwrap();
        duel.renew_roll_deadline();
        assert_eq!(duel.current_round().unwrap().round_number(), 2);

        duel.add_roll_to_current_round(roll(1, 6)).unwrap();
        duel.add_roll_to_current_round(roll(2, 2)).unwrap();
        assert_eq!(
            duel.evaluate_current_round().unwrap(),
            RoundOutcome::Winner(user(1))
        );

        duel.complete(user(1)).unwrap();
        assert_eq!(duel.status(), DuelStatus::Completed);
        assert_eq!(duel.winner_id(), Some(user(1)));
        assert!(duel.completed_at().is_some());
    }

    #[test]
    fn test_tie_break_round_excludes_losers() {
        let mut duel = Duel::create(params(3), user(1), "");
        duel.add_participant(Participant::joiner(user(2), "")).unwrap();
        duel.add_participant(Participant::joiner(user(3), "")).unwrap();
        duel.start().unwrap();
        duel.add_roll_to_current_round(roll(1, 5)).unwrap();
        duel.add_roll_to_current_round(roll(2, 1)).unwrap();
        duel.add_roll_to_current_round(roll(3, 5)).unwrap();

        let tied = duel.evaluate_current_round().unwrap().winners();
        duel.start_round(tied).unwrap();

        assert_eq!(
            duel.add_roll_to_current_round(roll(2, 6)),
            Err(DuelError::ParticipantNotFound { user_id: user(2) })
        );
    }

    #[test]
    fn test_complete_requires_in_progress() {
        let mut duel = Duel::create(params(2), user(1), "");
        assert_eq!(
            duel.complete(user(1)),
            Err(DuelError::DuelNotInProgress {
                status: DuelStatus::WaitingForOpponent
            })
        );

        let mut duel = started_duel();
        duel.complete(user(2)).unwrap();
        assert_eq!(
            duel.complete(user(1)),
            Err(DuelError::DuelNotInProgress {
                status: DuelStatus::Completed
            })
        );
        assert_eq!(duel.winner_id(), Some(user(2)));
    }

    #[test]
    fn test_roll_after_completion_fails() {
        let mut duel = started_duel();
        duel.complete(user(1)).unwrap();
        assert_eq!(
            duel.add_roll_to_current_round(roll(1, 3)),
            Err(DuelError::DuelNotInProgress {
                status: DuelStatus::Completed
            })
        );
    }

    #[test]
    fn test_cancel_only_while_waiting() {
        let mut duel = Duel::create(params(2), user(1), "");
        duel.cancel().unwrap();
        assert_eq!(duel.status(), DuelStatus::Cancelled);
        assert!(duel.completed_at().is_some());
        assert!(duel.cancel().is_err());

        let mut duel = started_duel();
        assert!(matches!(
            duel.cancel(),
            Err(DuelError::InvalidStateTransition { action: "cancel", .. })
        ));
        assert_eq!(duel.status(), DuelStatus::InProgress);
    }

    #[test]
    fn test_restore_preserves_state() {
        let original = started_duel();
        let restored = Duel::restore(DuelSnapshot {
            id: original.id().clone(),
            display_number: 42,
            params: *original.params(),
            status: original.status(),
            winner_id: None,
            next_roll_deadline: original.next_roll_deadline(),
            created_at: original.created_at(),
            updated_at: original.updated_at(),
            completed_at: None,
            participants: original.participants().to_vec(),
            stakes: Vec::new(),
            rounds: original.rounds().to_vec(),
        });

        assert_eq!(restored.display_number(), 42);
        assert_eq!(restored.current_round(), original.current_round());
        assert_eq!(restored.status(), DuelStatus::InProgress);
    }

    #[test]
    fn test_revalue_stake() {
        let mut duel = Duel::create(params(2), user(1), "");
        duel.place_stake(stake(1, "a", "5.00")).unwrap();

        assert!(duel.revalue_stake(&ItemId::new("a").unwrap(), "6.25".parse().unwrap()));
        assert_eq!(duel.stake_value_of(user(1)).to_string(), "6.25");
        assert!(!duel.revalue_stake(&ItemId::new("zzz").unwrap(), Amount::zero()));
    }
}
