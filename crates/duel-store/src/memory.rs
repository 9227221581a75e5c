use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DuelId, PageRequest, UserId};
use domain::{Duel, DuelParams, DuelSnapshot, DuelStatus, Participant, Roll, Round, Stake};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result, StoreError,
    store::{DuelStore, DuelTx},
};

/// Row-shaped copy of a duel, mirroring the SQL tables.
#[derive(Debug, Clone)]
struct DuelRecord {
    id: DuelId,
    display_number: i64,
    params: DuelParams,
    status: DuelStatus,
    winner_id: Option<UserId>,
    next_roll_deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    participants: Vec<Participant>,
    stakes: Vec<Stake>,
    rounds: Vec<RoundRecord>,
}

#[derive(Debug, Clone)]
struct RoundRecord {
    round_number: u32,
    participants: Vec<UserId>,
    rolls: Vec<Roll>,
}

impl DuelRecord {
    fn to_duel(&self) -> Result<Duel> {
        let rounds = self
            .rounds
            .iter()
            .map(|r| Round::restore(r.round_number, r.participants.clone(), r.rolls.clone()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Duel::restore(DuelSnapshot {
            id: self.id.clone(),
            display_number: self.display_number,
            params: self.params,
            status: self.status,
            winner_id: self.winner_id,
            next_roll_deadline: self.next_roll_deadline,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            participants: self.participants.clone(),
            stakes: self.stakes.clone(),
            rounds,
        }))
    }
}

#[derive(Debug, Clone, Default)]
struct Tables {
    duels: HashMap<DuelId, DuelRecord>,
    last_display_number: i64,
}

impl Tables {
    fn duel_mut(&mut self, id: &DuelId) -> Result<&mut DuelRecord> {
        self.duels
            .get_mut(id)
            .ok_or_else(|| StoreError::DuelNotFound(id.clone()))
    }
}

/// In-memory duel store for tests and database-less runs.
///
/// A transaction holds the store lock from `begin` until it is committed or
/// dropped, and works on a private copy of the tables that replaces the
/// shared copy on commit.
#[derive(Clone, Default)]
pub struct InMemoryDuelStore {
    tables: Arc<Mutex<Tables>>,
    fail_on_commit: Arc<AtomicBool>,
}

impl InMemoryDuelStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following commit fail.
    pub fn set_fail_on_commit(&self, fail: bool) {
        self.fail_on_commit.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of committed duels.
    pub async fn duel_count(&self) -> usize {
        self.tables.lock().await.duels.len()
    }

    /// Returns the committed state of a duel.
    ///
    /// Waits for any open transaction to finish.
    pub async fn find(&self, id: &DuelId) -> Result<Option<Duel>> {
        let tables = self.tables.lock().await;
        tables.duels.get(id).map(DuelRecord::to_duel).transpose()
    }
}

#[async_trait]
impl DuelStore for InMemoryDuelStore {
    type Tx = InMemoryDuelTx;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(InMemoryDuelTx {
            guard,
            staged,
            fail_on_commit: self.fail_on_commit.load(Ordering::SeqCst),
        })
    }
}

/// Transaction over [`InMemoryDuelStore`].
pub struct InMemoryDuelTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    fail_on_commit: bool,
}

#[async_trait]
impl DuelTx for InMemoryDuelTx {
    async fn create_duel(&mut self, duel: &Duel) -> Result<i64> {
        if self.staged.duels.contains_key(duel.id()) {
            return Err(StoreError::Conflict(format!("duel {} already exists", duel.id())));
        }

        self.staged.last_display_number += 1;
        let display_number = self.staged.last_display_number;

        self.staged.duels.insert(
            duel.id().clone(),
            DuelRecord {
                id: duel.id().clone(),
                display_number,
                params: *duel.params(),
                status: duel.status(),
                winner_id: duel.winner_id(),
                next_roll_deadline: duel.next_roll_deadline(),
                created_at: duel.created_at(),
                updated_at: duel.updated_at(),
                completed_at: duel.completed_at(),
                participants: Vec::new(),
                stakes: Vec::new(),
                rounds: Vec::new(),
            },
        );

        Ok(display_number)
    }

    async fn get_duel_by_id(&mut self, id: &DuelId) -> Result<Option<Duel>> {
        self.staged.duels.get(id).map(DuelRecord::to_duel).transpose()
    }

    // The store lock taken by `begin` already serializes transactions.
    async fn find_duel_by_id(&mut self, id: &DuelId) -> Result<Option<Duel>> {
        self.get_duel_by_id(id).await
    }

    async fn get_duel_list(&mut self, page: PageRequest) -> Result<(Vec<Duel>, u64)> {
        let mut records: Vec<&DuelRecord> = self.staged.duels.values().collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.display_number.cmp(&a.display_number))
        });

        let total = records.len() as u64;
        let duels = records
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(page.page_size() as usize)
            .map(DuelRecord::to_duel)
            .collect::<Result<Vec<_>>>()?;

        Ok((duels, total))
    }

    async fn create_participant(
        &mut self,
        duel_id: &DuelId,
        participant: &Participant,
    ) -> Result<()> {
        let record = self.staged.duel_mut(duel_id)?;
        if record
            .participants
            .iter()
            .any(|p| p.user_id == participant.user_id)
        {
            return Err(StoreError::Conflict(format!(
                "participant {} already in duel {duel_id}",
                participant.user_id
            )));
        }
        record.participants.push(participant.clone());
        Ok(())
    }

    async fn create_stake(&mut self, duel_id: &DuelId, stake: &Stake) -> Result<()> {
        let record = self.staged.duel_mut(duel_id)?;
        if record.stakes.iter().any(|s| s.item.id == stake.item.id) {
            return Err(StoreError::Conflict(format!(
                "item {} already staked in duel {duel_id}",
                stake.item.id
            )));
        }
        record.stakes.push(stake.clone());
        Ok(())
    }

    async fn create_round(&mut self, duel_id: &DuelId, round: &Round) -> Result<()> {
        let record = self.staged.duel_mut(duel_id)?;
        if record
            .rounds
            .iter()
            .any(|r| r.round_number == round.round_number())
        {
            return Err(StoreError::Conflict(format!(
                "round {} already exists in duel {duel_id}",
                round.round_number()
            )));
        }
        record.rounds.push(RoundRecord {
            round_number: round.round_number(),
            participants: round.participants().to_vec(),
            rolls: Vec::new(),
        });
        Ok(())
    }

    async fn create_roll(&mut self, duel_id: &DuelId, round_number: u32, roll: &Roll) -> Result<()> {
        let record = self.staged.duel_mut(duel_id)?;
        let round = record
            .rounds
            .iter_mut()
            .find(|r| r.round_number == round_number)
            .ok_or_else(|| {
                StoreError::Conflict(format!("round {round_number} not found in duel {duel_id}"))
            })?;

        if round.rolls.iter().any(|r| r.user_id == roll.user_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already rolled in round {round_number}",
                roll.user_id
            )));
        }
        round.rolls.push(roll.clone());
        Ok(())
    }

    async fn update_duel_status(
        &mut self,
        duel_id: &DuelId,
        status: DuelStatus,
        winner_id: Option<UserId>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let record = self.staged.duel_mut(duel_id)?;
        record.status = status;
        record.winner_id = winner_id;
        record.completed_at = completed_at;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn update_next_roll_deadline(
        &mut self,
        duel_id: &DuelId,
        deadline: DateTime<Utc>,
    ) -> Result<()> {
        let record = self.staged.duel_mut(duel_id)?;
        record.next_roll_deadline = Some(deadline);
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        if self.fail_on_commit {
            return Err(StoreError::Database(sqlx::Error::Protocol(
                "commit rejected".to_string(),
            )));
        }

        let InMemoryDuelTx {
            mut guard, staged, ..
        } = self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}
