use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{DuelId, PageRequest, UserId};
use domain::{Duel, DuelStatus, Participant, Roll, Round, Stake};

use crate::Result;

/// Entry point for duel persistence.
///
/// Every read and write happens inside a [`DuelTx`]. Implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait DuelStore: Send + Sync {
    type Tx: DuelTx;

    /// Opens a new transaction.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work over duel storage.
///
/// Changes become visible to other transactions only after [`commit`].
/// Dropping a transaction without committing rolls it back.
///
/// [`commit`]: DuelTx::commit
#[async_trait]
pub trait DuelTx: Send {
    /// Inserts the duel row and returns the assigned display number.
    ///
    /// Participants, stakes and rounds are written separately.
    async fn create_duel(&mut self, duel: &Duel) -> Result<i64>;

    /// Loads a duel with all its children.
    ///
    /// Locks the duel for the rest of the transaction, so concurrent commands
    /// on the same duel run one after another.
    async fn get_duel_by_id(&mut self, id: &DuelId) -> Result<Option<Duel>>;

    /// Loads a duel with all its children without locking it.
    async fn find_duel_by_id(&mut self, id: &DuelId) -> Result<Option<Duel>>;

    /// Loads one page of duels, newest first, plus the total count.
    async fn get_duel_list(&mut self, page: PageRequest) -> Result<(Vec<Duel>, u64)>;

    async fn create_participant(&mut self, duel_id: &DuelId, participant: &Participant)
    -> Result<()>;

    async fn create_stake(&mut self, duel_id: &DuelId, stake: &Stake) -> Result<()>;

    /// Inserts a round header; its rolls are written with [`create_roll`].
    ///
    /// [`create_roll`]: DuelTx::create_roll
    async fn create_round(&mut self, duel_id: &DuelId, round: &Round) -> Result<()>;

    async fn create_roll(&mut self, duel_id: &DuelId, round_number: u32, roll: &Roll)
    -> Result<()>;

    async fn update_duel_status(
        &mut self,
        duel_id: &DuelId,
        status: DuelStatus,
        winner_id: Option<UserId>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn update_next_roll_deadline(
        &mut self,
        duel_id: &DuelId,
        deadline: DateTime<Utc>,
    ) -> Result<()>;

    /// Makes every change of this transaction durable.
    async fn commit(self) -> Result<()>;

    /// Discards every change of this transaction.
    async fn rollback(self) -> Result<()>;
}
