//! Duel coordinator shared by every command.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{DuelId, UserId};
use domain::{Duel, DuelEvent, DuelStatus, ItemId, MaxGifts, RoundOutcome, Stake, StakedItem};
use duel_store::{DuelStore, DuelTx};
use scheduler::AutoRollScheduler;

use crate::compensation::CompensationLedger;
use crate::error::{CommandError, Result};
use crate::services::{CustodyService, DiceService, EventPublisher};

/// Where a duel stands after a roll was recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundProgress {
    /// Nothing to do: the duel moved on or its deadline has not passed.
    Skipped,
    /// The current round still waits for rolls.
    Pending { deadline: Option<DateTime<Utc>> },
    /// The round tied and a new one was opened over the tied players.
    NextRound {
        round_number: u32,
        participants: Vec<UserId>,
        deadline: DateTime<Utc>,
    },
    /// The duel has a winner.
    Completed { winner_id: UserId },
}

/// Drives the duel aggregate through storage, custody, dice, the auto-roll
/// scheduler and the event publisher.
///
/// Every command runs in one storage transaction. Custody reservations made
/// along the way are tracked in a [`CompensationLedger`] and released if the
/// command aborts. Events are published after commit and never undo it.
#[derive(Debug, Clone)]
pub struct DuelCoordinator<S, C, D, Sc, P>
where
    S: DuelStore,
    C: CustodyService,
    D: DiceService,
    Sc: AutoRollScheduler,
    P: EventPublisher,
{
    pub(crate) store: S,
    pub(crate) custody: C,
    pub(crate) dice: D,
    pub(crate) scheduler: Sc,
    pub(crate) publisher: P,
}

impl<S, C, D, Sc, P> DuelCoordinator<S, C, D, Sc, P>
where
    S: DuelStore,
    C: CustodyService,
    D: DiceService,
    Sc: AutoRollScheduler,
    P: EventPublisher,
{
    pub fn new(store: S, custody: C, dice: D, scheduler: Sc, publisher: P) -> Self {
        Self {
            store,
            custody,
            dice,
            scheduler,
            publisher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads a duel inside `tx`, failing if it does not exist.
    pub(crate) async fn load_duel(&self, tx: &mut S::Tx, duel_id: &DuelId) -> Result<Duel> {
        tx.get_duel_by_id(duel_id)
            .await?
            .ok_or_else(|| CommandError::DuelNotFound(duel_id.clone()))
    }

    /// Reserves each item for `user_id` and stakes it at the custody value.
    ///
    /// Every successful reservation is recorded before the stake is placed,
    /// so a failure at any point leaves the ledger complete.
    pub(crate) async fn reserve_stakes(
        &self,
        duel: &mut Duel,
        user_id: UserId,
        item_ids: &[ItemId],
        ledger: &mut CompensationLedger,
    ) -> Result<()> {
        for item_id in item_ids {
            let details = self
                .custody
                .reserve_item(item_id, user_id, duel.id())
                .await?;
            ledger.record(item_id.clone());
            tracing::debug!(%item_id, value = %details.value, "item reserved");

            let item = StakedItem::new(item_id.clone(), details.title, details.slug, details.value)?;
            duel.place_stake(Stake::new(user_id, item))?;
        }
        Ok(())
    }

    /// Applies a finished round outcome and persists it.
    ///
    /// A tie opens the next round and re-arms the auto-roll before the
    /// caller commits, so an in-progress duel always has a pending
    /// safeguard. A winner completes the duel.
    pub(crate) async fn settle_round(
        &self,
        tx: &mut S::Tx,
        duel: &mut Duel,
        outcome: RoundOutcome,
    ) -> Result<RoundProgress> {
        match outcome {
            RoundOutcome::Pending => {
                let deadline = duel.renew_roll_deadline();
                tx.update_next_roll_deadline(duel.id(), deadline).await?;
                self.scheduler.schedule_auto_roll(duel.id(), deadline).await?;
                Ok(RoundProgress::Pending {
                    deadline: Some(deadline),
                })
            }
            RoundOutcome::Tie(players) => {
                let round = duel.start_round(players)?.clone();
                let round_number = round.round_number();
                let participants = round.participants().to_vec();
                tx.create_round(duel.id(), &round).await?;

                let deadline = duel.renew_roll_deadline();
                tx.update_next_roll_deadline(duel.id(), deadline).await?;
                self.scheduler.schedule_auto_roll(duel.id(), deadline).await?;

                metrics::counter!("duel_tie_rounds_total").increment(1);
                tracing::info!(duel_id = %duel.id(), round_number, "round tied, next round opened");
                Ok(RoundProgress::NextRound {
                    round_number,
                    participants,
                    deadline,
                })
            }
            RoundOutcome::Winner(winner_id) => {
                duel.complete(winner_id)?;
                tx.update_duel_status(
                    duel.id(),
                    DuelStatus::Completed,
                    Some(winner_id),
                    duel.completed_at(),
                )
                .await?;
                Ok(RoundProgress::Completed { winner_id })
            }
        }
    }

    /// Publishes an event after commit. Failures are logged only.
    pub(crate) async fn publish(&self, event: DuelEvent) {
        if let Err(e) = self.publisher.publish(&event).await {
            metrics::counter!("duel_publish_failures_total").increment(1);
            tracing::error!(
                topic = event.topic(),
                key = event.key(),
                error = %e,
                "failed to publish duel event"
            );
        }
    }

    /// Publishes the completion event for a finished duel.
    pub(crate) async fn publish_completed(&self, duel: &Duel) {
        metrics::counter!("duel_completed_total").increment(1);
        if let Some(event) = DuelEvent::duel_completed(duel) {
            self.publish(event).await;
        }
    }
}

/// Aborts a transaction, logging rollback failures.
pub(crate) async fn abort<T: DuelTx>(tx: T) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}

/// Checks a batch of requested items against the per-player limit.
pub(crate) fn check_items(item_ids: &[ItemId], max_gifts: MaxGifts) -> Result<()> {
    if item_ids.is_empty() {
        return Err(CommandError::NoItems);
    }

    if item_ids.len() > usize::from(max_gifts.get()) {
        return Err(CommandError::TooManyItems {
            count: item_ids.len(),
            max_gifts: max_gifts.get(),
        });
    }

    let mut seen = HashSet::with_capacity(item_ids.len());
    for item_id in item_ids {
        if !seen.insert(item_id) {
            return Err(CommandError::DuplicateItem(item_id.clone()));
        }
    }
    Ok(())
}
