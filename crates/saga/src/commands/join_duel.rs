use std::time::Instant;

use common::{DuelId, UserId};
use domain::{Duel, DuelError, DuelEvent, DuelStatus, ItemId, Participant, validate_entry};
use duel_store::{DuelStore, DuelTx};
use scheduler::AutoRollScheduler;

use crate::compensation::CompensationLedger;
use crate::coordinator::{DuelCoordinator, abort, check_items};
use crate::error::Result;
use crate::services::{CustodyService, DiceService, EventPublisher};

/// Seats a player in a waiting duel with their stake.
#[derive(Debug, Clone)]
pub struct JoinDuel {
    pub duel_id: DuelId,
    pub user_id: UserId,
    pub photo_url: String,
    pub item_ids: Vec<ItemId>,
}

impl JoinDuel {
    pub fn new(duel_id: DuelId, user_id: UserId, item_ids: Vec<ItemId>) -> Self {
        Self {
            duel_id,
            user_id,
            photo_url: String::new(),
            item_ids,
        }
    }

    pub fn with_photo_url(mut self, photo_url: impl Into<String>) -> Self {
        self.photo_url = photo_url.into();
        self
    }
}

impl<S, C, D, Sc, P> DuelCoordinator<S, C, D, Sc, P>
where
    S: DuelStore,
    C: CustodyService,
    D: DiceService,
    Sc: AutoRollScheduler,
    P: EventPublisher,
{
    /// Joins a duel, reserving the joiner's items and checking them against
    /// the creator's stake.
    ///
    /// The seat that fills the duel starts round 1 and schedules its
    /// auto-roll. If scheduling fails the whole join is undone.
    #[tracing::instrument(skip(self, cmd), fields(duel_id = %cmd.duel_id, user_id = %cmd.user_id))]
    pub async fn join_duel(&self, cmd: JoinDuel) -> Result<Duel> {
        let start = Instant::now();

        let mut tx = self.store.begin().await?;
        let mut ledger = CompensationLedger::new(cmd.duel_id.clone());

        let joined = self.stage_join(&mut tx, &cmd, &mut ledger).await;
        let duel = match joined {
            Ok(duel) => duel,
            Err(e) => {
                ledger.compensate(&self.publisher).await;
                abort(tx).await;
                metrics::counter!("duel_join_failed_total").increment(1);
                tracing::warn!(error = %e, "join aborted");
                return Err(e);
            }
        };

        if let Err(e) = tx.commit().await {
            ledger.compensate(&self.publisher).await;
            metrics::counter!("duel_join_failed_total").increment(1);
            return Err(e.into());
        }

        metrics::counter!("duel_join_total").increment(1);
        metrics::histogram!("duel_command_duration_seconds", "command" => "join")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            participants = duel.participants().len(),
            status = %duel.status(),
            "player joined"
        );

        self.publish(DuelEvent::duel_joined(&duel, cmd.user_id)).await;
        Ok(duel)
    }

    async fn stage_join(
        &self,
        tx: &mut S::Tx,
        cmd: &JoinDuel,
        ledger: &mut CompensationLedger,
    ) -> Result<Duel> {
        let mut duel = self.load_duel(tx, &cmd.duel_id).await?;
        check_items(&cmd.item_ids, duel.params().max_gifts)?;

        // The entry band is computed from current custody values, not the
        // values recorded when the stakes were placed.
        let staked: Vec<ItemId> = duel.stakes().iter().map(|s| s.item.id.clone()).collect();
        for item_id in &staked {
            let details = self.custody.get_item_value(item_id).await?;
            duel.revalue_stake(item_id, details.value);
        }

        duel.add_participant(Participant::joiner(cmd.user_id, cmd.photo_url.clone()))?;
        self.reserve_stakes(&mut duel, cmd.user_id, &cmd.item_ids, ledger)
            .await?;
        validate_entry(&duel, cmd.user_id)?;

        let seated = duel
            .participant(cmd.user_id)
            .cloned()
            .ok_or(DuelError::ParticipantNotFound { user_id: cmd.user_id })?;
        tx.create_participant(duel.id(), &seated).await?;
        for stake in duel.stakes_of(cmd.user_id) {
            tx.create_stake(duel.id(), stake).await?;
        }

        if duel.is_full() {
            self.start_duel(tx, &mut duel).await?;
        }
        Ok(duel)
    }

    /// Starts a full duel and arms the round 1 auto-roll.
    async fn start_duel(&self, tx: &mut S::Tx, duel: &mut Duel) -> Result<()> {
        duel.start()?;

        let round = duel.current_round().ok_or(DuelError::NoRoundStarted)?;
        tx.create_round(duel.id(), round).await?;
        tx.update_duel_status(duel.id(), DuelStatus::InProgress, None, None)
            .await?;

        let deadline = duel
            .next_roll_deadline()
            .ok_or(DuelError::NoRoundStarted)?;
        tx.update_next_roll_deadline(duel.id(), deadline).await?;
        self.scheduler.schedule_auto_roll(duel.id(), deadline).await?;

        metrics::counter!("duel_started_total").increment(1);
        tracing::info!(duel_id = %duel.id(), %deadline, "duel started");
        Ok(())
    }
}
