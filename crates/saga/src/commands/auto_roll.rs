use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use common::DuelId;
use domain::{Duel, DuelError, Roll};
use duel_store::{DuelStore, DuelTx};
use scheduler::{AutoRollHandler, AutoRollScheduler};

use crate::coordinator::{DuelCoordinator, RoundProgress, abort};
use crate::error::{CommandError, Result};
use crate::services::{CustodyService, DiceService, EventPublisher};

impl<S, C, D, Sc, P> DuelCoordinator<S, C, D, Sc, P>
where
    S: DuelStore,
    C: CustodyService,
    D: DiceService,
    Sc: AutoRollScheduler,
    P: EventPublisher,
{
    /// Rolls for every current-round player who missed the deadline, then
    /// settles the round.
    ///
    /// Safe to run more than once per deadline: players who already rolled
    /// are skipped, and a duel whose deadline lies in the future or that is
    /// no longer in progress is left alone.
    #[tracing::instrument(skip(self, duel_id), fields(duel_id = %duel_id))]
    pub async fn auto_roll(&self, duel_id: &DuelId) -> Result<RoundProgress> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;

        let (progress, completed) = match self.stage_auto_roll(&mut tx, duel_id).await {
            Ok(staged) => staged,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };

        if progress == RoundProgress::Skipped {
            abort(tx).await;
            metrics::counter!("duel_auto_roll_skipped_total").increment(1);
            return Ok(progress);
        }
        tx.commit().await?;

        metrics::counter!("duel_auto_roll_total").increment(1);
        metrics::histogram!("duel_command_duration_seconds", "command" => "auto_roll")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(?progress, "auto-roll applied");

        if let Some(duel) = completed {
            self.publish_completed(&duel).await;
        }
        Ok(progress)
    }

    async fn stage_auto_roll(
        &self,
        tx: &mut S::Tx,
        duel_id: &DuelId,
    ) -> Result<(RoundProgress, Option<Duel>)> {
        let Some(mut duel) = tx.get_duel_by_id(duel_id).await? else {
            tracing::warn!("auto-roll fired for unknown duel");
            return Ok((RoundProgress::Skipped, None));
        };

        if !duel.status().can_roll() {
            tracing::debug!(status = %duel.status(), "duel no longer in progress");
            return Ok((RoundProgress::Skipped, None));
        }
        if let Some(deadline) = duel.next_roll_deadline()
            && deadline > Utc::now()
        {
            tracing::debug!(%deadline, "stale auto-roll, deadline not reached");
            return Ok((RoundProgress::Skipped, None));
        }

        let round = duel.current_round().ok_or(DuelError::NoRoundStarted)?;
        let round_number = round.round_number();
        let pending = round.pending_participants();

        for user_id in pending {
            let dice_value = self.dice.roll_dice(user_id, duel.id()).await?;
            let roll = Roll::auto(user_id, dice_value);
            match duel.add_roll_to_current_round(roll.clone()) {
                Ok(()) => tx.create_roll(duel.id(), round_number, &roll).await?,
                Err(DuelError::AlreadyRolled { .. }) => {
                    tracing::debug!(%user_id, "already rolled, skipping");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let outcome = duel.evaluate_current_round()?;
        let progress = self.settle_round(tx, &mut duel, outcome).await?;

        let completed = matches!(progress, RoundProgress::Completed { .. }).then_some(duel);
        Ok((progress, completed))
    }
}

#[async_trait]
impl<S, C, D, Sc, P> AutoRollHandler for DuelCoordinator<S, C, D, Sc, P>
where
    S: DuelStore,
    C: CustodyService,
    D: DiceService,
    Sc: AutoRollScheduler,
    P: EventPublisher,
{
    type Error = CommandError;

    async fn handle(&self, duel_id: &DuelId) -> std::result::Result<(), CommandError> {
        self.auto_roll(duel_id).await.map(|_| ())
    }
}
