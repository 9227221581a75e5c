use std::time::Instant;

use common::{DuelId, UserId};
use domain::{Duel, DuelError, Roll};
use duel_store::{DuelStore, DuelTx};
use scheduler::AutoRollScheduler;

use crate::coordinator::{DuelCoordinator, RoundProgress, abort};
use crate::error::Result;
use crate::services::{CustodyService, DiceService, EventPublisher};

/// A participant rolls in the current round.
#[derive(Debug, Clone)]
pub struct RollDice {
    pub duel_id: DuelId,
    pub user_id: UserId,
}

impl RollDice {
    pub fn new(duel_id: DuelId, user_id: UserId) -> Self {
        Self { duel_id, user_id }
    }
}

/// The recorded roll and what it did to the duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollResult {
    pub roll: Roll,
    pub progress: RoundProgress,
}

impl<S, C, D, Sc, P> DuelCoordinator<S, C, D, Sc, P>
where
    S: DuelStore,
    C: CustodyService,
    D: DiceService,
    Sc: AutoRollScheduler,
    P: EventPublisher,
{
    /// Records a manual roll.
    ///
    /// A tie re-arms the auto-roll for the next round inside the
    /// transaction. A winning roll cancels the pending auto-roll only after
    /// commit; a failed cancel leaves a task that finds the duel completed
    /// and does nothing.
    #[tracing::instrument(skip(self, cmd), fields(duel_id = %cmd.duel_id, user_id = %cmd.user_id))]
    pub async fn roll_dice(&self, cmd: RollDice) -> Result<RollResult> {
        let start = Instant::now();
        let mut tx = self.store.begin().await?;

        let (result, completed) = match self.stage_roll(&mut tx, &cmd).await {
            Ok(staged) => staged,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!("duel_roll_total", "mode" => "manual").increment(1);
        metrics::histogram!("duel_command_duration_seconds", "command" => "roll")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(dice_value = %result.roll.dice_value, "dice rolled");

        if let Some(duel) = completed {
            self.cancel_pending_auto_roll(&cmd.duel_id).await;
            self.publish_completed(&duel).await;
        }
        Ok(result)
    }

    async fn stage_roll(
        &self,
        tx: &mut S::Tx,
        cmd: &RollDice,
    ) -> Result<(RollResult, Option<Duel>)> {
        let mut duel = self.load_duel(tx, &cmd.duel_id).await?;

        if !duel.status().can_roll() {
            return Err(DuelError::DuelNotInProgress {
                status: duel.status(),
            }
            .into());
        }

        // Check eligibility before asking for a die so a rejected request
        // does not consume one.
        let round = duel.current_round().ok_or(DuelError::NoRoundStarted)?;
        if !round.includes(cmd.user_id) {
            return Err(DuelError::ParticipantNotFound {
                user_id: cmd.user_id,
            }
            .into());
        }
        if round.has_rolled(cmd.user_id) {
            return Err(DuelError::AlreadyRolled {
                user_id: cmd.user_id,
            }
            .into());
        }
        let round_number = round.round_number();

        let dice_value = self.dice.roll_dice(cmd.user_id, duel.id()).await?;
        let roll = Roll::manual(cmd.user_id, dice_value);
        duel.add_roll_to_current_round(roll.clone())?;
        tx.create_roll(duel.id(), round_number, &roll).await?;

        let outcome = duel.evaluate_current_round()?;
        if !outcome.is_finished() {
            let progress = RoundProgress::Pending {
                deadline: duel.next_roll_deadline(),
            };
            return Ok((RollResult { roll, progress }, None));
        }

        let progress = self.settle_round(tx, &mut duel, outcome).await?;

        let completed = matches!(progress, RoundProgress::Completed { .. }).then_some(duel);
        Ok((RollResult { roll, progress }, completed))
    }

    async fn cancel_pending_auto_roll(&self, duel_id: &DuelId) {
        if let Err(e) = self.scheduler.cancel_auto_roll(duel_id).await {
            metrics::counter!("duel_auto_roll_cancel_failures_total").increment(1);
            tracing::warn!(error = %e, "failed to cancel auto-roll for completed duel");
        }
    }
}
