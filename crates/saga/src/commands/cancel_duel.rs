use common::{DuelId, UserId};
use domain::{Duel, DuelEvent, DuelStatus};
use duel_store::{DuelStore, DuelTx};
use scheduler::AutoRollScheduler;

use crate::coordinator::{DuelCoordinator, abort};
use crate::error::{CommandError, Result};
use crate::services::{CustodyService, DiceService, EventPublisher};

/// The creator withdraws a duel nobody has filled yet.
#[derive(Debug, Clone)]
pub struct CancelDuel {
    pub duel_id: DuelId,
    pub user_id: UserId,
}

impl CancelDuel {
    pub fn new(duel_id: DuelId, user_id: UserId) -> Self {
        Self { duel_id, user_id }
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
    /// Cancels a waiting duel and hands every staked item back.
    #[tracing::instrument(skip(self, cmd), fields(duel_id = %cmd.duel_id, user_id = %cmd.user_id))]
    pub async fn cancel_duel(&self, cmd: CancelDuel) -> Result<Duel> {
        let mut tx = self.store.begin().await?;

        let duel = match self.stage_cancel(&mut tx, &cmd).await {
            Ok(duel) => duel,
            Err(e) => {
                abort(tx).await;
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!("duel_cancelled_total").increment(1);
        tracing::info!(stakes = duel.stakes().len(), "duel cancelled");

        for stake in duel.stakes() {
            if let Err(e) = self.custody.release_item(&stake.item.id).await {
                metrics::counter!("duel_release_failures_total").increment(1);
                tracing::error!(item_id = %stake.item.id, error = %e, "failed to release item");
            }
        }
        self.publish(DuelEvent::duel_cancelled(&duel)).await;
        Ok(duel)
    }

    async fn stage_cancel(&self, tx: &mut S::Tx, cmd: &CancelDuel) -> Result<Duel> {
        let mut duel = self.load_duel(tx, &cmd.duel_id).await?;

        if duel.creator().map(|p| p.user_id) != Some(cmd.user_id) {
            return Err(CommandError::NotCreator {
                user_id: cmd.user_id,
            });
        }

        duel.cancel()?;
        tx.update_duel_status(duel.id(), DuelStatus::Cancelled, None, duel.completed_at())
            .await?;
        Ok(duel)
    }
}
