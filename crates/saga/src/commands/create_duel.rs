use std::time::Instant;

use common::UserId;
use domain::{Duel, DuelEvent, DuelParams, ItemId};
use duel_store::{DuelStore, DuelTx};
use scheduler::AutoRollScheduler;

use crate::compensation::CompensationLedger;
use crate::coordinator::{DuelCoordinator, abort, check_items};
use crate::error::Result;
use crate::services::{CustodyService, DiceService, EventPublisher};

/// Opens a duel staked with the creator's items.
#[derive(Debug, Clone)]
pub struct CreateDuel {
    pub creator_id: UserId,
    pub photo_url: String,
    pub params: DuelParams,
    pub item_ids: Vec<ItemId>,
}

impl CreateDuel {
    pub fn new(creator_id: UserId, params: DuelParams, item_ids: Vec<ItemId>) -> Self {
        Self {
            creator_id,
            photo_url: String::new(),
            params,
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
    /// Creates a duel and reserves every requested item for it.
    ///
    /// Either the duel and all its stakes are committed together, or nothing
    /// is and every item reserved so far is released.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.creator_id, items = cmd.item_ids.len()))]
    pub async fn create_duel(&self, cmd: CreateDuel) -> Result<Duel> {
        let start = Instant::now();
        check_items(&cmd.item_ids, cmd.params.max_gifts)?;

        let mut tx = self.store.begin().await?;
        let mut duel = Duel::create(cmd.params, cmd.creator_id, cmd.photo_url);
        let mut ledger = CompensationLedger::new(duel.id().clone());

        let staged = self
            .stage_new_duel(&mut tx, &mut duel, cmd.creator_id, &cmd.item_ids, &mut ledger)
            .await;
        if let Err(e) = staged {
            ledger.compensate(&self.publisher).await;
            abort(tx).await;
            metrics::counter!("duel_create_failed_total").increment(1);
            tracing::warn!(error = %e, "duel creation aborted");
            return Err(e);
        }

        if let Err(e) = tx.commit().await {
            ledger.compensate(&self.publisher).await;
            metrics::counter!("duel_create_failed_total").increment(1);
            return Err(e.into());
        }

        metrics::counter!("duel_created_total").increment(1);
        metrics::histogram!("duel_command_duration_seconds", "command" => "create")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(
            duel_id = %duel.id(),
            display_number = duel.display_number(),
            "duel created"
        );

        self.publish(DuelEvent::duel_created(&duel)).await;
        Ok(duel)
    }

    async fn stage_new_duel(
        &self,
        tx: &mut S::Tx,
        duel: &mut Duel,
        creator_id: UserId,
        item_ids: &[ItemId],
        ledger: &mut CompensationLedger,
    ) -> Result<()> {
        self.reserve_stakes(duel, creator_id, item_ids, ledger).await?;

        let display_number = tx.create_duel(duel).await?;
        duel.assign_display_number(display_number);

        for participant in duel.participants() {
            tx.create_participant(duel.id(), participant).await?;
        }
        for stake in duel.stakes() {
            tx.create_stake(duel.id(), stake).await?;
        }
        Ok(())
    }
}
