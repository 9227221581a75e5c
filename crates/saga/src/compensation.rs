//! Tracks side effects performed outside the storage transaction.

use common::DuelId;
use domain::{DuelEvent, ItemId};

use crate::services::EventPublisher;

/// Ordered list of items reserved with custody during one command.
///
/// If the command aborts, every recorded reservation is released by
/// publishing a release message, in reservation order. Release failures are
/// logged and never replace the error that caused the abort.
#[derive(Debug, Clone)]
pub struct CompensationLedger {
    duel_id: DuelId,
    reserved: Vec<ItemId>,
}

impl CompensationLedger {
    pub fn new(duel_id: DuelId) -> Self {
        Self {
            duel_id,
            reserved: Vec::new(),
        }
    }

    /// Records a successful reservation.
    pub fn record(&mut self, item_id: ItemId) {
        self.reserved.push(item_id);
    }

    pub fn reserved(&self) -> &[ItemId] {
        &self.reserved
    }

    pub fn is_empty(&self) -> bool {
        self.reserved.is_empty()
    }

    /// Asks for every recorded reservation to be released.
    ///
    /// Returns the number of release messages that were published.
    #[tracing::instrument(skip(self, publisher), fields(duel_id = %self.duel_id, items = self.reserved.len()))]
    pub async fn compensate<P: EventPublisher + ?Sized>(self, publisher: &P) -> usize {
        if self.reserved.is_empty() {
            return 0;
        }

        metrics::counter!("duel_compensations_total").increment(1);

        let mut released = 0;
        for item_id in self.reserved {
            let event = DuelEvent::reservation_released(item_id.clone(), Some(self.duel_id.clone()));
            match publisher.publish(&event).await {
                Ok(()) => released += 1,
                Err(e) => {
                    metrics::counter!("duel_compensation_failures_total").increment(1);
                    tracing::error!(%item_id, error = %e, "failed to publish reservation release");
                }
            }
        }

        tracing::warn!(released, "compensated reserved items");
        released
    }
}
