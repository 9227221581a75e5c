//! Read-side access to duels.

use common::{DuelId, PageRequest};
use domain::Duel;
use duel_store::{DuelStore, DuelTx};

use crate::error::Result;

/// One page of duels.
#[derive(Debug, Clone)]
pub struct DuelPage {
    pub duels: Vec<Duel>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

/// Read-only duel lookups.
#[derive(Debug, Clone)]
pub struct DuelQueries<S: DuelStore> {
    store: S,
}

impl<S: DuelStore> DuelQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, duel_id), fields(duel_id = %duel_id))]
    pub async fn get_duel(&self, duel_id: &DuelId) -> Result<Option<Duel>> {
        let mut tx = self.store.begin().await?;
        let duel = tx.find_duel_by_id(duel_id).await?;
        tx.rollback().await?;
        Ok(duel)
    }

    /// Lists duels newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_duels(&self, page: PageRequest) -> Result<DuelPage> {
        let mut tx = self.store.begin().await?;
        let (duels, total) = tx.get_duel_list(page).await?;
        tx.rollback().await?;

        Ok(DuelPage {
            duels,
            total,
            page: page.page(),
            page_size: page.page_size(),
            total_pages: page.total_pages(total),
        })
    }
}
