//! Item custody service trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::{Amount, DuelId, UserId};
use domain::ItemId;

use crate::error::CommandError;

/// Authoritative description of an item held in custody.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDetails {
    pub value: Amount,
    pub title: String,
    pub slug: String,
}

/// System of record for item ownership, reservation and valuation.
#[async_trait]
pub trait CustodyService: Send + Sync {
    /// Locks an item owned by `user_id` for a duel and returns its current
    /// details.
    async fn reserve_item(
        &self,
        item_id: &ItemId,
        user_id: UserId,
        duel_id: &DuelId,
    ) -> Result<ItemDetails, CommandError>;

    /// Returns a reserved item to its owner.
    async fn release_item(&self, item_id: &ItemId) -> Result<(), CommandError>;

    /// Looks up the current details of an item.
    async fn get_item_value(&self, item_id: &ItemId) -> Result<ItemDetails, CommandError>;
}

#[derive(Debug)]
struct CustodyItem {
    owner: UserId,
    details: ItemDetails,
    reserved_for: Option<DuelId>,
}

#[derive(Debug, Default)]
struct InMemoryCustodyState {
    items: HashMap<ItemId, CustodyItem>,
    fail_on_reserve: HashSet<ItemId>,
    fail_on_lookup: bool,
}

/// In-memory custody service for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCustodyService {
    state: Arc<RwLock<InMemoryCustodyState>>,
}

impl InMemoryCustodyService {
    /// Creates an empty custody service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposits an item owned by `owner`.
    pub fn deposit(
        &self,
        item_id: ItemId,
        owner: UserId,
        title: impl Into<String>,
        slug: impl Into<String>,
        value: Amount,
    ) {
        self.write().items.insert(
            item_id,
            CustodyItem {
                owner,
                details: ItemDetails {
                    value,
                    title: title.into(),
                    slug: slug.into(),
                },
                reserved_for: None,
            },
        );
    }

    /// Changes the current value of a deposited item.
    pub fn set_item_value(&self, item_id: &ItemId, value: Amount) {
        if let Some(item) = self.write().items.get_mut(item_id) {
            item.details.value = value;
        }
    }

    /// Configures reservations of `item_id` to fail.
    pub fn set_fail_on_reserve_item(&self, item_id: ItemId) {
        self.write().fail_on_reserve.insert(item_id);
    }

    /// Configures value lookups to fail.
    pub fn set_fail_on_lookup(&self, fail: bool) {
        self.write().fail_on_lookup = fail;
    }

    /// Returns the duel an item is reserved for.
    pub fn reserved_for(&self, item_id: &ItemId) -> Option<DuelId> {
        self.read()
            .items
            .get(item_id)
            .and_then(|item| item.reserved_for.clone())
    }

    /// Returns the number of reserved items.
    pub fn reservation_count(&self) -> usize {
        self.read()
            .items
            .values()
            .filter(|item| item.reserved_for.is_some())
            .count()
    }

    fn read(&self) -> RwLockReadGuard<'_, InMemoryCustodyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InMemoryCustodyState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CustodyService for InMemoryCustodyService {
    async fn reserve_item(
        &self,
        item_id: &ItemId,
        user_id: UserId,
        duel_id: &DuelId,
    ) -> Result<ItemDetails, CommandError> {
        let mut state = self.write();

        if state.fail_on_reserve.contains(item_id) {
            return Err(CommandError::Custody(format!(
                "reservation of {item_id} rejected"
            )));
        }

        let item = state
            .items
            .get_mut(item_id)
            .ok_or_else(|| CommandError::Custody(format!("item {item_id} not found")))?;

        if item.owner != user_id {
            return Err(CommandError::Custody(format!(
                "item {item_id} is not owned by user {user_id}"
            )));
        }
        if item.reserved_for.is_some() {
            return Err(CommandError::Custody(format!(
                "item {item_id} is already reserved"
            )));
        }

        item.reserved_for = Some(duel_id.clone());
        Ok(item.details.clone())
    }

    async fn release_item(&self, item_id: &ItemId) -> Result<(), CommandError> {
        if let Some(item) = self.write().items.get_mut(item_id) {
            item.reserved_for = None;
        }
        Ok(())
    }

    async fn get_item_value(&self, item_id: &ItemId) -> Result<ItemDetails, CommandError> {
        let state = self.read();

        if state.fail_on_lookup {
            return Err(CommandError::Custody("valuation unavailable".to_string()));
        }

        state
            .items
            .get(item_id)
            .map(|item| item.details.clone())
            .ok_or_else(|| CommandError::Custody(format!("item {item_id} not found")))
    }
}
