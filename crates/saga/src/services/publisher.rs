//! Event publisher trait and in-memory implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use domain::{DuelEvent, ItemId};

use crate::error::CommandError;

/// Fire-and-forget sink for duel events.
///
/// Delivery guarantees belong to the outbox behind the publisher; callers
/// only log failures.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DuelEvent) -> Result<(), CommandError>;
}

/// A message as it would appear on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
    pub event: DuelEvent,
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    messages: Vec<PublishedMessage>,
    fail_on_publish: bool,
}

/// Captures published messages in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures publishing to fail.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_publish = fail;
    }

    /// Returns all captured messages in publish order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .clone()
    }

    /// Returns the topics of all captured messages in publish order.
    pub fn topics(&self) -> Vec<String> {
        self.messages().into_iter().map(|m| m.topic).collect()
    }

    /// Returns the items named by release messages, in publish order.
    pub fn released_items(&self) -> Vec<ItemId> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m.event {
                DuelEvent::ReservationReleased(data) => Some(data.item_id),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: &DuelEvent) -> Result<(), CommandError> {
        let payload = event.to_payload()?;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_publish {
            return Err(CommandError::Publish("broker unavailable".to_string()));
        }

        state.messages.push(PublishedMessage {
            topic: event.topic().to_string(),
            key: event.key().to_string(),
            payload,
            event: event.clone(),
        });
        Ok(())
    }
}
