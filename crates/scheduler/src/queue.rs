use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DuelId;
use uuid::Uuid;

use crate::Result;

/// Arms and disarms the auto-roll deadline of a duel.
#[async_trait]
pub trait AutoRollScheduler: Send + Sync {
    /// Schedules the auto-roll for `deadline`, replacing any pending one.
    async fn schedule_auto_roll(&self, duel_id: &DuelId, deadline: DateTime<Utc>) -> Result<()>;

    /// Removes the pending auto-roll. A no-op when nothing is scheduled.
    async fn cancel_auto_roll(&self, duel_id: &DuelId) -> Result<()>;
}

/// A due task handed to a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedTask {
    pub duel_id: DuelId,
    /// Changes every time the task is rescheduled.
    pub token: Uuid,
    /// Number of claims so far, including this one.
    pub attempts: u32,
}

/// Worker-facing side of the queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Claims up to `limit` tasks due at `now`.
    ///
    /// Claimed tasks are pushed back by a retry delay that grows with the
    /// attempt count, so a task that is never acknowledged fires again.
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ClaimedTask>>;

    /// Deletes a handled task.
    ///
    /// Returns false when the task was rescheduled or cancelled in the
    /// meantime, in which case the newer task is kept.
    async fn ack(&self, task: &ClaimedTask) -> Result<bool>;
}

/// Runs the auto-roll for a duel whose deadline passed.
///
/// Tasks are delivered at least once, so implementations must tolerate
/// duplicate and stale deliveries.
#[async_trait]
pub trait AutoRollHandler: Send + Sync {
    type Error: std::fmt::Display + Send;

    async fn handle(&self, duel_id: &DuelId) -> std::result::Result<(), Self::Error>;
}
