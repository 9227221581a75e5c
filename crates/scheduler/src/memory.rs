use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use common::DuelId;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    Result, SchedulerError,
    queue::{AutoRollScheduler, ClaimedTask, TaskQueue},
};

/// Default pause before a claimed but unacknowledged task fires again.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// A pending auto-roll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub duel_id: DuelId,
    pub run_at: DateTime<Utc>,
    pub token: Uuid,
    pub attempts: u32,
}

#[derive(Debug, Default)]
struct InMemorySchedulerState {
    tasks: HashMap<DuelId, ScheduledTask>,
    fail_on_schedule: bool,
    fail_on_cancel: bool,
}

/// In-memory scheduler and task queue for testing.
///
/// Tasks are keyed by duel ID, so scheduling replaces and cancelling removes
/// without scanning.
#[derive(Debug, Clone)]
pub struct InMemoryScheduler {
    state: Arc<RwLock<InMemorySchedulerState>>,
    retry_delay: Duration,
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::with_retry_delay(DEFAULT_RETRY_DELAY)
    }

    pub fn with_retry_delay(retry_delay: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemorySchedulerState::default())),
            retry_delay,
        }
    }

    /// Configures scheduling to fail.
    pub async fn set_fail_on_schedule(&self, fail: bool) {
        self.state.write().await.fail_on_schedule = fail;
    }

    /// Configures cancelling to fail.
    pub async fn set_fail_on_cancel(&self, fail: bool) {
        self.state.write().await.fail_on_cancel = fail;
    }

    /// Returns the pending task for a duel.
    pub async fn scheduled(&self, duel_id: &DuelId) -> Option<ScheduledTask> {
        self.state.read().await.tasks.get(duel_id).cloned()
    }

    /// Returns the number of pending tasks.
    pub async fn task_count(&self) -> usize {
        self.state.read().await.tasks.len()
    }
}

#[async_trait]
impl AutoRollScheduler for InMemoryScheduler {
    async fn schedule_auto_roll(&self, duel_id: &DuelId, deadline: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_schedule {
            return Err(SchedulerError::Unavailable("schedule failed".to_string()));
        }

        state.tasks.insert(
            duel_id.clone(),
            ScheduledTask {
                duel_id: duel_id.clone(),
                run_at: deadline,
                token: Uuid::new_v4(),
                attempts: 0,
            },
        );
        Ok(())
    }

    async fn cancel_auto_roll(&self, duel_id: &DuelId) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_cancel {
            return Err(SchedulerError::Unavailable("cancel failed".to_string()));
        }

        state.tasks.remove(duel_id);
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for InMemoryScheduler {
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ClaimedTask>> {
        let mut state = self.state.write().await;

        let mut due: Vec<&mut ScheduledTask> = state
            .tasks
            .values_mut()
            .filter(|task| task.run_at <= now)
            .collect();
        due.sort_by_key(|task| task.run_at);

        let retry = TimeDelta::from_std(self.retry_delay).unwrap_or(TimeDelta::MAX);
        let claimed = due
            .into_iter()
            .take(limit as usize)
            .map(|task| {
                task.attempts += 1;
                task.run_at = now + retry * task.attempts as i32;
                ClaimedTask {
                    duel_id: task.duel_id.clone(),
                    token: task.token,
                    attempts: task.attempts,
                }
            })
            .collect();

        Ok(claimed)
    }

    async fn ack(&self, task: &ClaimedTask) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.tasks.get(&task.duel_id) {
            Some(pending) if pending.token == task.token => {
                state.tasks.remove(&task.duel_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
