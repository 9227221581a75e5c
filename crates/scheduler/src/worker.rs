//! Polling worker that fires due auto-roll tasks.

use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;

use crate::{
    Result,
    queue::{AutoRollHandler, TaskQueue},
};

/// Polling settings for [`AutoRollWorker`].
#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    /// Maximum number of tasks claimed per poll.
    pub batch_size: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            batch_size: 32,
        }
    }
}

/// Claims due tasks from a [`TaskQueue`] and runs them through an
/// [`AutoRollHandler`].
///
/// Successful tasks are acknowledged. Failed tasks stay in the queue and
/// fire again once their retry delay passes.
pub struct AutoRollWorker<Q, H>
where
    Q: TaskQueue,
    H: AutoRollHandler,
{
    queue: Q,
    handler: H,
    config: WorkerConfig,
}

impl<Q, H> AutoRollWorker<Q, H>
where
    Q: TaskQueue,
    H: AutoRollHandler,
{
    pub fn new(queue: Q, handler: H, config: WorkerConfig) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Claims and handles one batch. Returns the number of tasks handled
    /// successfully.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<usize> {
        let tasks = self
            .queue
            .claim_due(Utc::now(), self.config.batch_size)
            .await?;

        let mut handled = 0;
        for task in tasks {
            let start = Instant::now();
            match self.handler.handle(&task.duel_id).await {
                Ok(()) => {
                    handled += 1;
                    metrics::counter!("auto_roll_tasks_processed_total").increment(1);
                    metrics::histogram!("auto_roll_task_duration_seconds")
                        .record(start.elapsed().as_secs_f64());

                    if !self.queue.ack(&task).await? {
                        tracing::debug!(
                            duel_id = %task.duel_id,
                            "auto-roll task was re-armed while running"
                        );
                    }
                }
                Err(e) => {
                    metrics::counter!("auto_roll_tasks_failed_total").increment(1);
                    tracing::warn!(
                        duel_id = %task.duel_id,
                        attempts = task.attempts,
                        error = %e,
                        "auto-roll task failed, will retry"
                    );
                }
            }
        }

        Ok(handled)
    }

    /// Polls until `shutdown` flips to true or its sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "auto-roll worker started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "failed to poll auto-roll tasks");
                    }
                }
            }
        }

        tracing::info!("auto-roll worker stopped");
    }
}
