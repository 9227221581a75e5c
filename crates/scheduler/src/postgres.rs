use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::DuelId;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::{
    Result, SchedulerError,
    memory::DEFAULT_RETRY_DELAY,
    queue::{AutoRollScheduler, ClaimedTask, TaskQueue},
};

/// PostgreSQL-backed scheduler using the `auto_roll_tasks` table.
///
/// The table's primary key on `duel_id` keeps one task per duel. Workers
/// claim with `FOR UPDATE SKIP LOCKED`, so several workers can poll the
/// same table.
#[derive(Clone)]
pub struct PostgresScheduler {
    pool: PgPool,
    retry_delay: Duration,
}

impl PostgresScheduler {
    pub fn new(pool: PgPool) -> Self {
        Self::with_retry_delay(pool, DEFAULT_RETRY_DELAY)
    }

    pub fn with_retry_delay(pool: PgPool, retry_delay: Duration) -> Self {
        Self { pool, retry_delay }
    }
}

#[async_trait]
impl AutoRollScheduler for PostgresScheduler {
    #[tracing::instrument(skip(self, duel_id), fields(duel_id = %duel_id))]
    async fn schedule_auto_roll(&self, duel_id: &DuelId, deadline: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO auto_roll_tasks (duel_id, run_at, token, attempts)
            VALUES ($1, $2, $3, 0)
            ON CONFLICT (duel_id)
            DO UPDATE SET run_at = EXCLUDED.run_at, token = EXCLUDED.token, attempts = 0
            "#,
        )
        .bind(duel_id.as_str())
        .bind(deadline)
        .bind(Uuid::new_v4())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, duel_id), fields(duel_id = %duel_id))]
    async fn cancel_auto_roll(&self, duel_id: &DuelId) -> Result<()> {
        sqlx::query("DELETE FROM auto_roll_tasks WHERE duel_id = $1")
            .bind(duel_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl TaskQueue for PostgresScheduler {
    async fn claim_due(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<ClaimedTask>> {
        let rows = sqlx::query(
            r#"
            UPDATE auto_roll_tasks
            SET attempts = attempts + 1,
                run_at = $1 + make_interval(secs => $2 * (attempts + 1))
            WHERE duel_id IN (
                SELECT duel_id FROM auto_roll_tasks
                WHERE run_at <= $1
                ORDER BY run_at ASC
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING duel_id, token, attempts
            "#,
        )
        .bind(now)
        .bind(self.retry_delay.as_secs_f64())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let duel_id: String = row.try_get("duel_id")?;
                let attempts: i32 = row.try_get("attempts")?;
                Ok(ClaimedTask {
                    duel_id: DuelId::parse(duel_id)
                        .map_err(|e| SchedulerError::Unavailable(e.to_string()))?,
                    token: row.try_get("token")?,
                    attempts: u32::try_from(attempts).unwrap_or(0),
                })
            })
            .collect()
    }

    async fn ack(&self, task: &ClaimedTask) -> Result<bool> {
        let result = sqlx::query("DELETE FROM auto_roll_tasks WHERE duel_id = $1 AND token = $2")
            .bind(task.duel_id.as_str())
            .bind(task.token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
