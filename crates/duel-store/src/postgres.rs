use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Amount, DuelId, PageRequest, UserId};
use domain::{
    DiceValue, Duel, DuelError, DuelParams, DuelSnapshot, DuelStatus, ItemId, MaxGifts,
    MaxPlayers, Participant, Roll, Round, Stake, StakedItem,
};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{DuelStore, DuelTx},
};

const DUEL_COLUMNS: &str = "id, display_number, is_private, max_players, max_gifts, status, \
     winner_id, next_roll_deadline, created_at, updated_at, completed_at";

/// PostgreSQL-backed duel store.
#[derive(Clone)]
pub struct PostgresDuelStore {
    pool: PgPool,
}

impl PostgresDuelStore {
    /// Creates a new PostgreSQL duel store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl DuelStore for PostgresDuelStore {
    type Tx = PostgresDuelTx;

    async fn begin(&self) -> Result<Self::Tx> {
        Ok(PostgresDuelTx {
            tx: self.pool.begin().await?,
        })
    }
}

/// Transaction over [`PostgresDuelStore`].
///
/// Dropping it without calling `commit` rolls the database transaction back.
pub struct PostgresDuelTx {
    tx: Transaction<'static, Postgres>,
}

impl PostgresDuelTx {
    async fn load_duel(&mut self, id: &DuelId, lock: &str) -> Result<Option<Duel>> {
        let row = sqlx::query(&format!(
            "SELECT {DUEL_COLUMNS} FROM duels WHERE id = $1{lock}"
        ))
        .bind(id.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(hydrate(&mut *self.tx, vec![row]).await?.pop())
    }
}

#[async_trait]
impl DuelTx for PostgresDuelTx {
    async fn create_duel(&mut self, duel: &Duel) -> Result<i64> {
        let params = duel.params();
        let display_number: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO duels (id, is_private, max_players, max_gifts, status, winner_id,
                               next_roll_deadline, created_at, updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING display_number
            "#,
        )
        .bind(duel.id().as_str())
        .bind(params.is_private)
        .bind(i16::from(params.max_players.get()))
        .bind(i16::from(params.max_gifts.get()))
        .bind(duel.status().as_str())
        .bind(duel.winner_id().map(|id| id.as_i64()))
        .bind(duel.next_roll_deadline())
        .bind(duel.created_at())
        .bind(duel.updated_at())
        .bind(duel.completed_at())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(display_number)
    }

    #[tracing::instrument(skip(self, id), fields(duel_id = %id))]
    async fn get_duel_by_id(&mut self, id: &DuelId) -> Result<Option<Duel>> {
        self.load_duel(id, " FOR UPDATE").await
    }

    #[tracing::instrument(skip(self, id), fields(duel_id = %id))]
    async fn find_duel_by_id(&mut self, id: &DuelId) -> Result<Option<Duel>> {
        self.load_duel(id, "").await
    }

    async fn get_duel_list(&mut self, page: PageRequest) -> Result<(Vec<Duel>, u64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM duels")
            .fetch_one(&mut *self.tx)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {DUEL_COLUMNS} FROM duels \
             ORDER BY created_at DESC, display_number DESC LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.page_size()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await?;

        let duels = hydrate(&mut *self.tx, rows).await?;
        Ok((duels, u64::try_from(total).unwrap_or(0)))
    }

    async fn create_participant(
        &mut self,
        duel_id: &DuelId,
        participant: &Participant,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO duel_participants (duel_id, user_id, photo_url, is_creator)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(duel_id.as_str())
        .bind(participant.user_id.as_i64())
        .bind(&participant.photo_url)
        .bind(participant.is_creator)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn create_stake(&mut self, duel_id: &DuelId, stake: &Stake) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO duel_stakes (duel_id, user_id, item_id, item_title, item_slug, item_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(duel_id.as_str())
        .bind(stake.user_id.as_i64())
        .bind(stake.item.id.as_str())
        .bind(&stake.item.title)
        .bind(&stake.item.slug)
        .bind(stake.item.value.as_decimal())
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn create_round(&mut self, duel_id: &DuelId, round: &Round) -> Result<()> {
        let participants: Vec<i64> = round.participants().iter().map(|u| u.as_i64()).collect();
        sqlx::query(
            r#"
            INSERT INTO duel_rounds (duel_id, round_number, participants)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(duel_id.as_str())
        .bind(round_number_to_db(round.round_number()))
        .bind(participants)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn create_roll(&mut self, duel_id: &DuelId, round_number: u32, roll: &Roll) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO duel_rolls (duel_id, round_number, user_id, dice_value, rolled_at, is_auto_rolled)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(duel_id.as_str())
        .bind(round_number_to_db(round_number))
        .bind(roll.user_id.as_i64())
        .bind(i16::from(roll.dice_value.get()))
        .bind(roll.rolled_at)
        .bind(roll.is_auto_rolled)
        .execute(&mut *self.tx)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn update_duel_status(
        &mut self,
        duel_id: &DuelId,
        status: DuelStatus,
        winner_id: Option<UserId>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE duels
            SET status = $2, winner_id = $3, completed_at = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(duel_id.as_str())
        .bind(status.as_str())
        .bind(winner_id.map(|id| id.as_i64()))
        .bind(completed_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuelNotFound(duel_id.clone()));
        }
        Ok(())
    }

    async fn update_next_roll_deadline(
        &mut self,
        duel_id: &DuelId,
        deadline: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE duels SET next_roll_deadline = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(duel_id.as_str())
        .bind(deadline)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::DuelNotFound(duel_id.clone()));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return StoreError::Conflict(db_err.constraint().unwrap_or("unknown").to_string());
    }
    StoreError::Database(e)
}

fn round_number_to_db(round_number: u32) -> i32 {
    i32::try_from(round_number).unwrap_or(i32::MAX)
}

fn user_id(value: i64) -> Result<UserId> {
    UserId::new(value).map_err(|e| StoreError::InvalidData(DuelError::from(e)))
}

fn small(value: i16) -> u8 {
    u8::try_from(value).unwrap_or(0)
}

fn row_to_snapshot(row: &PgRow) -> Result<DuelSnapshot> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;

    Ok(DuelSnapshot {
        id: DuelId::parse(id).map_err(DuelError::from)?,
        display_number: row.try_get("display_number")?,
        params: DuelParams::new(
            row.try_get("is_private")?,
            MaxPlayers::new(small(row.try_get("max_players")?))?,
            MaxGifts::new(small(row.try_get("max_gifts")?))?,
        ),
        status: status.parse()?,
        winner_id: row
            .try_get::<Option<i64>, _>("winner_id")?
            .map(user_id)
            .transpose()?,
        next_roll_deadline: row.try_get("next_roll_deadline")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        participants: Vec::new(),
        stakes: Vec::new(),
        rounds: Vec::new(),
    })
}

/// Loads children for every duel row with one query per child table.
async fn hydrate(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Duel>> {
    let mut snapshots = rows
        .iter()
        .map(row_to_snapshot)
        .collect::<Result<Vec<_>>>()?;
    if snapshots.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = snapshots.iter().map(|s| s.id.to_string()).collect();
    let index: HashMap<String, usize> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), i))
        .collect();

    let participant_rows = sqlx::query(
        r#"
        SELECT duel_id, user_id, photo_url, is_creator
        FROM duel_participants
        WHERE duel_id = ANY($1)
        ORDER BY seq ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in participant_rows {
        let duel_id: String = row.try_get("duel_id")?;
        if let Some(&i) = index.get(&duel_id) {
            snapshots[i].participants.push(Participant {
                user_id: user_id(row.try_get("user_id")?)?,
                photo_url: row.try_get("photo_url")?,
                is_creator: row.try_get("is_creator")?,
            });
        }
    }

    let stake_rows = sqlx::query(
        r#"
        SELECT duel_id, user_id, item_id, item_title, item_slug, item_value
        FROM duel_stakes
        WHERE duel_id = ANY($1)
        ORDER BY seq ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in stake_rows {
        let duel_id: String = row.try_get("duel_id")?;
        if let Some(&i) = index.get(&duel_id) {
            let item_id: String = row.try_get("item_id")?;
            let title: String = row.try_get("item_title")?;
            let slug: String = row.try_get("item_slug")?;
            let value: Decimal = row.try_get("item_value")?;
            let item = StakedItem::new(
                ItemId::new(item_id)?,
                title,
                slug,
                Amount::new(value).map_err(DuelError::from)?,
            )?;
            snapshots[i]
                .stakes
                .push(Stake::new(user_id(row.try_get("user_id")?)?, item));
        }
    }

    let roll_rows = sqlx::query(
        r#"
        SELECT duel_id, round_number, user_id, dice_value, rolled_at, is_auto_rolled
        FROM duel_rolls
        WHERE duel_id = ANY($1)
        ORDER BY seq ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut rolls: HashMap<(String, i32), Vec<Roll>> = HashMap::new();
    for row in roll_rows {
        let key = (row.try_get("duel_id")?, row.try_get("round_number")?);
        rolls.entry(key).or_default().push(Roll {
            user_id: user_id(row.try_get("user_id")?)?,
            dice_value: DiceValue::new(small(row.try_get("dice_value")?))?,
            rolled_at: row.try_get("rolled_at")?,
            is_auto_rolled: row.try_get("is_auto_rolled")?,
        });
    }

    let round_rows = sqlx::query(
        r#"
        SELECT duel_id, round_number, participants
        FROM duel_rounds
        WHERE duel_id = ANY($1)
        ORDER BY duel_id, round_number ASC
        "#,
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    for row in round_rows {
        let duel_id: String = row.try_get("duel_id")?;
        let round_number: i32 = row.try_get("round_number")?;
        let participants = row
            .try_get::<Vec<i64>, _>("participants")?
            .into_iter()
            .map(user_id)
            .collect::<Result<Vec<_>>>()?;
        let round_rolls = rolls
            .remove(&(duel_id.clone(), round_number))
            .unwrap_or_default();

        if let Some(&i) = index.get(&duel_id) {
            snapshots[i].rounds.push(Round::restore(
                u32::try_from(round_number).unwrap_or(0),
                participants,
                round_rolls,
            )?);
        }
    }

    Ok(snapshots.into_iter().map(Duel::restore).collect())
}
