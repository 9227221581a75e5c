//! Duel command and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{DuelId, PageRequest, UserId};
use domain::{Duel, DuelParams, ItemId, MaxGifts, MaxPlayers, Participant, Roll, Round, Stake};
use duel_store::DuelStore;
use saga::{
    CancelDuel, CreateDuel, DuelCoordinator, DuelQueries, InMemoryCustodyService,
    InMemoryEventPublisher, JoinDuel, RandomDiceService, RollDice, RoundProgress,
};
use scheduler::AutoRollScheduler;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Header carrying the authenticated caller's user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Coordinator wired with the in-process collaborators.
pub type Coordinator<S, Sc> =
    DuelCoordinator<S, InMemoryCustodyService, RandomDiceService, Sc, InMemoryEventPublisher>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DuelStore, Sc: AutoRollScheduler> {
    pub coordinator: Coordinator<S, Sc>,
    pub queries: DuelQueries<S>,
    pub custody: InMemoryCustodyService,
    pub publisher: InMemoryEventPublisher,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateDuelRequest {
    #[serde(default)]
    pub is_private: bool,
    pub max_players: u8,
    pub max_gifts: u8,
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub photo_url: String,
}

#[derive(Deserialize)]
pub struct JoinDuelRequest {
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub photo_url: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct DuelResponse {
    pub id: String,
    pub display_number: i64,
    pub status: String,
    pub is_private: bool,
    pub max_players: u8,
    pub max_gifts: u8,
    pub winner_id: Option<UserId>,
    pub next_roll_deadline: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_stake_value: String,
    pub participants: Vec<Participant>,
    pub stakes: Vec<Stake>,
    pub rounds: Vec<RoundResponse>,
}

#[derive(Serialize)]
pub struct RoundResponse {
    pub round_number: u32,
    pub participants: Vec<UserId>,
    pub rolls: Vec<Roll>,
}

#[derive(Serialize)]
pub struct RollResponse {
    pub roll: Roll,
    #[serde(flatten)]
    pub progress: ProgressResponse,
}

/// What the roll did to the duel.
#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProgressResponse {
    Pending {
        deadline: Option<DateTime<Utc>>,
    },
    NextRound {
        round_number: u32,
        participants: Vec<UserId>,
        deadline: DateTime<Utc>,
    },
    Completed {
        winner_id: UserId,
    },
}

#[derive(Serialize)]
pub struct DuelListResponse {
    pub duels: Vec<DuelResponse>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl From<&Duel> for DuelResponse {
    fn from(duel: &Duel) -> Self {
        let params = duel.params();
        Self {
            id: duel.id().to_string(),
            display_number: duel.display_number(),
            status: duel.status().to_string(),
            is_private: params.is_private,
            max_players: params.max_players.get(),
            max_gifts: params.max_gifts.get(),
            winner_id: duel.winner_id(),
            next_roll_deadline: duel.next_roll_deadline(),
            created_at: duel.created_at(),
            completed_at: duel.completed_at(),
            total_stake_value: duel.total_stake_value().to_string(),
            participants: duel.participants().to_vec(),
            stakes: duel.stakes().to_vec(),
            rounds: duel.rounds().iter().map(RoundResponse::from).collect(),
        }
    }
}

impl From<&Round> for RoundResponse {
    fn from(round: &Round) -> Self {
        Self {
            round_number: round.round_number(),
            participants: round.participants().to_vec(),
            rolls: round.rolls().to_vec(),
        }
    }
}

impl From<RoundProgress> for ProgressResponse {
    fn from(progress: RoundProgress) -> Self {
        match progress {
            // Manual rolls never skip; treat it like a round still in play.
            RoundProgress::Skipped => ProgressResponse::Pending { deadline: None },
            RoundProgress::Pending { deadline } => ProgressResponse::Pending { deadline },
            RoundProgress::NextRound {
                round_number,
                participants,
                deadline,
            } => ProgressResponse::NextRound {
                round_number,
                participants,
                deadline,
            },
            RoundProgress::Completed { winner_id } => ProgressResponse::Completed { winner_id },
        }
    }
}

// -- Handlers --

/// POST /duels: open a duel staked with the caller's items.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create<S, Sc>(
    State(state): State<Arc<AppState<S, Sc>>>,
    headers: HeaderMap,
    Json(req): Json<CreateDuelRequest>,
) -> Result<(StatusCode, Json<DuelResponse>), ApiError>
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let creator_id = caller_id(&headers)?;
    let params = DuelParams::new(
        req.is_private,
        MaxPlayers::new(req.max_players)?,
        MaxGifts::new(req.max_gifts)?,
    );
    let cmd = CreateDuel::new(creator_id, params, parse_item_ids(req.item_ids)?)
        .with_photo_url(req.photo_url);

    let duel = state.coordinator.create_duel(cmd).await?;
    Ok((StatusCode::CREATED, Json(DuelResponse::from(&duel))))
}

/// POST /duels/:id/join: take a seat in a waiting duel.
#[tracing::instrument(skip(state, headers, req))]
pub async fn join<S, Sc>(
    State(state): State<Arc<AppState<S, Sc>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<JoinDuelRequest>,
) -> Result<Json<DuelResponse>, ApiError>
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let user_id = caller_id(&headers)?;
    let cmd = JoinDuel::new(parse_duel_id(id)?, user_id, parse_item_ids(req.item_ids)?)
        .with_photo_url(req.photo_url);

    let duel = state.coordinator.join_duel(cmd).await?;
    Ok(Json(DuelResponse::from(&duel)))
}

/// POST /duels/:id/roll: roll in the current round.
#[tracing::instrument(skip(state, headers))]
pub async fn roll<S, Sc>(
    State(state): State<Arc<AppState<S, Sc>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RollResponse>, ApiError>
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let user_id = caller_id(&headers)?;
    let result = state
        .coordinator
        .roll_dice(RollDice::new(parse_duel_id(id)?, user_id))
        .await?;

    Ok(Json(RollResponse {
        roll: result.roll,
        progress: result.progress.into(),
    }))
}

/// POST /duels/:id/cancel: withdraw a duel nobody has filled yet.
#[tracing::instrument(skip(state, headers))]
pub async fn cancel<S, Sc>(
    State(state): State<Arc<AppState<S, Sc>>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<DuelResponse>, ApiError>
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let user_id = caller_id(&headers)?;
    let duel = state
        .coordinator
        .cancel_duel(CancelDuel::new(parse_duel_id(id)?, user_id))
        .await?;
    Ok(Json(DuelResponse::from(&duel)))
}

/// GET /duels/:id: load a duel.
#[tracing::instrument(skip(state))]
pub async fn get<S, Sc>(
    State(state): State<Arc<AppState<S, Sc>>>,
    Path(id): Path<String>,
) -> Result<Json<DuelResponse>, ApiError>
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let duel_id = parse_duel_id(id)?;
    let duel = state
        .queries
        .get_duel(&duel_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Duel {duel_id} not found")))?;
    Ok(Json(DuelResponse::from(&duel)))
}

/// GET /duels: list duels newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S, Sc>(
    State(state): State<Arc<AppState<S, Sc>>>,
    Query(page): Query<PageRequest>,
) -> Result<Json<DuelListResponse>, ApiError>
where
    S: DuelStore + 'static,
    Sc: AutoRollScheduler + 'static,
{
    let page = state.queries.list_duels(page).await?;

    Ok(Json(DuelListResponse {
        duels: page.duels.iter().map(DuelResponse::from).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        total_pages: page.total_pages,
    }))
}

fn caller_id(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<i64>().ok())
        .and_then(|id| UserId::new(id).ok())
        .ok_or(ApiError::Unauthorized)
}

fn parse_duel_id(id: String) -> Result<DuelId, ApiError> {
    DuelId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid duel id: {e}")))
}

fn parse_item_ids(ids: Vec<String>) -> Result<Vec<ItemId>, ApiError> {
    ids.into_iter()
        .map(|id| ItemId::new(id).map_err(ApiError::from))
        .collect()
}
