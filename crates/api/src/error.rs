//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DuelError;
use duel_store::StoreError;
use saga::CommandError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller did not identify themselves.
    Unauthorized,
    /// Duel command error.
    Command(CommandError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "missing or invalid x-user-id header".to_string(),
            ),
            ApiError::Command(err) => command_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_string(),
                )
            }
        };

        metrics::counter!("http_errors_total", "code" => code).increment(1);
        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn command_error_to_response(err: CommandError) -> (StatusCode, &'static str, String) {
    match &err {
        CommandError::Domain(duel_err) => {
            let (status, code) = duel_error_status(duel_err);
            if status.is_server_error() {
                tracing::error!(error = %err, "duel command failed");
            }
            (status, code, duel_err.to_string())
        }
        CommandError::DuelNotFound(_) | CommandError::Store(StoreError::DuelNotFound(_)) => {
            (StatusCode::NOT_FOUND, "duel_not_found", err.to_string())
        }
        CommandError::NoItems | CommandError::TooManyItems { .. } | CommandError::DuplicateItem(_) => {
            (StatusCode::BAD_REQUEST, "invalid_items", err.to_string())
        }
        CommandError::NotCreator { .. } => (StatusCode::FORBIDDEN, "not_creator", err.to_string()),
        _ => {
            tracing::error!(error = %err, "duel command failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "internal server error".to_string(),
            )
        }
    }
}

fn duel_error_status(err: &DuelError) -> (StatusCode, &'static str) {
    match err {
        DuelError::InvalidId(_)
        | DuelError::InvalidAmount(_)
        | DuelError::InvalidMaxPlayers(_)
        | DuelError::InvalidMaxGifts(_)
        | DuelError::InvalidDiceValue(_)
        | DuelError::InvalidRoundNumber(_)
        | DuelError::NoParticipants
        | DuelError::EmptyItemId
        | DuelError::EmptyItemTitle => (StatusCode::BAD_REQUEST, "validation_error"),
        DuelError::UnknownStatus(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        DuelError::MaxPlayersExceeded { .. } => (StatusCode::CONFLICT, "duel_full"),
        DuelError::AlreadyJoined { .. } => (StatusCode::CONFLICT, "already_joined"),
        DuelError::ParticipantNotFound { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "participant_not_found")
        }
        DuelError::DuelNotInProgress { .. } => (StatusCode::CONFLICT, "duel_not_in_progress"),
        DuelError::InvalidStateTransition { .. } => (StatusCode::CONFLICT, "invalid_state"),
        DuelError::NotEnoughParticipants { .. } => (StatusCode::CONFLICT, "not_enough_participants"),
        DuelError::NoRoundStarted => (StatusCode::CONFLICT, "no_round_started"),
        DuelError::AlreadyRolled { .. } => (StatusCode::CONFLICT, "already_rolled"),
        DuelError::CreatorNotFound => (StatusCode::UNPROCESSABLE_ENTITY, "creator_not_found"),
        DuelError::NoStakesFromCreator => (StatusCode::UNPROCESSABLE_ENTITY, "no_creator_stakes"),
        DuelError::StakeOutOfRange { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "stake_out_of_range"),
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        ApiError::Command(err)
    }
}

impl From<DuelError> for ApiError {
    fn from(err: DuelError) -> Self {
        ApiError::Command(CommandError::Domain(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{DuelId, UserId};

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_domain_errors_map_to_client_statuses() {
        let user_id = UserId::new(7).unwrap();
        assert_eq!(
            status_of(DuelError::MaxPlayersExceeded { max_players: 2 }.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(DuelError::ParticipantNotFound { user_id }.into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(DuelError::InvalidMaxPlayers(9).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_missing_duel_is_not_found() {
        let err = CommandError::DuelNotFound(DuelId::new());
        assert_eq!(status_of(err.into()), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_external_failures_are_internal() {
        let err = CommandError::Custody("connection refused".to_string());
        assert_eq!(status_of(err.into()), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_of(ApiError::Unauthorized), StatusCode::UNAUTHORIZED);
    }
}
