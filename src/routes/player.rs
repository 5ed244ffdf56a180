use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::player::{LeaderboardEntry, PlayerSummary, RegisterPlayerRequest},
    error::AppError,
    services::player_service,
    state::SharedState,
};

/// Participant registration and room leaderboards.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/players", post(register_player))
        .route("/rooms/{room_id}/leaderboard", get(leaderboard))
}

/// Register a participant in a room.
#[utoipa::path(
    post,
    path = "/players",
    tag = "players",
    request_body = RegisterPlayerRequest,
    responses(
        (status = 200, description = "Player registered", body = PlayerSummary),
        (status = 409, description = "Player already exists")
    )
)]
pub async fn register_player(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<RegisterPlayerRequest>>,
) -> Result<Json<PlayerSummary>, AppError> {
    Ok(Json(player_service::register_player(&state, payload).await?))
}

/// Room leaderboard, highest score first.
#[utoipa::path(
    get,
    path = "/rooms/{room_id}/leaderboard",
    tag = "players",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses((status = 200, description = "Leaderboard", body = [LeaderboardEntry]))
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(player_service::leaderboard(&state, room_id).await?))
}
