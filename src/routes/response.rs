use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::response::{ScoreResponse, ScoreSubmission, VoteReceiptResponse, VoteRequest},
    error::AppError,
    services::participant_service,
    state::SharedState,
};

/// Participant submissions: scored answers and poll votes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/responses/score", post(submit_score))
        .route("/activations/{id}/votes", post(submit_vote))
}

/// Score an answer, pre-judged or raw, and return the updated standing.
#[utoipa::path(
    post,
    path = "/responses/score",
    tag = "responses",
    request_body = ScoreSubmission,
    responses(
        (status = 200, description = "Answer scored", body = ScoreResponse),
        (status = 400, description = "Missing or malformed fields"),
        (status = 404, description = "Unknown activation or player"),
        (status = 409, description = "Already answered, or activation not accepting answers"),
        (status = 500, description = "Persistence failure"),
        (status = 503, description = "Degraded mode")
    )
)]
pub async fn submit_score(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<ScoreSubmission>>,
) -> Result<Json<ScoreResponse>, AppError> {
    Ok(Json(participant_service::submit_score(&state, payload).await?))
}

/// Cast the caller's single vote on an activation.
#[utoipa::path(
    post,
    path = "/activations/{id}/votes",
    tag = "responses",
    params(("id" = String, Path, description = "Identifier of the activation")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote recorded", body = VoteReceiptResponse),
        (status = 400, description = "Unknown option"),
        (status = 404, description = "Unknown activation"),
        (status = 409, description = "Already voted, or voting closed")
    )
)]
pub async fn submit_vote(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<VoteRequest>>,
) -> Result<Json<VoteReceiptResponse>, AppError> {
    Ok(Json(participant_service::submit_vote(&state, id, payload).await?))
}
