use std::convert::Infallible;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use uuid::Uuid;

use crate::{
    dto::poll::{PollQuery, PollSnapshotResponse, PollStreamQuery},
    error::AppError,
    services::{participant_service, sse_service},
    state::SharedState,
};

/// Live poll views for participant sessions.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/activations/{id}/poll", get(poll_snapshot))
        .route("/activations/{id}/poll/stream", get(poll_stream))
}

#[utoipa::path(
    get,
    path = "/activations/{id}/poll",
    tag = "poll",
    params(("id" = String, Path, description = "Identifier of the activation"), PollQuery),
    responses(
        (status = 200, description = "Current tallies", body = PollSnapshotResponse),
        (status = 404, description = "Unknown activation")
    )
)]
/// Return an authoritative snapshot of the activation's tallies.
pub async fn poll_snapshot(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PollQuery>,
) -> Result<Json<PollSnapshotResponse>, AppError> {
    let snapshot = participant_service::poll_snapshot(&state, id, query.player_id).await?;
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/activations/{id}/poll/stream",
    tag = "poll",
    params(("id" = String, Path, description = "Identifier of the activation"), PollStreamQuery),
    responses((status = 200, description = "Snapshot stream", content_type = "text/event-stream", body = String))
)]
/// Stream snapshots from a session-owned aggregator until the client disconnects.
pub async fn poll_stream(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Query(query): Query<PollStreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    sse_service::poll_stream(state, id, query.player_id, query.mode)
}
