use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use uuid::Uuid;

use crate::{
    dto::activation::{ActivationSummary, CreateActivationRequest, TransitionRequest},
    error::AppError,
    services::activation_service,
    state::SharedState,
};

/// Operator endpoints creating activations and driving their lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/admin/activations", post(create_activation))
        .route("/admin/rooms/{room_id}/activations", get(list_activations))
        .route("/admin/activations/{id}/state", post(transition_activation))
}

/// Create an activation; it starts in the `pending` state.
#[utoipa::path(
    post,
    path = "/admin/activations",
    tag = "admin",
    request_body = CreateActivationRequest,
    responses(
        (status = 200, description = "Activation created", body = ActivationSummary),
        (status = 400, description = "Inconsistent activation definition")
    )
)]
pub async fn create_activation(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateActivationRequest>>,
) -> Result<Json<ActivationSummary>, AppError> {
    Ok(Json(
        activation_service::create_activation(&state, payload).await?,
    ))
}

/// List a room's activations, oldest first.
#[utoipa::path(
    get,
    path = "/admin/rooms/{room_id}/activations",
    tag = "admin",
    params(("room_id" = String, Path, description = "Identifier of the room")),
    responses((status = 200, description = "Activations of the room", body = [ActivationSummary]))
)]
pub async fn list_activations(
    State(state): State<SharedState>,
    Path(room_id): Path<Uuid>,
) -> Result<Json<Vec<ActivationSummary>>, AppError> {
    Ok(Json(
        activation_service::list_activations(&state, room_id).await?,
    ))
}

/// Move an activation forward: pending, then voting, then closed.
#[utoipa::path(
    post,
    path = "/admin/activations/{id}/state",
    tag = "admin",
    params(("id" = String, Path, description = "Identifier of the activation")),
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "State changed", body = ActivationSummary),
        (status = 404, description = "Unknown activation"),
        (status = 409, description = "Backwards or repeated transition")
    )
)]
pub async fn transition_activation(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Valid(Json(payload)): Valid<Json<TransitionRequest>>,
) -> Result<Json<ActivationSummary>, AppError> {
    Ok(Json(
        activation_service::transition(&state, id, payload).await?,
    ))
}
