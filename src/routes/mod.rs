use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{services::documentation::ApiDoc, state::SharedState};

/// Operator endpoints.
pub mod admin;
/// Liveness and storage health.
pub mod health;
/// Player registration and leaderboards.
pub mod player;
/// One-shot and streamed poll snapshots.
pub mod poll;
/// Participant answers and votes.
pub mod response;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(response::router())
        .merge(poll::router())
        .merge(admin::router())
        .merge(player::router());

    api_router.merge(docs_router()).with_state(state)
}

/// Swagger UI backed by the generated OpenAPI document.
fn docs_router() -> Router<SharedState> {
    SwaggerUi::new("/docs")
        .url("/api-doc/openapi.json", ApiDoc::openapi())
        .into()
}
