use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Live Poll Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::response::submit_score,
        crate::routes::response::submit_vote,
        crate::routes::poll::poll_snapshot,
        crate::routes::poll::poll_stream,
        crate::routes::admin::create_activation,
        crate::routes::admin::list_activations,
        crate::routes::admin::transition_activation,
        crate::routes::player::register_player,
        crate::routes::player::leaderboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::StorageStatus,
            crate::dto::response::ScoreSubmission,
            crate::dto::response::ScoreResponse,
            crate::dto::response::PlayerStatsDto,
            crate::dto::response::VoteRequest,
            crate::dto::response::VoteReceiptResponse,
            crate::dto::poll::PollSnapshotResponse,
            crate::dto::poll::StreamMode,
            crate::dto::activation::CreateActivationRequest,
            crate::dto::activation::OptionInput,
            crate::dto::activation::TransitionRequest,
            crate::dto::activation::ActivationSummary,
            crate::dto::activation::OptionSummary,
            crate::dto::player::RegisterPlayerRequest,
            crate::dto::player::PlayerSummary,
            crate::dto::player::LeaderboardEntry,
            crate::dao::models::ActivationKind,
            crate::dao::models::PollState,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "responses", description = "Participant answers and votes"),
        (name = "poll", description = "Live poll snapshots"),
        (name = "admin", description = "Operator management of activations"),
        (name = "players", description = "Participants and leaderboards"),
    )
)]
pub struct ApiDoc;
