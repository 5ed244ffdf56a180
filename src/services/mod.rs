/// Operator management of activations.
pub mod activation_service;
/// Correctness decisions for submitted answers.
pub mod answer_validator;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Request-boundary glue for participant routes.
pub mod participant_service;
/// Participant registration and leaderboards.
pub mod player_service;
/// Session-side tally aggregation and refresh loops.
pub mod poll_aggregator;
/// Answer scoring and player stats persistence.
pub mod response_service;
/// Time-decay awards and running statistics.
pub mod scoring;
/// Server-Sent Events snapshot streams.
pub mod sse_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
/// Vote deduplication through the store's uniqueness constraint.
pub mod vote_ledger;
