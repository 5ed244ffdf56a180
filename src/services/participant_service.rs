//! Request-boundary glue for participant routes: resolves the store from shared state and
//! hands off to the pipeline components.

use uuid::Uuid;

use crate::{
    dto::{
        poll::PollSnapshotResponse,
        response::{ScoreResponse, ScoreSubmission, VoteReceiptResponse, VoteRequest},
    },
    error::ServiceError,
    services::{
        poll_aggregator::PollAggregator,
        response_service::{self, ScoreRequest},
        vote_ledger,
    },
    state::SharedState,
};

/// Score an answer and return the participant's updated standing.
pub async fn submit_score(
    state: &SharedState,
    submission: ScoreSubmission,
) -> Result<ScoreResponse, ServiceError> {
    let server_judged = submission.is_server_judged();
    let request = ScoreRequest::try_from(submission)?;
    let store = state.require_room_store().await?;

    let outcome =
        response_service::submit_response(store.as_ref(), state.config().scoring(), request)
            .await?;
    Ok(ScoreResponse::from_outcome(outcome, server_judged))
}

/// Cast a participant's single vote on an activation.
pub async fn submit_vote(
    state: &SharedState,
    activation_id: Uuid,
    request: VoteRequest,
) -> Result<VoteReceiptResponse, ServiceError> {
    let (Some(player_id), Some(option_id)) = (request.player_id, request.option_id) else {
        return Err(ServiceError::InvalidInput(
            "`playerId` and `optionId` are required".into(),
        ));
    };
    let store = state.require_room_store().await?;

    let receipt = vote_ledger::cast_vote(
        store.as_ref(),
        state.activity(),
        activation_id,
        player_id,
        &option_id,
    )
    .await?;
    Ok(receipt.into())
}

/// One-shot authoritative snapshot; unlike the streamed variant, read failures are errors.
pub async fn poll_snapshot(
    state: &SharedState,
    activation_id: Uuid,
    player_id: Uuid,
) -> Result<PollSnapshotResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let mut aggregator = PollAggregator::new(player_id, Some(activation_id));

    if !aggregator.try_resync(store.as_ref()).await? {
        return Err(ServiceError::NotFound(format!(
            "activation `{activation_id}` not found"
        )));
    }
    Ok(aggregator.snapshot().into())
}
