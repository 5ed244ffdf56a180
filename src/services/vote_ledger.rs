//! One counted vote per participant and activation, enforced by the store.

use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{PollState, VoteEntity},
        room_store::RoomStore,
        storage::StorageError,
    },
    state::{ActivityHub, ActivityKind},
};

/// Reasons a vote is refused.
#[derive(Debug, Error)]
pub enum VoteError {
    /// The store already holds a vote for this participant.
    #[error("participant already voted on this activation")]
    AlreadyVoted,
    /// The activation is not in the `voting` state.
    #[error("activation is not accepting votes (state {0:?})")]
    VotingClosed(PollState),
    /// No option of the activation has this identity key.
    #[error("unknown option `{0}`")]
    InvalidOption(String),
    /// The activation does not exist.
    #[error("activation `{0}` not found")]
    ActivationNotFound(Uuid),
    /// The store failed for another reason.
    #[error("vote persistence failed")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for VoteError {
    fn from(err: StorageError) -> Self {
        if err.is_conflict() {
            VoteError::AlreadyVoted
        } else {
            VoteError::Storage(err)
        }
    }
}

/// Authoritative record of an accepted vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    /// Activation voted on.
    pub activation_id: Uuid,
    /// Voting participant.
    pub player_id: Uuid,
    /// Identity key of the chosen option.
    pub option_id: String,
    /// Display key, resolved from the activation.
    pub option_text: String,
    /// Time the vote was recorded.
    pub submitted_at: SystemTime,
}

impl From<VoteEntity> for VoteReceipt {
    fn from(vote: VoteEntity) -> Self {
        Self {
            activation_id: vote.activation_id,
            player_id: vote.player_id,
            option_id: vote.option_id,
            option_text: vote.option_text,
            submitted_at: vote.submitted_at,
        }
    }
}

/// Record a vote for `option_id`.
///
/// Duplicate detection is left entirely to the store's uniqueness constraint; there is no
/// read of earlier votes beforehand, so concurrent submissions from the same participant
/// resolve to exactly one winner.
pub async fn cast_vote(
    store: &dyn RoomStore,
    hub: &ActivityHub,
    activation_id: Uuid,
    player_id: Uuid,
    option_id: &str,
) -> Result<VoteReceipt, VoteError> {
    let activation = store
        .find_activation(activation_id)
        .await
        .map_err(VoteError::Storage)?
        .ok_or(VoteError::ActivationNotFound(activation_id))?;

    if !activation.poll_state.accepts_responses() {
        return Err(VoteError::VotingClosed(activation.poll_state));
    }

    let option = activation
        .option(option_id)
        .ok_or_else(|| VoteError::InvalidOption(option_id.to_string()))?;

    let vote = VoteEntity {
        activation_id,
        player_id,
        option_id: option.id.clone(),
        option_text: option.text.clone(),
        submitted_at: SystemTime::now(),
    };

    if let Err(err) = store.insert_vote(vote.clone()).await {
        let err = VoteError::from(err);
        if matches!(err, VoteError::AlreadyVoted) {
            debug!(%activation_id, %player_id, "duplicate vote rejected by store");
        }
        return Err(err);
    }

    info!(%activation_id, %player_id, option_id = %vote.option_id, "vote recorded");
    hub.publish(
        activation_id,
        ActivityKind::VoteCast {
            player_id,
            option_id: vote.option_id.clone(),
        },
    );
    Ok(vote.into())
}
