/// CouchDB backend over its HTTP API.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// In-process backend.
pub mod memory;
#[cfg(test)]
pub(crate) mod scripted;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{ActivationEntity, AnswerEntity, PlayerEntity, PollState, VoteEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Outcome of a compare-and-swap write on a player or activation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The stored revision matched and the record was replaced.
    Applied,
    /// Another writer got there first; nothing was written.
    Stale,
}

/// Abstraction over the persistence collaborator backing the response pipeline.
///
/// `insert_vote`, `insert_answer` and `insert_player` must reject a second record for the same
/// key with [`StorageError::Conflict`]; that signal and the two compare-and-swap writes are the
/// only mutual exclusion the pipeline relies on.
///
/// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
pub trait RoomStore: Send + Sync {
    /// Insert or overwrite an activation.
    fn save_activation(
        &self,
        activation: ActivationEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Replace the activation only if its stored poll state still equals `expected_state`.
    fn compare_and_swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>>;
    /// Load an activation; `None` when it does not exist.
    fn find_activation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ActivationEntity>>>;
    /// Activations of a room, oldest first.
    fn list_activations(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivationEntity>>>;
    /// Record a vote; a second one from the same participant is a conflict.
    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Every vote of an activation.
    fn list_votes(&self, activation_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>>;
    /// Record a scored answer; a second one from the same participant is a conflict.
    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Every scored answer of an activation.
    fn list_answers(
        &self,
        activation_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>>;
    /// Create a participant; an existing id is rejected with a conflict.
    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load a participant; `None` when it does not exist.
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Participants of a room, in no particular order.
    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Replace the player only if the stored revision still equals `expected_revision`.
    fn compare_and_swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection in place after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Key used by backends to express the one-response-per-participant constraint.
pub(crate) fn response_key(activation_id: Uuid, player_id: Uuid) -> String {
    format!("{activation_id}::{player_id}")
}
