//! Test store forcing the interleavings that concurrent writers would produce.

use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};

use futures::future::BoxFuture;
use uuid::Uuid;

use super::{RoomStore, SwapOutcome, memory::MemoryRoomStore};
use crate::dao::{
    models::{ActivationEntity, AnswerEntity, PlayerEntity, PollState, VoteEntity},
    storage::StorageResult,
};

/// Delegates to a [`MemoryRoomStore`] except for scripted stale reads and lost swaps.
pub(crate) struct ScriptedStore {
    inner: MemoryRoomStore,
    lost_player_swaps: AtomicUsize,
    stale_activation: Mutex<Option<ActivationEntity>>,
}

impl ScriptedStore {
    pub(crate) fn new(inner: MemoryRoomStore) -> Self {
        Self {
            inner,
            lost_player_swaps: AtomicUsize::new(0),
            stale_activation: Mutex::new(None),
        }
    }

    /// Report the next `count` player swaps as stale without writing.
    pub(crate) fn lose_player_swaps(&self, count: usize) {
        self.lost_player_swaps.store(count, Ordering::SeqCst);
    }

    /// Serve `snapshot` to the next `find_activation` for its id, as a reader racing a
    /// concurrent write would see it.
    pub(crate) fn serve_stale_activation(&self, snapshot: ActivationEntity) {
        if let Ok(mut slot) = self.stale_activation.lock() {
            *slot = Some(snapshot);
        }
    }

    fn take_stale_activation(&self, id: Uuid) -> Option<ActivationEntity> {
        let mut slot = self.stale_activation.lock().ok()?;
        if slot.as_ref().is_some_and(|activation| activation.id == id) {
            slot.take()
        } else {
            None
        }
    }

    fn swap_lost(&self) -> bool {
        self.lost_player_swaps
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

impl RoomStore for ScriptedStore {
    fn save_activation(
        &self,
        activation: ActivationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_activation(activation)
    }

    fn compare_and_swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        self.inner
            .compare_and_swap_activation(activation, expected_state)
    }

    fn find_activation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ActivationEntity>>> {
        match self.take_stale_activation(id) {
            Some(stale) => Box::pin(async move { Ok(Some(stale)) }),
            None => self.inner.find_activation(id),
        }
    }

    fn list_activations(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivationEntity>>> {
        self.inner.list_activations(room_id)
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_vote(vote)
    }

    fn list_votes(&self, activation_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        self.inner.list_votes(activation_id)
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_answer(answer)
    }

    fn list_answers(
        &self,
        activation_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        self.inner.list_answers(activation_id)
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.insert_player(player)
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        self.inner.find_player(id)
    }

    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        self.inner.list_players(room_id)
    }

    fn compare_and_swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        if self.swap_lost() {
            return Box::pin(async { Ok(SwapOutcome::Stale) });
        }
        self.inner.compare_and_swap_player(player, expected_revision)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}
