//! Process-local [`RoomStore`] used for development runs and tests.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use thiserror::Error;
use uuid::Uuid;

use super::{RoomStore, SwapOutcome, response_key};
use crate::dao::{
    models::{ActivationEntity, AnswerEntity, PlayerEntity, PollState, VoteEntity},
    storage::{StorageError, StorageResult},
};

/// Failure reported while the store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct MemoryOffline;

#[derive(Default)]
struct MemoryInner {
    activations: DashMap<Uuid, ActivationEntity>,
    votes: DashMap<(Uuid, Uuid), VoteEntity>,
    answers: DashMap<(Uuid, Uuid), AnswerEntity>,
    players: DashMap<Uuid, PlayerEntity>,
    offline: AtomicBool,
}

/// DashMap-backed store; uniqueness is enforced through the map entry API.
#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

impl MemoryRoomStore {
    /// Empty store, online.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable backend: every call fails until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "in-memory store offline".into(),
                MemoryOffline,
            ))
        } else {
            Ok(())
        }
    }

    fn insert_vote_sync(&self, vote: VoteEntity) -> StorageResult<()> {
        self.ensure_online()?;
        match self.inner.votes.entry((vote.activation_id, vote.player_id)) {
            Entry::Occupied(_) => Err(StorageError::conflict(
                "vote",
                response_key(vote.activation_id, vote.player_id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(vote);
                Ok(())
            }
        }
    }

    fn insert_answer_sync(&self, answer: AnswerEntity) -> StorageResult<()> {
        self.ensure_online()?;
        match self
            .inner
            .answers
            .entry((answer.activation_id, answer.player_id))
        {
            Entry::Occupied(_) => Err(StorageError::conflict(
                "answer",
                response_key(answer.activation_id, answer.player_id),
            )),
            Entry::Vacant(slot) => {
                slot.insert(answer);
                Ok(())
            }
        }
    }

    fn swap_activation_sync(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> StorageResult<SwapOutcome> {
        self.ensure_online()?;
        let Some(mut current) = self.inner.activations.get_mut(&activation.id) else {
            return Ok(SwapOutcome::Stale);
        };
        if current.poll_state != expected_state {
            return Ok(SwapOutcome::Stale);
        }
        *current = activation;
        Ok(SwapOutcome::Applied)
    }

    fn compare_and_swap_sync(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> StorageResult<SwapOutcome> {
        self.ensure_online()?;
        let Some(mut current) = self.inner.players.get_mut(&player.id) else {
            return Ok(SwapOutcome::Stale);
        };
        if current.revision != expected_revision {
            return Ok(SwapOutcome::Stale);
        }
        *current = player;
        Ok(SwapOutcome::Applied)
    }
}

impl RoomStore for MemoryRoomStore {
    fn compare_and_swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.swap_activation_sync(activation, expected_state) })
    }

    fn save_activation(
        &self,
        activation: ActivationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.inner.activations.insert(activation.id, activation);
            Ok(())
        })
    }

    fn find_activation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ActivationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.activations.get(&id).map(|entry| entry.clone()))
        })
    }

    fn list_activations(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut activations: Vec<ActivationEntity> = store
                .inner
                .activations
                .iter()
                .filter(|entry| entry.room_id == room_id)
                .map(|entry| entry.clone())
                .collect();
            activations.sort_by_key(|activation| activation.created_at);
            Ok(activations)
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote_sync(vote) })
    }

    fn list_votes(&self, activation_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut votes: Vec<VoteEntity> = store
                .inner
                .votes
                .iter()
                .filter(|entry| entry.activation_id == activation_id)
                .map(|entry| entry.clone())
                .collect();
            votes.sort_by_key(|vote| vote.submitted_at);
            Ok(votes)
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_answer_sync(answer) })
    }

    fn list_answers(
        &self,
        activation_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut answers: Vec<AnswerEntity> = store
                .inner
                .answers
                .iter()
                .filter(|entry| entry.activation_id == activation_id)
                .map(|entry| entry.clone())
                .collect();
            answers.sort_by_key(|answer| answer.submitted_at);
            Ok(answers)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            match store.inner.players.entry(player.id) {
                Entry::Occupied(_) => Err(StorageError::conflict("player", player.id.to_string())),
                Entry::Vacant(slot) => {
                    slot.insert(player);
                    Ok(())
                }
            }
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.players.get(&id).map(|entry| entry.clone()))
        })
    }

    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store
                .inner
                .players
                .iter()
                .filter(|entry| entry.room_id == Some(room_id))
                .map(|entry| entry.clone())
                .collect())
        })
    }

    fn compare_and_swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move { store.compare_and_swap_sync(player, expected_revision) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}
