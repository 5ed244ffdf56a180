use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoActivationDocument, MongoAnswerDocument, MongoPlayerDocument, MongoVoteDocument,
        doc_id, poll_state_filter, revision_filter, to_bson_uuid,
    },
};
use crate::dao::{
    models::{ActivationEntity, AnswerEntity, PlayerEntity, PollState, VoteEntity},
    room_store::{RoomStore, SwapOutcome, response_key},
    storage::{StorageError, StorageResult},
};

const ACTIVATION_COLLECTION_NAME: &str = "activations";
const VOTE_COLLECTION_NAME: &str = "votes";
const ANSWER_COLLECTION_NAME: &str = "answers";
const PLAYER_COLLECTION_NAME: &str = "players";
/// Server error code reported when a unique index rejects a write.
const DUPLICATE_KEY_CODE: i32 = 11000;

/// MongoDB-backed [`RoomStore`](crate::dao::room_store::RoomStore).
#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        // One counted response per (activation, player) pair.
        for (collection, index_name) in [
            (VOTE_COLLECTION_NAME, "vote_unique_idx"),
            (ANSWER_COLLECTION_NAME, "answer_unique_idx"),
        ] {
            let index = IndexModel::builder()
                .keys(doc! {"activation_id": 1, "player_id": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(index_name.to_owned()))
                        .unique(Some(true))
                        .build(),
                )
                .build();
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: "activation_id,player_id",
                    source,
                })?;
        }

        for (collection, index_name) in [
            (ACTIVATION_COLLECTION_NAME, "activation_room_idx"),
            (PLAYER_COLLECTION_NAME, "player_room_idx"),
        ] {
            let index = IndexModel::builder()
                .keys(doc! {"room_id": 1})
                .options(
                    IndexOptions::builder()
                        .name(Some(index_name.to_owned()))
                        .build(),
                )
                .build();
            database
                .collection::<mongodb::bson::Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: "room_id",
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn activation_collection(&self) -> Collection<MongoActivationDocument> {
        self.database()
            .await
            .collection::<MongoActivationDocument>(ACTIVATION_COLLECTION_NAME)
    }

    async fn vote_collection(&self) -> Collection<MongoVoteDocument> {
        self.database()
            .await
            .collection::<MongoVoteDocument>(VOTE_COLLECTION_NAME)
    }

    async fn answer_collection(&self) -> Collection<MongoAnswerDocument> {
        self.database()
            .await
            .collection::<MongoAnswerDocument>(ANSWER_COLLECTION_NAME)
    }

    async fn player_collection(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYER_COLLECTION_NAME)
    }

    async fn save_activation(&self, activation: ActivationEntity) -> MongoResult<()> {
        let id = activation.id;
        let document: MongoActivationDocument = activation.into();
        self.activation_collection()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveActivation { id, source })?;
        Ok(())
    }

    /// Replace keyed on the previously read poll state.
    async fn compare_and_swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> MongoResult<SwapOutcome> {
        let id = activation.id;
        let document: MongoActivationDocument = activation.into();
        let result = self
            .activation_collection()
            .await
            .replace_one(poll_state_filter(id, expected_state), &document)
            .await
            .map_err(|source| MongoDaoError::SaveActivation { id, source })?;

        Ok(if result.matched_count == 1 {
            SwapOutcome::Applied
        } else {
            SwapOutcome::Stale
        })
    }

    async fn find_activation(&self, id: Uuid) -> MongoResult<Option<ActivationEntity>> {
        let document = self
            .activation_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadActivation { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_activations(&self, room_id: Uuid) -> MongoResult<Vec<ActivationEntity>> {
        let documents: Vec<MongoActivationDocument> = self
            .activation_collection()
            .await
            .find(doc! {"room_id": to_bson_uuid(room_id)})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListActivations { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListActivations { room_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_vote(&self, vote: VoteEntity) -> StorageResult<()> {
        let (activation_id, player_id) = (vote.activation_id, vote.player_id);
        let document: MongoVoteDocument = vote.into();
        match self.vote_collection().await.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::conflict(
                "vote",
                response_key(activation_id, player_id),
            )),
            Err(source) => Err(MongoDaoError::InsertResponse {
                record: "vote",
                activation_id,
                source,
            }
            .into()),
        }
    }

    async fn list_votes(&self, activation_id: Uuid) -> MongoResult<Vec<VoteEntity>> {
        let to_error = |source| MongoDaoError::ListResponses {
            record: "vote",
            activation_id,
            source,
        };
        let documents: Vec<MongoVoteDocument> = self
            .vote_collection()
            .await
            .find(doc! {"activation_id": to_bson_uuid(activation_id)})
            .sort(doc! {"submitted_at": 1})
            .await
            .map_err(to_error)?
            .try_collect()
            .await
            .map_err(to_error)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_answer(&self, answer: AnswerEntity) -> StorageResult<()> {
        let (activation_id, player_id) = (answer.activation_id, answer.player_id);
        let document: MongoAnswerDocument = answer.into();
        match self.answer_collection().await.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::conflict(
                "answer",
                response_key(activation_id, player_id),
            )),
            Err(source) => Err(MongoDaoError::InsertResponse {
                record: "answer",
                activation_id,
                source,
            }
            .into()),
        }
    }

    async fn list_answers(&self, activation_id: Uuid) -> MongoResult<Vec<AnswerEntity>> {
        let to_error = |source| MongoDaoError::ListResponses {
            record: "answer",
            activation_id,
            source,
        };
        let documents: Vec<MongoAnswerDocument> = self
            .answer_collection()
            .await
            .find(doc! {"activation_id": to_bson_uuid(activation_id)})
            .sort(doc! {"submitted_at": 1})
            .await
            .map_err(to_error)?
            .try_collect()
            .await
            .map_err(to_error)?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn insert_player(&self, player: PlayerEntity) -> StorageResult<()> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        match self.player_collection().await.insert_one(&document).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key(&err) => {
                Err(StorageError::conflict("player", id.to_string()))
            }
            Err(source) => Err(MongoDaoError::SavePlayer { id, source }.into()),
        }
    }

    async fn find_player(&self, id: Uuid) -> MongoResult<Option<PlayerEntity>> {
        let document = self
            .player_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_players(&self, room_id: Uuid) -> MongoResult<Vec<PlayerEntity>> {
        let documents: Vec<MongoPlayerDocument> = self
            .player_collection()
            .await
            .find(doc! {"room_id": to_bson_uuid(room_id)})
            .await
            .map_err(|source| MongoDaoError::ListPlayers { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPlayers { room_id, source })?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Conditional replace keyed on the previous revision; no match means a concurrent writer won.
    async fn compare_and_swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> MongoResult<SwapOutcome> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        let result = self
            .player_collection()
            .await
            .replace_one(revision_filter(id, expected_revision), &document)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { id, source })?;

        if result.matched_count == 1 {
            Ok(SwapOutcome::Applied)
        } else {
            Ok(SwapOutcome::Stale)
        }
    }
}

impl RoomStore for MongoRoomStore {
    fn compare_and_swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap_activation(activation, expected_state)
                .await
                .map_err(Into::into)
        })
    }

    fn save_activation(
        &self,
        activation: ActivationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_activation(activation).await.map_err(Into::into) })
    }

    fn find_activation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ActivationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_activation(id).await.map_err(Into::into) })
    }

    fn list_activations(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivationEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_activations(room_id).await.map_err(Into::into) })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_vote(vote).await })
    }

    fn list_votes(&self, activation_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_votes(activation_id).await.map_err(Into::into) })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_answer(answer).await })
    }

    fn list_answers(
        &self,
        activation_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_answers(activation_id).await.map_err(Into::into) })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_player(player).await })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player(id).await.map_err(Into::into) })
    }

    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players(room_id).await.map_err(Into::into) })
    }

    fn compare_and_swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .compare_and_swap_player(player, expected_revision)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
