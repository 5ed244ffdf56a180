use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::dao::{
    models::{ActivationEntity, AnswerEntity, PlayerEntity, PollState, VoteEntity},
    room_store::{RoomStore, SwapOutcome, response_key},
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{Action, CouchDaoError, CouchResult},
    models::{
        ACTIVATION_PREFIX, ANSWER_PREFIX, AllDocsResponse, CouchDocument, END_SUFFIX,
        PLAYER_PREFIX, VOTE_PREFIX, activation_doc_id, answer_doc_id, player_doc_id,
        responses_prefix, vote_doc_id,
    },
};

const ALL_DOCS: &str = "_all_docs";

/// How CouchDB treated a PUT on a document id.
enum PutOutcome {
    Written,
    /// The id exists under another `_rev`.
    Conflict,
}

/// Room store keeping one JSON document per activation, player, vote and answer.
#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    config: Arc<CouchConfig>,
}

impl CouchRoomStore {
    /// Build the client and make sure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder().build().map_err(CouchDaoError::Client)?;
        let store = Self {
            client,
            config: Arc::new(config),
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.credentials {
            Some(credentials) => {
                builder.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => builder,
        }
    }

    /// Send a request against `path` inside the database (empty for the database itself).
    async fn send(
        &self,
        method: Method,
        path: &str,
        action: Action,
        shape: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> CouchResult<Response> {
        let mut url = self.config.database_url();
        if !path.is_empty() {
            url.push('/');
            url.push_str(path);
        }
        let target = if path.is_empty() {
            self.config.database.as_str()
        } else {
            path
        };
        shape(self.with_auth(self.client.request(method, url)))
            .send()
            .await
            .map_err(CouchDaoError::unreachable(action, target))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let probe = self
            .send(Method::GET, "", Action::ProbeDatabase, |b| b)
            .await?;
        match probe.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {}
            other => {
                return Err(CouchDaoError::rejected(
                    Action::ProbeDatabase,
                    &self.config.database,
                    other,
                ));
            }
        }

        let created = self
            .send(Method::PUT, "", Action::CreateDatabase, |b| b)
            .await?;
        // 412: another instance won the creation race.
        match created.status() {
            status if status.is_success() => Ok(()),
            StatusCode::PRECONDITION_FAILED => Ok(()),
            other => Err(CouchDaoError::rejected(
                Action::CreateDatabase,
                &self.config.database,
                other,
            )),
        }
    }

    async fn fetch<T>(&self, doc_id: &str) -> CouchResult<Option<CouchDocument<T>>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .send(Method::GET, doc_id, Action::ReadDocument, |b| b)
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response
                    .json::<CouchDocument<T>>()
                    .await
                    .map(Some)
                    .map_err(|source| CouchDaoError::UnreadableBody {
                        target: doc_id.to_string(),
                        source,
                    })
            }
            other => Err(CouchDaoError::rejected(Action::ReadDocument, doc_id, other)),
        }
    }

    async fn put<T>(&self, document: &CouchDocument<T>) -> CouchResult<PutOutcome>
    where
        T: Serialize,
    {
        let response = self
            .send(Method::PUT, &document.id, Action::WriteDocument, |b| {
                b.json(document)
            })
            .await?;
        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => Ok(PutOutcome::Written),
            other => Err(CouchDaoError::rejected(
                Action::WriteDocument,
                &document.id,
                other,
            )),
        }
    }

    /// Replace an activation document, carrying over its current `_rev`.
    async fn overwrite<T>(&self, mut document: CouchDocument<T>) -> CouchResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        document.rev = self
            .fetch::<T>(&document.id)
            .await?
            .and_then(|existing| existing.rev);
        match self.put(&document).await? {
            PutOutcome::Written => Ok(()),
            PutOutcome::Conflict => Err(CouchDaoError::rejected(
                Action::WriteDocument,
                &document.id,
                StatusCode::CONFLICT,
            )),
        }
    }

    /// Create a response or player document; an existing id means a duplicate.
    async fn create<T>(
        &self,
        document: CouchDocument<T>,
        record: &'static str,
        key: String,
    ) -> StorageResult<()>
    where
        T: Serialize,
    {
        match self.put(&document).await? {
            PutOutcome::Written => Ok(()),
            PutOutcome::Conflict => Err(StorageError::conflict(record, key)),
        }
    }

    /// Every document whose id starts with `prefix`, decoded as `T`.
    async fn scan<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let range = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{prefix}\"")),
            ("endkey", format!("\"{prefix}{END_SUFFIX}\"")),
        ];
        let response = self
            .send(Method::GET, ALL_DOCS, Action::ScanRoom, |b| b.query(&range))
            .await?;
        if !response.status().is_success() {
            return Err(CouchDaoError::rejected(
                Action::ScanRoom,
                prefix,
                response.status(),
            ));
        }

        let page: AllDocsResponse =
            response
                .json()
                .await
                .map_err(|source| CouchDaoError::UnreadableBody {
                    target: prefix.to_string(),
                    source,
                })?;

        page.rows
            .into_iter()
            .filter_map(|row| row.doc)
            .map(|doc| {
                serde_json::from_value::<CouchDocument<T>>(doc)
                    .map(|document| document.body)
                    .map_err(|source| CouchDaoError::InvalidRecord {
                        target: prefix.to_string(),
                        source,
                    })
            })
            .collect()
    }

    async fn swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> CouchResult<SwapOutcome> {
        let doc_id = activation_doc_id(activation.id);
        let current = match self.fetch::<ActivationEntity>(&doc_id).await? {
            Some(current) if current.body.poll_state == expected_state => current,
            _ => return Ok(SwapOutcome::Stale),
        };

        let next = CouchDocument {
            id: doc_id,
            rev: current.rev,
            body: activation,
        };
        Ok(match self.put(&next).await? {
            PutOutcome::Written => SwapOutcome::Applied,
            PutOutcome::Conflict => SwapOutcome::Stale,
        })
    }

    async fn swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> CouchResult<SwapOutcome> {
        let doc_id = player_doc_id(player.id);
        let current = match self.fetch::<PlayerEntity>(&doc_id).await? {
            Some(current) if current.body.revision == expected_revision => current,
            _ => return Ok(SwapOutcome::Stale),
        };

        // Writing against the fetched `_rev` fails with 409 if anyone wrote in between.
        let next = CouchDocument {
            id: doc_id,
            rev: current.rev,
            body: player,
        };
        Ok(match self.put(&next).await? {
            PutOutcome::Written => SwapOutcome::Applied,
            PutOutcome::Conflict => SwapOutcome::Stale,
        })
    }
}

impl RoomStore for CouchRoomStore {
    fn compare_and_swap_activation(
        &self,
        activation: ActivationEntity,
        expected_state: PollState,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .swap_activation(activation, expected_state)
                .await
                .map_err(Into::into)
        })
    }

    fn save_activation(
        &self,
        activation: ActivationEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = CouchDocument::new(activation_doc_id(activation.id), activation);
            store.overwrite(document).await.map_err(Into::into)
        })
    }

    fn find_activation(
        &self,
        id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<ActivationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .fetch::<ActivationEntity>(&activation_doc_id(id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn list_activations(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<ActivationEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut activations = store
                .scan::<ActivationEntity>(ACTIVATION_PREFIX)
                .await?;
            activations.retain(|activation| activation.room_id == room_id);
            activations.sort_by_key(|activation| activation.created_at);
            Ok(activations)
        })
    }

    fn insert_vote(&self, vote: VoteEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = response_key(vote.activation_id, vote.player_id);
            let document =
                CouchDocument::new(vote_doc_id(vote.activation_id, vote.player_id), vote);
            store.create(document, "vote", key).await
        })
    }

    fn list_votes(&self, activation_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<VoteEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut votes = store
                .scan::<VoteEntity>(&responses_prefix(VOTE_PREFIX, activation_id))
                .await?;
            votes.sort_by_key(|vote| vote.submitted_at);
            Ok(votes)
        })
    }

    fn insert_answer(&self, answer: AnswerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = response_key(answer.activation_id, answer.player_id);
            let document =
                CouchDocument::new(answer_doc_id(answer.activation_id, answer.player_id), answer);
            store.create(document, "answer", key).await
        })
    }

    fn list_answers(
        &self,
        activation_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<AnswerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut answers = store
                .scan::<AnswerEntity>(&responses_prefix(ANSWER_PREFIX, activation_id))
                .await?;
            answers.sort_by_key(|answer| answer.submitted_at);
            Ok(answers)
        })
    }

    fn insert_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let key = player.id.to_string();
            let document = CouchDocument::new(player_doc_id(player.id), player);
            store.create(document, "player", key).await
        })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document = store
                .fetch::<PlayerEntity>(&player_doc_id(id))
                .await?;
            Ok(document.map(|doc| doc.body))
        })
    }

    fn list_players(&self, room_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut players = store.scan::<PlayerEntity>(PLAYER_PREFIX).await?;
            players.retain(|player| player.room_id == Some(room_id));
            Ok(players)
        })
    }

    fn compare_and_swap_player(
        &self,
        player: PlayerEntity,
        expected_revision: u64,
    ) -> BoxFuture<'static, StorageResult<SwapOutcome>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .swap_player(player, expected_revision)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let response = store
                .send(Method::GET, "", Action::ProbeDatabase, |b| b)
                .await?;
            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::rejected(
                    Action::ProbeDatabase,
                    &store.config.database,
                    response.status(),
                )
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
