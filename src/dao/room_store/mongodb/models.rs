use mongodb::bson::{DateTime, Document, Uuid as BsonUuid, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    ActivationEntity, ActivationKind, AnswerEntity, OptionEntity, PlayerEntity,
    PlayerStatsEntity, PollState, VoteEntity,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoActivationDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    room_id: BsonUuid,
    kind: ActivationKind,
    prompt: String,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    exact_answer: Option<String>,
    #[serde(default)]
    options: Vec<OptionEntity>,
    poll_state: PollState,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<ActivationEntity> for MongoActivationDocument {
    fn from(value: ActivationEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            room_id: to_bson_uuid(value.room_id),
            kind: value.kind,
            prompt: value.prompt,
            correct_answer: value.correct_answer,
            exact_answer: value.exact_answer,
            options: value.options,
            poll_state: value.poll_state,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoActivationDocument> for ActivationEntity {
    fn from(value: MongoActivationDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            room_id: from_bson_uuid(value.room_id),
            kind: value.kind,
            prompt: value.prompt,
            correct_answer: value.correct_answer,
            exact_answer: value.exact_answer,
            options: value.options,
            poll_state: value.poll_state,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoVoteDocument {
    activation_id: BsonUuid,
    player_id: BsonUuid,
    option_id: String,
    option_text: String,
    submitted_at: DateTime,
}

impl From<VoteEntity> for MongoVoteDocument {
    fn from(value: VoteEntity) -> Self {
        Self {
            activation_id: to_bson_uuid(value.activation_id),
            player_id: to_bson_uuid(value.player_id),
            option_id: value.option_id,
            option_text: value.option_text,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<MongoVoteDocument> for VoteEntity {
    fn from(value: MongoVoteDocument) -> Self {
        Self {
            activation_id: from_bson_uuid(value.activation_id),
            player_id: from_bson_uuid(value.player_id),
            option_id: value.option_id,
            option_text: value.option_text,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoAnswerDocument {
    activation_id: BsonUuid,
    player_id: BsonUuid,
    #[serde(default)]
    answer: Option<String>,
    is_correct: bool,
    points_awarded: i64,
    time_taken_ms: i64,
    submitted_at: DateTime,
}

impl From<AnswerEntity> for MongoAnswerDocument {
    fn from(value: AnswerEntity) -> Self {
        Self {
            activation_id: to_bson_uuid(value.activation_id),
            player_id: to_bson_uuid(value.player_id),
            answer: value.answer,
            is_correct: value.is_correct,
            points_awarded: i64::from(value.points_awarded),
            time_taken_ms: clamp_to_i64(value.time_taken_ms),
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl From<MongoAnswerDocument> for AnswerEntity {
    fn from(value: MongoAnswerDocument) -> Self {
        Self {
            activation_id: from_bson_uuid(value.activation_id),
            player_id: from_bson_uuid(value.player_id),
            answer: value.answer,
            is_correct: value.is_correct,
            points_awarded: u32::try_from(value.points_awarded.max(0)).unwrap_or(u32::MAX),
            time_taken_ms: value.time_taken_ms.max(0) as u64,
            submitted_at: value.submitted_at.to_system_time(),
        }
    }
}

/// Statistics sub-document; BSON has no unsigned 64-bit integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoStatsDocument {
    total_points: i64,
    correct_answers: i64,
    total_answers: i64,
    average_response_time_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    id: BsonUuid,
    #[serde(default)]
    room_id: Option<BsonUuid>,
    name: String,
    score: i64,
    stats: MongoStatsDocument,
    revision: i64,
    updated_at: DateTime,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: to_bson_uuid(value.id),
            room_id: value.room_id.map(to_bson_uuid),
            name: value.name,
            score: clamp_to_i64(value.score),
            stats: MongoStatsDocument {
                total_points: clamp_to_i64(value.stats.total_points),
                correct_answers: i64::from(value.stats.correct_answers),
                total_answers: i64::from(value.stats.total_answers),
                average_response_time_ms: value.stats.average_response_time_ms,
            },
            revision: clamp_to_i64(value.revision),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: from_bson_uuid(value.id),
            room_id: value.room_id.map(from_bson_uuid),
            name: value.name,
            score: value.score.max(0) as u64,
            stats: PlayerStatsEntity {
                total_points: value.stats.total_points.max(0) as u64,
                correct_answers: u32::try_from(value.stats.correct_answers.max(0))
                    .unwrap_or(u32::MAX),
                total_answers: u32::try_from(value.stats.total_answers.max(0))
                    .unwrap_or(u32::MAX),
                average_response_time_ms: value.stats.average_response_time_ms,
            },
            revision: value.revision.max(0) as u64,
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub fn to_bson_uuid(id: Uuid) -> BsonUuid {
    BsonUuid::from_bytes(id.into_bytes())
}

pub fn from_bson_uuid(id: BsonUuid) -> Uuid {
    Uuid::from_bytes(id.bytes())
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": to_bson_uuid(id)}
}

/// Filter matching an activation still in `state`, used for conditional transitions.
pub fn poll_state_filter(id: Uuid, state: PollState) -> Document {
    let state = match state {
        PollState::Pending => "pending",
        PollState::Voting => "voting",
        PollState::Closed => "closed",
    };
    doc! {"_id": to_bson_uuid(id), "poll_state": state}
}

/// Filter matching the stored revision of a player, used for compare-and-swap writes.
pub fn revision_filter(id: Uuid, revision: u64) -> Document {
    doc! {"_id": to_bson_uuid(id), "revision": clamp_to_i64(revision)}
}
