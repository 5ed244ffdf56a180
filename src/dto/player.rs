use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerEntity,
    dto::{format_system_time, response::PlayerStatsDto, validation::validate_not_blank},
};

/// Registration of a participant in a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterPlayerRequest {
    /// Client-chosen identifier; generated when omitted.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Room the participant joins.
    #[validate(required)]
    pub room_id: Option<Uuid>,
    /// Display name.
    #[validate(custom(function = "validate_not_blank"), length(max = 64))]
    pub name: String,
}

/// Participant with its running score.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    /// Player identifier.
    pub id: Uuid,
    /// Room the participant belongs to.
    pub room_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Accumulated points.
    pub score: u64,
    /// Answer statistics.
    pub stats: PlayerStatsDto,
    /// RFC 3339 time of the last score change.
    pub updated_at: String,
}

impl From<PlayerEntity> for PlayerSummary {
    fn from(player: PlayerEntity) -> Self {
        Self {
            id: player.id,
            room_id: player.room_id,
            name: player.name,
            score: player.score,
            stats: player.stats.into(),
            updated_at: format_system_time(player.updated_at),
        }
    }
}

/// One row of a room leaderboard.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 1-based position; equal scores are ordered by name.
    pub rank: usize,
    /// Player identifier.
    pub player_id: Uuid,
    /// Display name.
    pub name: String,
    /// Accumulated points.
    pub score: u64,
    /// Answer statistics.
    pub stats: PlayerStatsDto,
}
