use std::cmp::Reverse;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::PlayerEntity,
    dto::player::{LeaderboardEntry, PlayerSummary, RegisterPlayerRequest},
    error::ServiceError,
    state::SharedState,
};

/// Register a participant; re-registering an existing id is a conflict.
pub async fn register_player(
    state: &SharedState,
    request: RegisterPlayerRequest,
) -> Result<PlayerSummary, ServiceError> {
    let room_id = request
        .room_id
        .ok_or_else(|| ServiceError::InvalidInput("missing field `roomId`".into()))?;
    let id = request.id.unwrap_or_else(Uuid::new_v4);
    let player = PlayerEntity::new(id, Some(room_id), request.name.trim().to_string());

    let store = state.require_room_store().await?;
    store.insert_player(player.clone()).await?;

    info!(player_id = %id, %room_id, "player registered");
    Ok(player.into())
}

/// Room leaderboard sorted by score, highest first.
pub async fn leaderboard(
    state: &SharedState,
    room_id: Uuid,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let store = state.require_room_store().await?;
    let mut players = store.list_players(room_id).await?;
    players.sort_by(|a, b| a.name.cmp(&b.name));
    // Stable, so equal scores keep the name order.
    players.sort_by_key(|player| Reverse(player.score));

    Ok(players
        .into_iter()
        .enumerate()
        .map(|(index, player)| LeaderboardEntry {
            rank: index + 1,
            player_id: player.id,
            name: player.name,
            score: player.score,
            stats: player.stats.into(),
        })
        .collect())
}
