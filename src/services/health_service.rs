use tracing::warn;

use crate::{
    dto::health::{HealthResponse, StorageStatus},
    state::SharedState,
};

/// Probe the installed store and report it next to the supervisor's degraded flag.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.room_store().await {
        None => StorageStatus::Absent,
        Some(store) => match store.health_check().await {
            Ok(()) => StorageStatus::Reachable,
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                StorageStatus::Unreachable
            }
        },
    };

    HealthResponse::new(state.is_degraded().await, storage)
}
