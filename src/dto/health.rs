use serde::Serialize;
use utoipa::ToSchema;

/// Result of probing the installed store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageStatus {
    /// The backend answered its health check.
    Reachable,
    /// No backend installed, or it failed its health check.
    Unreachable,
    /// No store installed yet (still connecting or given up).
    Absent,
}

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" or "degraded".
    pub status: String,
    /// Reachability of the storage backend.
    pub storage: StorageStatus,
}

impl HealthResponse {
    /// Build the payload, deriving `status` from the degraded flag.
    pub fn new(degraded: bool, storage: StorageStatus) -> Self {
        let status = if degraded { "degraded" } else { "ok" };
        Self {
            status: status.to_string(),
            storage,
        }
    }
}
