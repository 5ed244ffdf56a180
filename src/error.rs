use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    services::vote_ledger::VoteError,
    state::poll_state::TransitionError,
};

/// Failures of activation, vote and answer operations, before HTTP mapping.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A read or write against the room store failed.
    #[error("room store failure")]
    Unavailable(#[source] StorageError),
    /// No room store is installed yet, or it was uninstalled after an outage.
    #[error("room store not connected")]
    Degraded,
    /// The request is malformed or inconsistent with the activation.
    #[error("{0}")]
    InvalidInput(String),
    /// A participant already has a response (or record) under this key.
    #[error("{0}")]
    Conflict(String),
    /// The activation's poll state forbids the operation.
    #[error("{0}")]
    InvalidState(String),
    /// Unknown activation or player.
    #[error("{0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict { record, key } => {
                ServiceError::Conflict(format!("{record} `{key}` already recorded"))
            }
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<VoteError> for ServiceError {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::AlreadyVoted => {
                ServiceError::Conflict("already voted on this activation".into())
            }
            VoteError::VotingClosed(state) => ServiceError::InvalidState(format!(
                "activation is not accepting votes (state {state:?})"
            )),
            VoteError::InvalidOption(option_id) => {
                ServiceError::InvalidInput(format!("unknown option `{option_id}`"))
            }
            VoteError::ActivationNotFound(id) => {
                ServiceError::NotFound(format!("activation `{id}` not found"))
            }
            VoteError::Storage(source) => ServiceError::Unavailable(source),
        }
    }
}

impl From<TransitionError> for ServiceError {
    fn from(err: TransitionError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Handler failure rendered as `{"success": false, "message": ...}`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or inconsistent request.
    #[error("{0}")]
    BadRequest(String),
    /// Unknown activation or player.
    #[error("{0}")]
    NotFound(String),
    /// Duplicate response or a poll state that forbids the request.
    #[error("{0}")]
    Conflict(String),
    /// No storage backend is available.
    #[error("{0}")]
    Degraded(String),
    /// Persistence failed mid-request; details stay in the logs.
    #[error("{0}")]
    Persistence(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Degraded(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => {
                tracing::error!(error = %source, "room store operation failed");
                AppError::Persistence("failed to persist the response".into())
            }
            ServiceError::Degraded => {
                AppError::Degraded("room store is reconnecting; retry shortly".into())
            }
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) | ServiceError::InvalidState(message) => {
                AppError::Conflict(message)
            }
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct FailureBody {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = FailureBody {
            success: false,
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_vote_maps_to_conflict_with_distinct_message() {
        let app: AppError = ServiceError::from(VoteError::AlreadyVoted).into();
        match app {
            AppError::Conflict(message) => assert!(message.contains("already voted")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn storage_conflict_is_not_a_persistence_failure() {
        let err: ServiceError = StorageError::conflict("answer", "a::b").into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn persistence_failure_is_internal_error() {
        let source = std::io::Error::other("boom");
        let err: ServiceError = StorageError::unavailable("write failed".into(), source).into();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
