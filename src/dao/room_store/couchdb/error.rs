//! Failures raised by the CouchDB room store.

use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias for the CouchDB backend.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// What the store was doing when CouchDB failed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Checking that the database exists.
    ProbeDatabase,
    /// Creating the database on first start.
    CreateDatabase,
    /// Fetching one document.
    ReadDocument,
    /// Creating or replacing one document.
    WriteDocument,
    /// Listing documents by key prefix.
    ScanRoom,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::ProbeDatabase => "probe database",
            Action::CreateDatabase => "create database",
            Action::ReadDocument => "read document",
            Action::WriteDocument => "write document",
            Action::ScanRoom => "scan documents",
        })
    }
}

/// Failures raised while talking to CouchDB.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required environment variable is missing.
    #[error("CouchDB room store needs `{0}` to be set")]
    Unconfigured(&'static str),
    /// The HTTP client could not be built.
    #[error("could not build the CouchDB HTTP client")]
    Client(#[source] reqwest::Error),
    /// The request never got an answer.
    #[error("CouchDB unreachable during {action} `{target}`")]
    Unreachable {
        action: Action,
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with a status the store cannot work with.
    #[error("CouchDB answered {status} during {action} `{target}`")]
    Rejected {
        action: Action,
        target: String,
        status: StatusCode,
    },
    /// The response body did not decode as JSON.
    #[error("CouchDB sent an unreadable body for `{target}`")]
    UnreadableBody {
        target: String,
        #[source]
        source: reqwest::Error,
    },
    /// A stored document no longer matches the room record layout.
    #[error("CouchDB document under `{target}` is not a valid room record")]
    InvalidRecord {
        target: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CouchDaoError {
    pub(super) fn unreachable(action: Action, target: &str) -> impl FnOnce(reqwest::Error) -> Self {
        let target = target.to_string();
        move |source| Self::Unreachable {
            action,
            target,
            source,
        }
    }

    pub(super) fn rejected(action: Action, target: &str, status: StatusCode) -> Self {
        Self::Rejected {
            action,
            target: target.to_string(),
            status,
        }
    }
}
