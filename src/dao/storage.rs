use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Summary of the backend failure.
        message: String,
        /// Backend error it was raised from.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A uniqueness constraint rejected the write.
    #[error("uniqueness constraint violated on {record} `{key}`")]
    Conflict {
        /// Kind of record, e.g. `vote`.
        record: &'static str,
        /// Key that already exists.
        key: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a conflict error for the given record kind and key.
    pub fn conflict(record: &'static str, key: impl Into<String>) -> Self {
        StorageError::Conflict {
            record,
            key: key.into(),
        }
    }

    /// Whether this error is the store's uniqueness signal.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::Conflict { .. })
    }
}
