use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for the MongoDB backend.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures raised by the MongoDB backend, each naming the operation.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required environment variable is missing.
    #[error("MongoDB room store needs `{var}` to be set")]
    MissingEnvVar { var: &'static str },
    /// The connection string did not parse.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// The driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// The server did not answer while connecting.
    #[error("MongoDB did not answer the initial ping")]
    InitialPing {
        #[source]
        source: MongoError,
    },
    /// A later health ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// An index could not be created.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// Upserting an activation failed.
    #[error("failed to save activation `{id}`")]
    SaveActivation {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Reading an activation failed.
    #[error("failed to load activation `{id}`")]
    LoadActivation {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Listing a room's activations failed.
    #[error("failed to list activations of room `{room_id}`")]
    ListActivations {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Inserting a vote or answer failed for a reason other than a duplicate.
    #[error("failed to insert {record} for activation `{activation_id}`")]
    InsertResponse {
        record: &'static str,
        activation_id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Listing an activation's votes or answers failed.
    #[error("failed to list {record}s of activation `{activation_id}`")]
    ListResponses {
        record: &'static str,
        activation_id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Writing a player failed.
    #[error("failed to insert player `{id}`")]
    SavePlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Reading a player failed.
    #[error("failed to load player `{id}`")]
    LoadPlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Listing a room's players failed.
    #[error("failed to list players of room `{room_id}`")]
    ListPlayers {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
}
