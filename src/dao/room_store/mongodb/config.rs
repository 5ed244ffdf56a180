use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const DEFAULT_DATABASE: &str = "live_poll";

/// Parsed driver options plus the database holding the room collections.
#[derive(Clone)]
pub struct MongoConfig {
    /// Driver options parsed from `MONGO_URI`.
    pub options: ClientOptions,
    /// Database holding the room collections.
    pub database_name: String,
}

impl MongoConfig {
    /// Read `MONGO_URI` (required) and `MONGO_DB` (defaults to `live_poll`).
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("MONGO_URI")
            .ok()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(MongoDaoError::MissingEnvVar { var: "MONGO_URI" })?;
        let database_name = std::env::var("MONGO_DB")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let parsed = ClientOptions::parse(uri.as_str()).await;
        let options = parsed.map_err(|source| MongoDaoError::InvalidUri { uri, source })?;
        Ok(Self {
            options,
            database_name,
        })
    }
}
