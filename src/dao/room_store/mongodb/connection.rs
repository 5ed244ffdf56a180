use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// Upper bound on how long one connection attempt may wait for a reachable server.
/// Retrying is left to the storage supervisor.
const SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(3);

/// Build a client for `database_name` and confirm the deployment answers a ping.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let mut options = options.clone();
    options
        .server_selection_timeout
        .get_or_insert(SERVER_SELECTION_TIMEOUT);

    let client = Client::with_options(options)
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    database
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|source| MongoDaoError::InitialPing { source })?;
    debug!(database = database_name, "MongoDB answered the initial ping");

    Ok((client, database))
}
