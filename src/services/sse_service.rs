use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio_stream::{StreamExt, wrappers::WatchStream};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::poll::{PollSnapshotResponse, StreamMode},
    services::poll_aggregator::{PollSession, RefreshStrategy},
    state::SharedState,
};

const SNAPSHOT_EVENT: &str = "poll_snapshot";

/// Open a session-owned aggregator for `activation_id` and stream its snapshots.
///
/// The session lives inside the stream: when the client disconnects axum drops the stream,
/// which drops the session and aborts its refresh task.
pub fn poll_stream(
    state: SharedState,
    activation_id: Uuid,
    player_id: Uuid,
    mode: StreamMode,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let strategy = match mode {
        StreamMode::Interval => RefreshStrategy::Interval(state.config().refresh_interval()),
        StreamMode::Subscription => RefreshStrategy::Subscription,
    };
    let session = PollSession::spawn(state, Some(activation_id), player_id, strategy);
    info!(%activation_id, %player_id, ?mode, "poll stream opened");

    let stream = async_stream::stream! {
        let guard = StreamGuard { activation_id, player_id, session };
        let mut snapshots = WatchStream::new(guard.session.snapshots());
        while let Some(snapshot) = snapshots.next().await {
            match Event::default()
                .event(SNAPSHOT_EVENT)
                .json_data(PollSnapshotResponse::from(snapshot))
            {
                Ok(event) => yield Ok(event),
                Err(err) => warn!(error = %err, "failed to encode poll snapshot"),
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Keeps the session alive for the stream's lifetime and logs the teardown.
struct StreamGuard {
    activation_id: Uuid,
    player_id: Uuid,
    session: PollSession,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        info!(
            activation_id = %self.activation_id,
            player_id = %self.player_id,
            "poll stream closed"
        );
    }
}
