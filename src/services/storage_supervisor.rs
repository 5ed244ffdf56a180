use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    state::SharedState,
};

/// Timing knobs of the supervisor loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorPolicy {
    /// First backoff delay between connection attempts.
    pub initial_delay: Duration,
    /// Ceiling of the doubling backoff.
    pub max_delay: Duration,
    /// Cadence of health checks once connected.
    pub health_poll_interval: Duration,
    /// In-place reconnects tried before the store is uninstalled.
    pub max_reconnect_attempts: u32,
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_secs(10),
            health_poll_interval: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

impl SupervisorPolicy {
    fn backoff(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }
}

/// Connect the room store, install it into the shared state and keep it healthy.
///
/// While the store is unreachable the state stays in degraded mode and requests fail fast
/// with `503`. After `max_reconnect_attempts` failed in-place reconnects the store is
/// uninstalled and a fresh connection is attempted.
pub async fn run<F, Fut>(state: SharedState, policy: SupervisorPolicy, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = policy.initial_delay;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_room_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = policy.initial_delay;

                monitor(&state, &policy, store.as_ref()).await;

                state.clear_room_store().await;
                warn!("exhausted storage reconnect attempts; reconnecting from scratch");
                sleep(delay).await;
                delay = policy.backoff(delay);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = policy.backoff(delay);
            }
        }
    }
}

/// Health-check `store` until in-place reconnection gives up.
async fn monitor(state: &SharedState, policy: &SupervisorPolicy, store: &dyn RoomStore) {
    loop {
        if let Err(err) = store.health_check().await {
            warn!(error = %err, "storage health check failed; entering degraded mode");
            state.update_degraded(true).await;
            if !reconnect(policy, store).await {
                return;
            }
        }

        if state.is_degraded().await {
            info!("storage healthy again; leaving degraded mode");
            state.update_degraded(false).await;
        }
        sleep(policy.health_poll_interval).await;
    }
}

async fn reconnect(policy: &SupervisorPolicy, store: &dyn RoomStore) -> bool {
    let mut delay = policy.initial_delay;
    for attempt in 1..=policy.max_reconnect_attempts {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                sleep(delay).await;
                delay = policy.backoff(delay);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;
    use crate::{config::AppConfig, dao::room_store::memory::MemoryRoomStore, state::AppState};

    fn fast_policy() -> SupervisorPolicy {
        SupervisorPolicy {
            initial_delay: Duration::from_millis(5),
            max_delay: Duration::from_millis(20),
            health_poll_interval: Duration::from_millis(5),
            max_reconnect_attempts: 2,
        }
    }

    async fn wait_for_degraded(state: &SharedState, expected: bool) {
        let mut watcher = state.degraded_watcher();
        timeout(
            Duration::from_secs(2),
            watcher.wait_for(|degraded| *degraded == expected),
        )
        .await
        .expect("degraded flag within timeout")
        .unwrap();
    }

    #[tokio::test]
    async fn installs_store_and_tracks_outages() {
        let store = MemoryRoomStore::new();
        let state = AppState::new(AppConfig::default());
        assert!(state.is_degraded().await);

        let handle = {
            let store = store.clone();
            tokio::spawn(run(state.clone(), fast_policy(), move || {
                let store = store.clone();
                async move {
                    store.health_check().await?;
                    Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
                }
            }))
        };

        wait_for_degraded(&state, false).await;
        assert!(state.room_store().await.is_some());

        store.set_offline(true);
        wait_for_degraded(&state, true).await;

        store.set_offline(false);
        wait_for_degraded(&state, false).await;

        handle.abort();
    }
}
