//! Session-side poll view: an authoritative layer re-read from the store plus a provisional
//! overlay for the participant's own not-yet-confirmed vote.

use std::{sync::Arc, time::Duration};

use indexmap::IndexMap;
use tokio::{
    sync::{
        Mutex,
        broadcast::{self, error::RecvError},
        watch,
    },
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{OptionEntity, PollState},
        room_store::RoomStore,
        storage::StorageResult,
    },
    state::{ActivityEvent, ActivityKind, SharedState},
};

/// Consistent view of one activation for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollSnapshot {
    /// Activation being aggregated, if any.
    pub activation_id: Option<Uuid>,
    /// Votes per option identity key, in option order.
    pub tally_by_option: IndexMap<String, u64>,
    /// Votes per option display key, in option order.
    pub tally_by_option_text: IndexMap<String, u64>,
    /// Always the sum of [`PollSnapshot::tally_by_option_text`].
    pub total_votes: u64,
    /// Whether the session's participant has voted, provisionally or not.
    pub has_voted: bool,
    /// Option the participant picked.
    pub selected_option_id: Option<String>,
    /// Lifecycle state as last read from the store.
    pub poll_state: PollState,
}

#[derive(Debug, Clone, Default)]
struct AuthoritativeLayer {
    options: Vec<OptionEntity>,
    tally_by_option: IndexMap<String, u64>,
    tally_by_option_text: IndexMap<String, u64>,
    own_vote: Option<String>,
    poll_state: PollState,
}

#[derive(Debug, Clone)]
struct ProvisionalVote {
    option_id: String,
    option_text: String,
}

/// Recomputes tallies from the vote ledger and publishes snapshots on a watch channel.
pub struct PollAggregator {
    player_id: Uuid,
    activation_id: Option<Uuid>,
    authoritative: AuthoritativeLayer,
    overlay: Option<ProvisionalVote>,
    publisher: watch::Sender<PollSnapshot>,
}

impl PollAggregator {
    /// Empty aggregator for `player_id`, optionally bound to an activation.
    pub fn new(player_id: Uuid, activation_id: Option<Uuid>) -> Self {
        let (publisher, _rx) = watch::channel(PollSnapshot {
            activation_id,
            ..PollSnapshot::default()
        });
        Self {
            player_id,
            activation_id,
            authoritative: AuthoritativeLayer::default(),
            overlay: None,
            publisher,
        }
    }

    /// Activation currently tracked, if any.
    pub fn activation_id(&self) -> Option<Uuid> {
        self.activation_id
    }

    /// Participant whose own vote status is tracked.
    pub fn player_id(&self) -> Uuid {
        self.player_id
    }

    /// Receiver observing every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<PollSnapshot> {
        self.publisher.subscribe()
    }

    /// Merge the overlay into the authoritative layer.
    pub fn snapshot(&self) -> PollSnapshot {
        let layer = &self.authoritative;
        let mut tally_by_option = layer.tally_by_option.clone();
        let mut tally_by_option_text = layer.tally_by_option_text.clone();
        let mut selected_option_id = layer.own_vote.clone();

        if let Some(local) = &self.overlay {
            *tally_by_option.entry(local.option_id.clone()).or_default() += 1;
            *tally_by_option_text
                .entry(local.option_text.clone())
                .or_default() += 1;
            selected_option_id = Some(local.option_id.clone());
        }

        let total_votes = tally_by_option_text.values().sum();
        PollSnapshot {
            activation_id: self.activation_id,
            tally_by_option,
            tally_by_option_text,
            total_votes,
            has_voted: selected_option_id.is_some(),
            selected_option_id,
            poll_state: layer.poll_state,
        }
    }

    /// Switch to another activation (or none), resetting to an empty pending snapshot.
    pub fn set_activation(&mut self, activation_id: Option<Uuid>) {
        self.activation_id = activation_id;
        self.authoritative = AuthoritativeLayer::default();
        self.overlay = None;
        self.publish();
    }

    /// Optimistically count the participant's own vote until the next refresh.
    ///
    /// Ignored when the participant already voted or the option is unknown.
    pub fn record_local_vote(&mut self, option_id: &str) -> bool {
        if self.authoritative.own_vote.is_some() || self.overlay.is_some() {
            return false;
        }
        let Some(option) = self
            .authoritative
            .options
            .iter()
            .find(|option| option.id == option_id)
        else {
            return false;
        };

        self.overlay = Some(ProvisionalVote {
            option_id: option.id.clone(),
            option_text: option.text.clone(),
        });
        self.publish();
        true
    }

    /// Re-read the activation and its votes, replacing the authoritative layer and dropping the
    /// overlay. Failures are logged and leave the current view untouched.
    pub async fn resync(&mut self, store: &dyn RoomStore) -> bool {
        match self.try_resync(store).await {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    activation_id = ?self.activation_id,
                    error = %err,
                    "poll refresh failed; keeping previous snapshot"
                );
                false
            }
        }
    }

    /// Like [`PollAggregator::resync`] but surfaces read failures. Returns whether the
    /// activation still exists.
    pub async fn try_resync(&mut self, store: &dyn RoomStore) -> StorageResult<bool> {
        let Some(activation_id) = self.activation_id else {
            return Ok(false);
        };

        let Some(activation) = store.find_activation(activation_id).await? else {
            self.authoritative = AuthoritativeLayer::default();
            self.overlay = None;
            self.publish();
            return Ok(false);
        };
        let votes = store.list_votes(activation_id).await?;

        // Seed every option so zero-vote options keep their position.
        let mut tally_by_option: IndexMap<String, u64> = activation
            .options
            .iter()
            .map(|option| (option.id.clone(), 0))
            .collect();
        let mut tally_by_option_text: IndexMap<String, u64> = activation
            .options
            .iter()
            .map(|option| (option.text.clone(), 0))
            .collect();
        let mut own_vote = None;

        for vote in votes {
            *tally_by_option.entry(vote.option_id.clone()).or_default() += 1;
            *tally_by_option_text.entry(vote.option_text).or_default() += 1;
            if vote.player_id == self.player_id {
                own_vote = Some(vote.option_id);
            }
        }

        self.authoritative = AuthoritativeLayer {
            options: activation.options,
            tally_by_option,
            tally_by_option_text,
            own_vote,
            poll_state: activation.poll_state,
        };
        self.overlay = None;
        self.publish();
        Ok(true)
    }

    fn publish(&self) {
        self.publisher.send_replace(self.snapshot());
    }
}

/// What drives a session's refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStrategy {
    /// Resynchronize on a fixed cadence.
    Interval(Duration),
    /// Resynchronize whenever the activity hub reports a change on the activation.
    Subscription,
}

/// A participant session owning a [`PollAggregator`] and its refresh task.
///
/// Dropping the session aborts the task, so no refresh outlives its owner.
pub struct PollSession {
    aggregator: Arc<Mutex<PollAggregator>>,
    snapshots: watch::Receiver<PollSnapshot>,
    task: JoinHandle<()>,
}

impl PollSession {
    /// Spawn the refresh loop for `activation_id` as seen by `player_id`.
    ///
    /// Both strategies also listen to the activity hub so the participant's own accepted vote
    /// shows up in the overlay before the next store read.
    pub fn spawn(
        state: SharedState,
        activation_id: Option<Uuid>,
        player_id: Uuid,
        strategy: RefreshStrategy,
    ) -> Self {
        let aggregator = PollAggregator::new(player_id, activation_id);
        let snapshots = aggregator.subscribe();
        let aggregator = Arc::new(Mutex::new(aggregator));
        // Subscribed before spawning so no event published after `spawn` returns is missed.
        let events = state.activity().subscribe();

        let task = match strategy {
            RefreshStrategy::Interval(period) => {
                tokio::spawn(run_interval(state, aggregator.clone(), events, period))
            }
            RefreshStrategy::Subscription => {
                tokio::spawn(run_subscription(state, aggregator.clone(), events))
            }
        };

        Self {
            aggregator,
            snapshots,
            task,
        }
    }

    /// Receiver yielding each new snapshot.
    pub fn snapshots(&self) -> watch::Receiver<PollSnapshot> {
        self.snapshots.clone()
    }

    /// Whether the refresh task is still running.
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for PollSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh(state: &SharedState, aggregator: &Mutex<PollAggregator>) {
    let Some(store) = state.room_store().await else {
        debug!("poll refresh skipped: storage unavailable (degraded mode)");
        return;
    };
    aggregator.lock().await.resync(store.as_ref()).await;
}

/// Put the session participant's own accepted vote into the overlay.
async fn apply_own_vote(aggregator: &Mutex<PollAggregator>, event: &ActivityEvent) -> bool {
    let ActivityKind::VoteCast {
        player_id,
        option_id,
    } = &event.kind
    else {
        return false;
    };
    let mut aggregator = aggregator.lock().await;
    if aggregator.activation_id() != Some(event.activation_id)
        || aggregator.player_id() != *player_id
    {
        return false;
    }
    aggregator.record_local_vote(option_id)
}

async fn run_interval(
    state: SharedState,
    aggregator: Arc<Mutex<PollAggregator>>,
    mut events: broadcast::Receiver<ActivityEvent>,
    period: Duration,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut listening = true;
    loop {
        tokio::select! {
            _ = ticker.tick() => refresh(&state, &aggregator).await,
            received = events.recv(), if listening => match received {
                Ok(event) => {
                    if apply_own_vote(&aggregator, &event).await {
                        debug!(activation_id = %event.activation_id, "own vote shown before refresh");
                    }
                }
                // A missed own vote shows up on the next tick.
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => listening = false,
            },
        }
    }
}

async fn run_subscription(
    state: SharedState,
    aggregator: Arc<Mutex<PollAggregator>>,
    mut events: broadcast::Receiver<ActivityEvent>,
) {
    refresh(&state, &aggregator).await;

    loop {
        match events.recv().await {
            Ok(event) => {
                let current = aggregator.lock().await.activation_id();
                if current == Some(event.activation_id) {
                    apply_own_vote(&aggregator, &event).await;
                    refresh(&state, &aggregator).await;
                }
            }
            // Missed notifications are covered by a full re-read.
            Err(RecvError::Lagged(_)) => refresh(&state, &aggregator).await,
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{ActivationEntity, ActivationKind, VoteEntity},
            room_store::memory::MemoryRoomStore,
        },
        state::AppState,
    };

    fn activation() -> ActivationEntity {
        ActivationEntity {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            kind: ActivationKind::Poll,
            prompt: "Best season?".into(),
            correct_answer: None,
            exact_answer: None,
            options: ["Spring", "Summer", "Autumn"]
                .iter()
                .enumerate()
                .map(|(index, text)| OptionEntity {
                    id: format!("o{index}"),
                    text: text.to_string(),
                })
                .collect(),
            poll_state: PollState::Voting,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    async fn vote(store: &MemoryRoomStore, activation: &ActivationEntity, player: Uuid, idx: usize) {
        let option = &activation.options[idx];
        store
            .insert_vote(VoteEntity {
                activation_id: activation.id,
                player_id: player,
                option_id: option.id.clone(),
                option_text: option.text.clone(),
                submitted_at: SystemTime::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn resync_counts_votes_and_own_selection() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        let me = Uuid::new_v4();
        vote(&store, &poll, me, 1).await;
        vote(&store, &poll, Uuid::new_v4(), 1).await;
        vote(&store, &poll, Uuid::new_v4(), 0).await;

        let mut aggregator = PollAggregator::new(me, Some(poll.id));
        assert!(aggregator.resync(&store).await);
        let snapshot = aggregator.snapshot();

        assert_eq!(snapshot.tally_by_option["o0"], 1);
        assert_eq!(snapshot.tally_by_option["o1"], 2);
        assert_eq!(snapshot.tally_by_option["o2"], 0);
        assert_eq!(snapshot.tally_by_option_text["Summer"], 2);
        assert_eq!(snapshot.total_votes, 3);
        assert!(snapshot.has_voted);
        assert_eq!(snapshot.selected_option_id.as_deref(), Some("o1"));
        assert_eq!(snapshot.poll_state, PollState::Voting);
        assert_eq!(
            snapshot.tally_by_option.keys().collect::<Vec<_>>(),
            vec!["o0", "o1", "o2"]
        );
    }

    #[tokio::test]
    async fn total_votes_is_the_sum_of_the_display_tally() {
        let store = MemoryRoomStore::new();
        let mut poll = activation();
        // Two options sharing a display text collapse into one display bucket.
        poll.options[2].text = "Summer".into();
        store.save_activation(poll.clone()).await.unwrap();
        for idx in [0, 1, 2, 2, 1] {
            vote(&store, &poll, Uuid::new_v4(), idx).await;
        }

        let mut aggregator = PollAggregator::new(Uuid::new_v4(), Some(poll.id));
        aggregator.resync(&store).await;
        let snapshot = aggregator.snapshot();

        assert_eq!(
            snapshot.total_votes,
            snapshot.tally_by_option_text.values().sum::<u64>()
        );
        assert_eq!(snapshot.total_votes, 5);
        assert_eq!(snapshot.tally_by_option_text["Summer"], 4);
        assert_eq!(snapshot.tally_by_option.len(), 3);
    }

    #[tokio::test]
    async fn overlay_is_visible_immediately_and_replaced_on_refresh() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        let me = Uuid::new_v4();

        let mut aggregator = PollAggregator::new(me, Some(poll.id));
        aggregator.resync(&store).await;
        assert!(aggregator.record_local_vote("o2"));
        assert!(!aggregator.record_local_vote("o0"));

        let optimistic = aggregator.snapshot();
        assert!(optimistic.has_voted);
        assert_eq!(optimistic.tally_by_option["o2"], 1);
        assert_eq!(optimistic.total_votes, 1);

        // The submission lost (say, rejected by the server): refresh drops the overlay.
        aggregator.resync(&store).await;
        let refreshed = aggregator.snapshot();
        assert!(!refreshed.has_voted);
        assert_eq!(refreshed.total_votes, 0);

        // Once the vote lands, refresh counts it exactly once.
        assert!(aggregator.record_local_vote("o2"));
        vote(&store, &poll, me, 2).await;
        aggregator.resync(&store).await;
        let confirmed = aggregator.snapshot();
        assert_eq!(confirmed.tally_by_option["o2"], 1);
        assert_eq!(confirmed.total_votes, 1);
        assert_eq!(confirmed.selected_option_id.as_deref(), Some("o2"));
    }

    #[tokio::test]
    async fn read_failure_keeps_previous_snapshot() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        vote(&store, &poll, Uuid::new_v4(), 0).await;

        let mut aggregator = PollAggregator::new(Uuid::new_v4(), Some(poll.id));
        aggregator.resync(&store).await;
        let before = aggregator.snapshot();

        store.set_offline(true);
        assert!(!aggregator.resync(&store).await);
        assert_eq!(aggregator.snapshot(), before);
    }

    #[tokio::test]
    async fn changing_activation_resets_to_empty_pending() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        vote(&store, &poll, Uuid::new_v4(), 0).await;

        let mut aggregator = PollAggregator::new(Uuid::new_v4(), Some(poll.id));
        aggregator.resync(&store).await;
        aggregator.set_activation(None);

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.activation_id, None);
        assert!(snapshot.tally_by_option.is_empty());
        assert_eq!(snapshot.total_votes, 0);
        assert_eq!(snapshot.poll_state, PollState::Pending);
        assert!(aggregator.resync(&store).await);
        assert_eq!(aggregator.snapshot().total_votes, 0);
    }

    #[tokio::test]
    async fn subscription_session_refreshes_on_activity() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;

        let session = PollSession::spawn(
            state.clone(),
            Some(poll.id),
            Uuid::new_v4(),
            RefreshStrategy::Subscription,
        );
        let mut snapshots = session.snapshots();

        vote(&store, &poll, Uuid::new_v4(), 1).await;
        state.activity().publish(poll.id, ActivityKind::StateChanged);

        let snapshot = time::timeout(
            Duration::from_secs(2),
            snapshots.wait_for(|snapshot| snapshot.total_votes == 1),
        )
        .await
        .expect("snapshot within timeout")
        .unwrap()
        .clone();
        assert_eq!(snapshot.tally_by_option["o1"], 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_session_picks_up_votes_on_the_next_tick() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;

        let session = PollSession::spawn(
            state,
            Some(poll.id),
            Uuid::new_v4(),
            RefreshStrategy::Interval(Duration::from_secs(2)),
        );
        let mut snapshots = session.snapshots();
        // The first tick fires immediately.
        time::timeout(
            Duration::from_millis(500),
            snapshots.wait_for(|snapshot| snapshot.poll_state == PollState::Voting),
        )
        .await
        .expect("initial refresh")
        .unwrap();

        // Written straight to the store: no notification, only the ticker can see it.
        vote(&store, &poll, Uuid::new_v4(), 2).await;
        assert_eq!(snapshots.borrow().total_votes, 0);

        let snapshot = time::timeout(
            Duration::from_secs(3),
            snapshots.wait_for(|snapshot| snapshot.total_votes == 1),
        )
        .await
        .expect("refresh on the second tick")
        .unwrap()
        .clone();
        assert_eq!(snapshot.tally_by_option_text["Autumn"], 1);
        assert!(!snapshot.has_voted);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_session_shows_own_vote_before_the_next_tick() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        let me = Uuid::new_v4();

        let session = PollSession::spawn(
            state.clone(),
            Some(poll.id),
            me,
            RefreshStrategy::Interval(Duration::from_secs(60)),
        );
        let mut snapshots = session.snapshots();
        time::timeout(
            Duration::from_millis(500),
            snapshots.wait_for(|snapshot| snapshot.poll_state == PollState::Voting),
        )
        .await
        .expect("initial refresh")
        .unwrap();

        // Someone else's vote only reaches the overlay path, which ignores it.
        state.activity().publish(
            poll.id,
            ActivityKind::VoteCast {
                player_id: Uuid::new_v4(),
                option_id: "o0".into(),
            },
        );
        crate::services::vote_ledger::cast_vote(&store, state.activity(), poll.id, me, "o1")
            .await
            .unwrap();

        let snapshot = time::timeout(
            Duration::from_secs(1),
            snapshots.wait_for(|snapshot| snapshot.has_voted),
        )
        .await
        .expect("own vote well before the 60s tick")
        .unwrap()
        .clone();
        assert_eq!(snapshot.selected_option_id.as_deref(), Some("o1"));
        assert_eq!(snapshot.total_votes, 1);
        assert_eq!(snapshot.tally_by_option["o0"], 0);
    }

    #[tokio::test]
    async fn subscription_session_confirms_own_vote() {
        let store = MemoryRoomStore::new();
        let poll = activation();
        store.save_activation(poll.clone()).await.unwrap();
        let state = AppState::with_store(AppConfig::default(), Arc::new(store.clone())).await;
        let me = Uuid::new_v4();

        let session = PollSession::spawn(
            state.clone(),
            Some(poll.id),
            me,
            RefreshStrategy::Subscription,
        );
        let mut snapshots = session.snapshots();
        crate::services::vote_ledger::cast_vote(&store, state.activity(), poll.id, me, "o2")
            .await
            .unwrap();
        vote(&store, &poll, Uuid::new_v4(), 2).await;
        state.activity().publish(poll.id, ActivityKind::StateChanged);

        let snapshot = time::timeout(
            Duration::from_secs(2),
            snapshots.wait_for(|snapshot| snapshot.total_votes == 2),
        )
        .await
        .expect("refreshed snapshot")
        .unwrap()
        .clone();
        assert_eq!(snapshot.selected_option_id.as_deref(), Some("o2"));
        assert_eq!(snapshot.tally_by_option["o2"], 2);
    }

    #[tokio::test]
    async fn dropping_the_session_stops_the_refresh_task() {
        let state = AppState::with_store(
            AppConfig::default(),
            Arc::new(MemoryRoomStore::new()),
        )
        .await;
        let session = PollSession::spawn(
            state,
            None,
            Uuid::new_v4(),
            RefreshStrategy::Interval(Duration::from_millis(10)),
        );
        let mut snapshots = session.snapshots();
        assert!(session.is_running());

        drop(session);
        // The publisher lives inside the aborted task's aggregator, so the channel closes.
        let closed = time::timeout(Duration::from_secs(2), async {
            while snapshots.changed().await.is_ok() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
