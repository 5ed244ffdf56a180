use tokio::sync::broadcast;
use uuid::Uuid;

/// What changed on an activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityKind {
    /// A vote was accepted by the ledger.
    VoteCast {
        /// Participant who voted.
        player_id: Uuid,
        /// Identity key of the chosen option.
        option_id: String,
    },
    /// The operator moved the activation to another poll state.
    StateChanged,
}

/// Change notification fanned out to live poll sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    /// Activation the change applies to.
    pub activation_id: Uuid,
    /// What changed.
    pub kind: ActivityKind,
}

/// Broadcast hub carrying [`ActivityEvent`]s; delivery is best effort.
pub struct ActivityHub {
    sender: broadcast::Sender<ActivityEvent>,
}

impl ActivityHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn publish(&self, activation_id: Uuid, kind: ActivityKind) {
        let _ = self.sender.send(ActivityEvent {
            activation_id,
            kind,
        });
    }
}
