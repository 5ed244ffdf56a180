use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Kind of prompt an activation carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    /// Closed question answered by picking one option.
    MultipleChoice,
    /// Open question answered with free text.
    TextAnswer,
    /// Opinion poll without a correct answer.
    Poll,
}

/// Lifecycle flag gating whether an activation accepts responses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    /// Created but not yet opened by the operator.
    #[default]
    Pending,
    /// Responses are accepted.
    Voting,
    /// Responses are rejected; tallies are final.
    Closed,
}

/// Selectable option of a poll or multiple-choice activation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionEntity {
    /// Identity key of the option.
    pub id: String,
    /// Display key of the option.
    pub text: String,
}

/// One live question or poll instance within a room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivationEntity {
    /// Primary key of the activation.
    pub id: Uuid,
    /// Room the activation belongs to.
    pub room_id: Uuid,
    /// Prompt kind, deciding how responses are judged.
    pub kind: ActivationKind,
    /// Question or poll text shown to participants.
    pub prompt: String,
    /// Expected option for multiple-choice activations.
    pub correct_answer: Option<String>,
    /// Expected text for text-answer activations.
    pub exact_answer: Option<String>,
    /// Ordered options (poll and multiple-choice only).
    pub options: Vec<OptionEntity>,
    /// Current lifecycle state.
    pub poll_state: PollState,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the activation was updated.
    pub updated_at: SystemTime,
}

impl ActivationEntity {
    /// Look up an option by its identity key.
    pub fn option(&self, option_id: &str) -> Option<&OptionEntity> {
        self.options.iter().find(|option| option.id == option_id)
    }
}

/// A participant's vote on a poll or multiple-choice activation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteEntity {
    /// Activation voted on.
    pub activation_id: Uuid,
    /// Participant who voted.
    pub player_id: Uuid,
    /// Identity key of the chosen option.
    pub option_id: String,
    /// Display key of the chosen option, captured at vote time.
    pub option_text: String,
    /// Time the vote reached the server.
    pub submitted_at: SystemTime,
}

/// A participant's judged answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerEntity {
    /// Activation answered.
    pub activation_id: Uuid,
    /// Participant who answered.
    pub player_id: Uuid,
    /// Raw submitted answer, absent when the caller pre-judged correctness.
    pub answer: Option<String>,
    /// Whether the answer was judged correct.
    pub is_correct: bool,
    /// Points granted for this answer.
    pub points_awarded: u32,
    /// Response latency after clamping.
    pub time_taken_ms: u64,
    /// Time the answer reached the server.
    pub submitted_at: SystemTime,
}

/// Cumulative performance aggregate of a participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayerStatsEntity {
    /// Sum of awarded points.
    pub total_points: u64,
    /// Answers judged correct.
    pub correct_answers: u32,
    /// Answers recorded, correct or not.
    pub total_answers: u32,
    /// Running mean of the clamped response times.
    pub average_response_time_ms: f64,
}

/// Participant record owning the running score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerEntity {
    /// Stable identifier for the participant.
    pub id: Uuid,
    /// Room the participant joined, when known.
    pub room_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Running score, never decreasing.
    pub score: u64,
    /// Running statistics.
    pub stats: PlayerStatsEntity,
    /// Compare-and-swap token bumped on every stats write.
    pub revision: u64,
    /// Last time the player was updated.
    pub updated_at: SystemTime,
}

impl PlayerEntity {
    /// Fresh participant with zeroed statistics.
    pub fn new(id: Uuid, room_id: Option<Uuid>, name: String) -> Self {
        Self {
            id,
            room_id,
            name,
            score: 0,
            stats: PlayerStatsEntity::default(),
            revision: 0,
            updated_at: SystemTime::now(),
        }
    }
}
