//! Lifecycle rules for [`PollState`]: activations only ever move forward.

use thiserror::Error;

use crate::dao::models::PollState;

/// Error returned when an operator asks for a backwards or repeated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid transition: {from:?} cannot move to {to:?}")]
pub struct TransitionError {
    /// State the activation is currently in.
    pub from: PollState,
    /// State that was requested.
    pub to: PollState,
}

impl PollState {
    /// Whether votes and answers are accepted in this state.
    pub fn accepts_responses(self) -> bool {
        matches!(self, PollState::Voting)
    }

    fn rank(self) -> u8 {
        match self {
            PollState::Pending => 0,
            PollState::Voting => 1,
            PollState::Closed => 2,
        }
    }

    /// Validate a transition, returning the target state when it moves strictly forward.
    pub fn advance_to(self, to: PollState) -> Result<PollState, TransitionError> {
        if to.rank() > self.rank() {
            Ok(to)
        } else {
            Err(TransitionError { from: self, to })
        }
    }
}
