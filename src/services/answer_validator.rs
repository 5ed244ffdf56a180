use crate::dao::models::{ActivationEntity, ActivationKind};

/// Judgement passed on a submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerVerdict {
    /// Matches the key answer.
    Correct,
    /// Does not match.
    Incorrect,
    /// Polls carry no correctness notion and never reach the scoring engine.
    Unscored,
}

impl AnswerVerdict {
    /// Boolean view used by scoring: anything but [`AnswerVerdict::Correct`] is wrong.
    pub fn is_correct(self) -> bool {
        matches!(self, AnswerVerdict::Correct)
    }

    fn from_match(matched: bool) -> Self {
        if matched {
            AnswerVerdict::Correct
        } else {
            AnswerVerdict::Incorrect
        }
    }
}

/// Decide whether `submitted` answers `activation`.
///
/// Multiple-choice answers must match the key exactly (case-sensitive); free-text answers are
/// compared after trimming and case folding. A scored activation without a configured key
/// answer rejects everything.
pub fn validate(activation: &ActivationEntity, submitted: &str) -> AnswerVerdict {
    match activation.kind {
        ActivationKind::MultipleChoice => AnswerVerdict::from_match(
            activation
                .correct_answer
                .as_deref()
                .is_some_and(|expected| expected == submitted),
        ),
        ActivationKind::TextAnswer => AnswerVerdict::from_match(
            activation
                .exact_answer
                .as_deref()
                .is_some_and(|expected| normalize(expected) == normalize(submitted)),
        ),
        ActivationKind::Poll => AnswerVerdict::Unscored,
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use uuid::Uuid;

    use super::*;
    use crate::dao::models::{OptionEntity, PollState};

    fn activation(kind: ActivationKind) -> ActivationEntity {
        ActivationEntity {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            kind,
            prompt: "Capital of France?".into(),
            correct_answer: None,
            exact_answer: None,
            options: vec![
                OptionEntity {
                    id: "a".into(),
                    text: "Paris".into(),
                },
                OptionEntity {
                    id: "b".into(),
                    text: "Lyon".into(),
                },
            ],
            poll_state: PollState::Voting,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    #[test]
    fn multiple_choice_is_case_sensitive() {
        let mut question = activation(ActivationKind::MultipleChoice);
        question.correct_answer = Some("Paris".into());

        assert_eq!(validate(&question, "Paris"), AnswerVerdict::Correct);
        assert_eq!(validate(&question, "paris"), AnswerVerdict::Incorrect);
        assert_eq!(validate(&question, " Paris"), AnswerVerdict::Incorrect);
    }

    #[test]
    fn text_answer_is_trimmed_and_case_folded() {
        let mut question = activation(ActivationKind::TextAnswer);
        question.exact_answer = Some("Paris".into());

        assert_eq!(validate(&question, "  paris "), AnswerVerdict::Correct);
        assert_eq!(validate(&question, "PARIS"), AnswerVerdict::Correct);
        assert_eq!(validate(&question, "Pariss"), AnswerVerdict::Incorrect);
    }

    #[test]
    fn missing_key_answer_rejects_everything() {
        let question = activation(ActivationKind::MultipleChoice);
        assert_eq!(validate(&question, "Paris"), AnswerVerdict::Incorrect);

        let question = activation(ActivationKind::TextAnswer);
        assert_eq!(validate(&question, ""), AnswerVerdict::Incorrect);
    }

    #[test]
    fn polls_are_never_scored() {
        let poll = activation(ActivationKind::Poll);
        let verdict = validate(&poll, "Paris");
        assert_eq!(verdict, AnswerVerdict::Unscored);
        assert!(!verdict.is_correct());
    }
}
