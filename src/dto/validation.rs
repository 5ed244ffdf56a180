//! Validation helpers for DTOs.

use std::collections::HashSet;

use validator::ValidationError;

use crate::dto::{activation::OptionInput, response::ScoreSubmission};

/// Rejects strings that are empty once surrounding whitespace is removed.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Ensures explicit option identifiers are not repeated within one activation.
pub fn validate_unique_option_ids(options: &[OptionInput]) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for id in options.iter().filter_map(|option| option.id.as_deref()) {
        if !seen.insert(id) {
            let mut err = ValidationError::new("duplicate_option_id");
            err.message = Some(format!("Option ID `{id}` is used more than once").into());
            return Err(err);
        }
    }
    Ok(())
}

/// A score submission must carry either a pre-judged verdict or a raw answer.
pub fn validate_score_submission(submission: &ScoreSubmission) -> Result<(), ValidationError> {
    if submission.is_correct.is_none() && submission.answer.is_none() {
        let mut err = ValidationError::new("missing_judgement");
        err.message = Some("Either `isCorrect` or `answer` must be provided".into());
        return Err(err);
    }
    Ok(())
}
