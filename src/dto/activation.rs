//! DTOs used by the operator endpoints managing activations.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{ActivationEntity, ActivationKind, OptionEntity, PollState},
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_unique_option_ids},
    },
};

/// Option supplied when creating an activation.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OptionInput {
    /// Identity key; generated when omitted.
    #[serde(default)]
    #[validate(custom(function = "validate_not_blank"))]
    pub id: Option<String>,
    /// Display key.
    #[validate(custom(function = "validate_not_blank"))]
    pub text: String,
}

/// Payload creating a new activation in the `pending` state.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivationRequest {
    /// Room hosting the activation.
    #[validate(required)]
    pub room_id: Option<Uuid>,
    /// How responses are judged.
    #[validate(required)]
    pub kind: Option<ActivationKind>,
    /// Question or poll prompt shown to participants.
    #[validate(custom(function = "validate_not_blank"))]
    pub prompt: String,
    /// Key for multiple choice: an option id or its text.
    #[serde(default)]
    pub correct_answer: Option<String>,
    /// Key for text answers, compared case-insensitively.
    #[serde(default)]
    pub exact_answer: Option<String>,
    /// Choices; empty for text answers.
    #[serde(default)]
    #[validate(nested, custom(function = "validate_unique_option_ids"))]
    pub options: Vec<OptionInput>,
}

/// Requested lifecycle transition.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    /// Target state; only forward moves are accepted.
    #[validate(required)]
    pub poll_state: Option<PollState>,
}

/// Option as exposed by the API.
#[derive(Debug, Serialize, ToSchema)]
pub struct OptionSummary {
    /// Identity key.
    pub id: String,
    /// Display key.
    pub text: String,
}

impl From<OptionEntity> for OptionSummary {
    fn from(option: OptionEntity) -> Self {
        Self {
            id: option.id,
            text: option.text,
        }
    }
}

/// Operator view of an activation, key answers included.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivationSummary {
    /// Activation identifier.
    pub id: Uuid,
    /// Room hosting the activation.
    pub room_id: Uuid,
    /// How responses are judged.
    pub kind: ActivationKind,
    /// Question or poll prompt.
    pub prompt: String,
    /// Multiple choice key.
    pub correct_answer: Option<String>,
    /// Text answer key.
    pub exact_answer: Option<String>,
    /// Choices in display order.
    pub options: Vec<OptionSummary>,
    /// Current lifecycle state.
    pub poll_state: PollState,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// RFC 3339 time of the last change.
    pub updated_at: String,
}

impl From<ActivationEntity> for ActivationSummary {
    fn from(activation: ActivationEntity) -> Self {
        Self {
            id: activation.id,
            room_id: activation.room_id,
            kind: activation.kind,
            prompt: activation.prompt,
            correct_answer: activation.correct_answer,
            exact_answer: activation.exact_answer,
            options: activation.options.into_iter().map(Into::into).collect(),
            poll_state: activation.poll_state,
            created_at: format_system_time(activation.created_at),
            updated_at: format_system_time(activation.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_fields_fail_validation_not_decoding() {
        let request: CreateActivationRequest =
            serde_json::from_str(r#"{"prompt": "Capital of France?"}"#).unwrap();
        let errors = request.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 2);
    }

    #[test]
    fn duplicate_option_ids_are_rejected() {
        let request: CreateActivationRequest = serde_json::from_str(&format!(
            r#"{{"roomId": "{}", "kind": "poll", "prompt": "Pick",
                "options": [{{"id": "a", "text": "A"}}, {{"id": "a", "text": "B"}}]}}"#,
            Uuid::new_v4()
        ))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn nested_options_are_validated() {
        let body = |options: &str| {
            format!(
                r#"{{"roomId": "{}", "kind": "poll", "prompt": "Pick", "options": {options}}}"#,
                Uuid::new_v4()
            )
        };
        let request: CreateActivationRequest =
            serde_json::from_str(&body(r#"[{"text": "A"}, {"id": "b", "text": "B"}]"#)).unwrap();
        assert!(request.validate().is_ok());

        let request: CreateActivationRequest =
            serde_json::from_str(&body(r#"[{"text": " "}, {"text": "B"}]"#)).unwrap();
        assert!(request.validate().is_err());
    }
}
