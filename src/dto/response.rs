//! DTOs for participant submissions: scored answers and poll votes.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::PlayerStatsEntity,
    dto::{
        format_system_time,
        validation::{validate_not_blank, validate_score_submission},
    },
    error::ServiceError,
    services::{
        response_service::{Judgement, ScoreOutcome, ScoreRequest},
        vote_ledger::VoteReceipt,
    },
};

/// Answer submitted for scoring.
///
/// Either `isCorrect` (pre-judged by the caller) or `answer` (judged by the server) must be
/// present; when both are sent the raw answer wins.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_score_submission"))]
pub struct ScoreSubmission {
    /// Activation being answered.
    #[validate(required)]
    pub activation_id: Option<Uuid>,
    /// Answering participant.
    #[validate(required)]
    pub player_id: Option<Uuid>,
    /// Client-measured latency; negative values count as zero.
    #[validate(required)]
    pub time_taken_ms: Option<i64>,
    /// Verdict judged by the client.
    #[serde(default)]
    pub is_correct: Option<bool>,
    /// Raw answer for the server to judge.
    #[serde(default)]
    pub answer: Option<String>,
    /// Registers the participant when it is not known yet.
    #[serde(default)]
    #[validate(custom(function = "validate_not_blank"), length(max = 64))]
    pub player_name: Option<String>,
    /// Room used when registering; defaults to the activation's room.
    #[serde(default)]
    pub room_id: Option<Uuid>,
}

impl ScoreSubmission {
    /// Whether the server judges the answer itself.
    pub fn is_server_judged(&self) -> bool {
        self.answer.is_some()
    }
}

impl TryFrom<ScoreSubmission> for ScoreRequest {
    type Error = ServiceError;

    fn try_from(value: ScoreSubmission) -> Result<Self, Self::Error> {
        let missing = |field: &str| ServiceError::InvalidInput(format!("missing field `{field}`"));

        let judgement = match (value.answer, value.is_correct) {
            (Some(answer), _) => Judgement::Answer(answer),
            (None, Some(is_correct)) => Judgement::PreJudged(is_correct),
            (None, None) => return Err(missing("isCorrect")),
        };

        Ok(ScoreRequest {
            activation_id: value.activation_id.ok_or_else(|| missing("activationId"))?,
            player_id: value.player_id.ok_or_else(|| missing("playerId"))?,
            player_name: value.player_name,
            room_id: value.room_id,
            judgement,
            time_taken_ms: value.time_taken_ms.ok_or_else(|| missing("timeTakenMs"))?,
        })
    }
}

/// Running statistics of a participant.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStatsDto {
    /// Sum of awarded points.
    pub total_points: u64,
    /// Answers judged correct.
    pub correct_answers: u32,
    /// Answers recorded.
    pub total_answers: u32,
    /// Mean of the clamped response times.
    pub average_response_time_ms: f64,
}

impl From<PlayerStatsEntity> for PlayerStatsDto {
    fn from(stats: PlayerStatsEntity) -> Self {
        Self {
            total_points: stats.total_points,
            correct_answers: stats.correct_answers,
            total_answers: stats.total_answers,
            average_response_time_ms: stats.average_response_time_ms,
        }
    }
}

/// Authoritative scoring result.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    /// Always `true` on this payload.
    pub success: bool,
    /// Present when the server judged the raw answer.
    pub is_correct: Option<bool>,
    /// Points added by this submission.
    pub points_awarded: u32,
    /// Player score after the update.
    pub new_score: u64,
    /// Player statistics after the update.
    pub stats: PlayerStatsDto,
}

impl ScoreResponse {
    /// Build the payload, echoing the verdict only for server-judged answers.
    pub fn from_outcome(outcome: ScoreOutcome, server_judged: bool) -> Self {
        Self {
            success: true,
            is_correct: server_judged.then_some(outcome.is_correct),
            points_awarded: outcome.points_awarded,
            new_score: outcome.new_score,
            stats: outcome.stats.into(),
        }
    }
}

/// Vote on one option of an activation.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Voting participant.
    #[validate(required)]
    pub player_id: Option<Uuid>,
    /// Identity key of the chosen option.
    #[validate(required, custom(function = "validate_not_blank"))]
    pub option_id: Option<String>,
}

/// Accepted vote as recorded by the ledger.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceiptResponse {
    /// Always `true` on this payload.
    pub success: bool,
    /// Activation voted on.
    pub activation_id: Uuid,
    /// Voting participant.
    pub player_id: Uuid,
    /// Identity key of the chosen option.
    pub option_id: String,
    /// Display key of the chosen option.
    pub option_text: String,
    /// RFC 3339 time the vote was recorded.
    pub submitted_at: String,
}

impl From<VoteReceipt> for VoteReceiptResponse {
    fn from(receipt: VoteReceipt) -> Self {
        Self {
            success: true,
            activation_id: receipt.activation_id,
            player_id: receipt.player_id,
            option_id: receipt.option_id,
            option_text: receipt.option_text,
            submitted_at: format_system_time(receipt.submitted_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(body: &str) -> ScoreSubmission {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn missing_judgement_fails_validation() {
        let body = format!(
            r#"{{"activationId": "{}", "playerId": "{}", "timeTakenMs": 10}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        assert!(submission(&body).validate().is_err());
    }

    #[test]
    fn raw_answer_takes_precedence_over_verdict() {
        let body = format!(
            r#"{{"activationId": "{}", "playerId": "{}", "timeTakenMs": 10,
                "isCorrect": true, "answer": "Lyon"}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let parsed = submission(&body);
        assert!(parsed.validate().is_ok());
        assert!(parsed.is_server_judged());

        let request = ScoreRequest::try_from(parsed).unwrap();
        assert_eq!(request.judgement, Judgement::Answer("Lyon".into()));
    }

    #[test]
    fn verdict_is_omitted_for_pre_judged_answers() {
        let outcome = ScoreOutcome {
            is_correct: true,
            points_awarded: 90,
            new_score: 90,
            stats: PlayerStatsEntity::default(),
        };
        let json = serde_json::to_value(ScoreResponse::from_outcome(outcome, false)).unwrap();
        assert!(json.get("isCorrect").is_none());
        assert_eq!(json["pointsAwarded"], 90);
        assert_eq!(json["success"], true);
    }
}
