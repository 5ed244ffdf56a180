//! Judge, score and persist a participant's answer, then fold it into their standing.

use std::time::SystemTime;

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ActivationKind, AnswerEntity, PlayerEntity, PlayerStatsEntity},
        room_store::{RoomStore, SwapOutcome},
    },
    error::ServiceError,
    services::{
        answer_validator,
        scoring::{self, PlayerStanding, ScoredResponse, ScoringRules},
    },
};

/// How correctness is established for a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Judgement {
    /// The caller already decided.
    PreJudged(bool),
    /// The raw answer is checked against the activation's key.
    Answer(String),
}

/// A single scoring request.
#[derive(Debug, Clone)]
pub struct ScoreRequest {
    /// Activation being answered.
    pub activation_id: Uuid,
    /// Answering participant.
    pub player_id: Uuid,
    /// Used to register the participant on first contact.
    pub player_name: Option<String>,
    /// Room for on-the-fly registration; the activation's room otherwise.
    pub room_id: Option<Uuid>,
    /// Client verdict or raw answer.
    pub judgement: Judgement,
    /// Client-measured latency, clamped to zero before use.
    pub time_taken_ms: i64,
}

/// Authoritative result returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    /// Verdict used for the award.
    pub is_correct: bool,
    /// Points added by this submission.
    pub points_awarded: u32,
    /// Player score after the update.
    pub new_score: u64,
    /// Player statistics after the update.
    pub stats: PlayerStatsEntity,
}

/// Run one submission through validation, scoring and persistence.
///
/// The answer record is inserted first; its uniqueness constraint rejects a second answer
/// from the same participant before any stats are touched. Stats are then folded with a
/// compare-and-swap on the player's revision, re-reading on a stale write until it lands, so
/// every stored answer is counted exactly once.
pub async fn submit_response(
    store: &dyn RoomStore,
    rules: &ScoringRules,
    request: ScoreRequest,
) -> Result<ScoreOutcome, ServiceError> {
    let ScoreRequest {
        activation_id,
        player_id,
        player_name,
        room_id,
        judgement,
        time_taken_ms,
    } = request;

    let activation = store
        .find_activation(activation_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("activation `{activation_id}` not found")))?;

    if activation.kind == ActivationKind::Poll {
        return Err(ServiceError::InvalidInput(
            "poll activations are tally-only; cast a vote instead".into(),
        ));
    }
    if !activation.poll_state.accepts_responses() {
        return Err(ServiceError::InvalidState(format!(
            "activation is not accepting answers (state {:?})",
            activation.poll_state
        )));
    }

    let (is_correct, answer) = match judgement {
        Judgement::PreJudged(is_correct) => (is_correct, None),
        Judgement::Answer(answer) => (
            answer_validator::validate(&activation, &answer).is_correct(),
            Some(answer),
        ),
    };
    let points = rules.award(is_correct, time_taken_ms);

    ensure_player(store, player_id, player_name, room_id.or(Some(activation.room_id))).await?;

    store
        .insert_answer(AnswerEntity {
            activation_id,
            player_id,
            answer,
            is_correct,
            points_awarded: points,
            time_taken_ms: scoring::clamp_elapsed(time_taken_ms),
            submitted_at: SystemTime::now(),
        })
        .await?;

    let scored = ScoredResponse {
        is_correct,
        points,
        elapsed_ms: time_taken_ms,
    };
    let player = apply_stats(store, player_id, scored).await?;

    info!(
        %activation_id,
        %player_id,
        is_correct,
        points,
        new_score = player.score,
        "answer scored"
    );

    Ok(ScoreOutcome {
        is_correct,
        points_awarded: points,
        new_score: player.score,
        stats: player.stats,
    })
}

/// Make sure the participant exists, registering it when a display name is supplied.
async fn ensure_player(
    store: &dyn RoomStore,
    player_id: Uuid,
    player_name: Option<String>,
    room_id: Option<Uuid>,
) -> Result<(), ServiceError> {
    if store.find_player(player_id).await?.is_some() {
        return Ok(());
    }
    let Some(name) = player_name else {
        return Err(ServiceError::NotFound(format!(
            "player `{player_id}` not found"
        )));
    };

    match store
        .insert_player(PlayerEntity::new(player_id, room_id, name))
        .await
    {
        Ok(()) => {
            info!(%player_id, "registered player on first answer");
            Ok(())
        }
        // Registered concurrently by another request.
        Err(err) if err.is_conflict() => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Fold `scored` into the player's standing, retrying until the swap applies.
///
/// A stale revision implies some other swap on this player applied.
async fn apply_stats(
    store: &dyn RoomStore,
    player_id: Uuid,
    scored: ScoredResponse,
) -> Result<PlayerEntity, ServiceError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let current = store
            .find_player(player_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("player `{player_id}` not found")))?;

        let next = scoring::fold(
            PlayerStanding {
                score: current.score,
                stats: current.stats,
            },
            scored,
        );
        let expected_revision = current.revision;
        let updated = PlayerEntity {
            score: next.score,
            stats: next.stats,
            revision: expected_revision + 1,
            updated_at: SystemTime::now(),
            ..current
        };

        match store
            .compare_and_swap_player(updated.clone(), expected_revision)
            .await?
        {
            SwapOutcome::Applied => return Ok(updated),
            SwapOutcome::Stale => {
                debug!(%player_id, attempt, "stale player revision; re-reading stats");
                tokio::task::yield_now().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dao::{
        models::{ActivationEntity, OptionEntity, PollState},
        room_store::{memory::MemoryRoomStore, scripted::ScriptedStore},
    };

    fn question(kind: ActivationKind) -> ActivationEntity {
        ActivationEntity {
            id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            kind,
            prompt: "Capital of France?".into(),
            correct_answer: Some("Paris".into()),
            exact_answer: Some("Paris".into()),
            options: vec![OptionEntity {
                id: "p".into(),
                text: "Paris".into(),
            }],
            poll_state: PollState::Voting,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    async fn seeded(kind: ActivationKind) -> (MemoryRoomStore, ActivationEntity, Uuid) {
        let store = MemoryRoomStore::new();
        let activation = question(kind);
        store.save_activation(activation.clone()).await.unwrap();
        let player_id = Uuid::new_v4();
        store
            .insert_player(PlayerEntity::new(
                player_id,
                Some(activation.room_id),
                "Ada".into(),
            ))
            .await
            .unwrap();
        (store, activation, player_id)
    }

    fn request(activation_id: Uuid, player_id: Uuid, judgement: Judgement, ms: i64) -> ScoreRequest {
        ScoreRequest {
            activation_id,
            player_id,
            player_name: None,
            room_id: None,
            judgement,
            time_taken_ms: ms,
        }
    }

    #[tokio::test]
    async fn first_correct_answer_after_five_seconds() {
        let (store, activation, player_id) = seeded(ActivationKind::MultipleChoice).await;

        let outcome = submit_response(
            &store,
            &ScoringRules::default(),
            request(activation.id, player_id, Judgement::PreJudged(true), 5_000),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            ScoreOutcome {
                is_correct: true,
                points_awarded: 90,
                new_score: 90,
                stats: PlayerStatsEntity {
                    total_points: 90,
                    correct_answers: 1,
                    total_answers: 1,
                    average_response_time_ms: 5_000.0,
                },
            }
        );
        let stored = store.find_player(player_id).await.unwrap().unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.score, 90);
    }

    #[tokio::test]
    async fn raw_answers_are_validated_per_kind() {
        let (store, mc, player_id) = seeded(ActivationKind::MultipleChoice).await;
        let outcome = submit_response(
            &store,
            &ScoringRules::default(),
            request(mc.id, player_id, Judgement::Answer("paris".into()), 0),
        )
        .await
        .unwrap();
        assert!(!outcome.is_correct);
        assert_eq!(outcome.points_awarded, 0);
        assert_eq!(outcome.stats.total_answers, 1);

        let text = question(ActivationKind::TextAnswer);
        store.save_activation(text.clone()).await.unwrap();
        let outcome = submit_response(
            &store,
            &ScoringRules::default(),
            request(text.id, player_id, Judgement::Answer("  paris ".into()), 0),
        )
        .await
        .unwrap();
        assert!(outcome.is_correct);
        assert_eq!(outcome.points_awarded, 100);
        assert_eq!(outcome.new_score, 100);
        assert_eq!(outcome.stats.total_answers, 2);
    }

    #[tokio::test]
    async fn second_answer_is_a_conflict_and_leaves_stats_alone() {
        let (store, activation, player_id) = seeded(ActivationKind::MultipleChoice).await;
        let rules = ScoringRules::default();

        submit_response(
            &store,
            &rules,
            request(activation.id, player_id, Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap();
        let err = submit_response(
            &store,
            &rules,
            request(activation.id, player_id, Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ServiceError::Conflict(_)));
        let stored = store.find_player(player_id).await.unwrap().unwrap();
        assert_eq!(stored.stats.total_answers, 1);
        assert_eq!(stored.score, 100);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let (store, activation, _) = seeded(ActivationKind::MultipleChoice).await;
        let rules = ScoringRules::default();

        let err = submit_response(
            &store,
            &rules,
            request(Uuid::new_v4(), Uuid::new_v4(), Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let err = submit_response(
            &store,
            &rules,
            request(activation.id, Uuid::new_v4(), Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn named_newcomer_is_registered_in_the_activation_room() {
        let (store, activation, _) = seeded(ActivationKind::TextAnswer).await;
        let newcomer = Uuid::new_v4();
        let mut req = request(activation.id, newcomer, Judgement::Answer("Paris".into()), 1_000);
        req.player_name = Some("Grace".into());

        let outcome = submit_response(&store, &ScoringRules::default(), req)
            .await
            .unwrap();

        assert_eq!(outcome.points_awarded, 98);
        let player = store.find_player(newcomer).await.unwrap().unwrap();
        assert_eq!(player.name, "Grace");
        assert_eq!(player.room_id, Some(activation.room_id));
    }

    #[tokio::test]
    async fn polls_and_closed_activations_are_refused() {
        let (store, poll, player_id) = seeded(ActivationKind::Poll).await;
        let err = submit_response(
            &store,
            &ScoringRules::default(),
            request(poll.id, player_id, Judgement::Answer("Paris".into()), 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let mut closed = question(ActivationKind::MultipleChoice);
        closed.poll_state = PollState::Closed;
        store.save_activation(closed.clone()).await.unwrap();
        let err = submit_response(
            &store,
            &ScoringRules::default(),
            request(closed.id, player_id, Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_answers_from_one_player_never_lose_updates() {
        let store = MemoryRoomStore::new();
        let player_id = Uuid::new_v4();
        store
            .insert_player(PlayerEntity::new(player_id, None, "Linus".into()))
            .await
            .unwrap();

        let mut activation_ids = Vec::new();
        for _ in 0..8 {
            let activation = question(ActivationKind::MultipleChoice);
            store.save_activation(activation.clone()).await.unwrap();
            activation_ids.push(activation.id);
        }

        let rules = Arc::new(ScoringRules::default());
        let mut handles = Vec::new();
        for activation_id in activation_ids.clone() {
            let store = store.clone();
            let rules = rules.clone();
            handles.push(tokio::spawn(async move {
                submit_response(
                    &store,
                    &rules,
                    request(activation_id, player_id, Judgement::PreJudged(true), 0),
                )
                .await
            }));
        }

        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut stored_answers = 0u64;
        for activation_id in &activation_ids {
            stored_answers += store
                .list_answers(*activation_id)
                .await
                .unwrap()
                .iter()
                .filter(|answer| answer.player_id == player_id)
                .count() as u64;
        }
        let player = store.find_player(player_id).await.unwrap().unwrap();
        assert_eq!(stored_answers, 8);
        assert_eq!(u64::from(player.stats.total_answers), stored_answers);
        assert_eq!(player.score, stored_answers * 100);
        assert_eq!(player.revision, stored_answers);
    }

    #[tokio::test]
    async fn long_losing_streak_on_stats_still_counts_the_answer() {
        let (memory, activation, player_id) = seeded(ActivationKind::MultipleChoice).await;
        let store = ScriptedStore::new(memory);
        store.lose_player_swaps(12);

        let outcome = submit_response(
            &store,
            &ScoringRules::default(),
            request(activation.id, player_id, Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap();

        assert_eq!(outcome.stats.total_answers, 1);
        let answers = store.list_answers(activation.id).await.unwrap();
        assert_eq!(answers.len(), 1);
        let player = store.find_player(player_id).await.unwrap().unwrap();
        assert_eq!(player.stats.total_answers, 1);
        assert_eq!(player.score, 100);
    }

    #[tokio::test]
    async fn persistence_failure_is_surfaced() {
        let (store, activation, player_id) = seeded(ActivationKind::MultipleChoice).await;
        store.set_offline(true);

        let err = submit_response(
            &store,
            &ScoringRules::default(),
            request(activation.id, player_id, Judgement::PreJudged(true), 0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }
}
