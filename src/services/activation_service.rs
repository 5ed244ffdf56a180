//! Operator-side management of activations: creation, listing and lifecycle moves.

use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::{
        models::{ActivationEntity, ActivationKind, OptionEntity, PollState},
        room_store::SwapOutcome,
    },
    dto::activation::{ActivationSummary, CreateActivationRequest, TransitionRequest},
    error::ServiceError,
    state::{ActivityKind, SharedState},
};

/// Create an activation in the `pending` state.
pub async fn create_activation(
    state: &SharedState,
    request: CreateActivationRequest,
) -> Result<ActivationSummary, ServiceError> {
    let activation = build_activation(request)?;
    let store = state.require_room_store().await?;
    store.save_activation(activation.clone()).await?;

    info!(
        activation_id = %activation.id,
        room_id = %activation.room_id,
        kind = ?activation.kind,
        "activation created"
    );
    Ok(activation.into())
}

/// List a room's activations, oldest first.
pub async fn list_activations(
    state: &SharedState,
    room_id: Uuid,
) -> Result<Vec<ActivationSummary>, ServiceError> {
    let store = state.require_room_store().await?;
    let activations = store.list_activations(room_id).await?;
    Ok(activations.into_iter().map(Into::into).collect())
}

/// Move an activation forward in its lifecycle and notify live sessions.
pub async fn transition(
    state: &SharedState,
    id: Uuid,
    request: TransitionRequest,
) -> Result<ActivationSummary, ServiceError> {
    let target = request
        .poll_state
        .ok_or_else(|| ServiceError::InvalidInput("missing field `pollState`".into()))?;
    let store = state.require_room_store().await?;

    let Some(mut activation) = store.find_activation(id).await? else {
        return Err(ServiceError::NotFound(format!("activation `{id}` not found")));
    };

    let from = activation.poll_state;
    activation.poll_state = from.advance_to(target)?;
    activation.updated_at = SystemTime::now();
    // Conditional on the state read above, so two racing operators cannot move it backwards.
    if store
        .compare_and_swap_activation(activation.clone(), from)
        .await?
        == SwapOutcome::Stale
    {
        warn!(activation_id = %id, ?from, to = ?target, "concurrent transition won; not applied");
        return Err(ServiceError::InvalidState(format!(
            "activation `{id}` left state {from:?} concurrently"
        )));
    }

    info!(activation_id = %id, ?from, to = ?target, "activation state changed");
    state.activity().publish(id, ActivityKind::StateChanged);
    Ok(activation.into())
}

fn build_activation(request: CreateActivationRequest) -> Result<ActivationEntity, ServiceError> {
    let CreateActivationRequest {
        room_id,
        kind,
        prompt,
        correct_answer,
        exact_answer,
        options,
    } = request;
    let room_id = room_id.ok_or_else(|| ServiceError::InvalidInput("missing field `roomId`".into()))?;
    let kind = kind.ok_or_else(|| ServiceError::InvalidInput("missing field `kind`".into()))?;

    let options: Vec<OptionEntity> = options
        .into_iter()
        .map(|option| OptionEntity {
            id: option
                .id
                .unwrap_or_else(|| Uuid::new_v4().simple().to_string()),
            text: option.text.trim().to_string(),
        })
        .collect();

    match kind {
        ActivationKind::TextAnswer if !options.is_empty() => {
            return Err(ServiceError::InvalidInput(
                "text answer activations take no options".into(),
            ));
        }
        ActivationKind::MultipleChoice | ActivationKind::Poll if options.len() < 2 => {
            return Err(ServiceError::InvalidInput(
                "at least two options are required".into(),
            ));
        }
        ActivationKind::Poll if correct_answer.is_some() || exact_answer.is_some() => {
            return Err(ServiceError::InvalidInput(
                "poll activations have no key answer".into(),
            ));
        }
        _ => {}
    }
    check_key_answer(kind, correct_answer.as_deref(), exact_answer.as_deref(), &options)?;

    let now = SystemTime::now();
    Ok(ActivationEntity {
        id: Uuid::new_v4(),
        room_id,
        kind,
        prompt: prompt.trim().to_string(),
        correct_answer,
        exact_answer,
        options,
        poll_state: PollState::Pending,
        created_at: now,
        updated_at: now,
    })
}

/// Scored kinds need a key the validator can match: multiple choice names one of its options
/// (by id or display text), text answers carry a non-blank expected answer.
fn check_key_answer(
    kind: ActivationKind,
    correct_answer: Option<&str>,
    exact_answer: Option<&str>,
    options: &[OptionEntity],
) -> Result<(), ServiceError> {
    fn present(key: Option<&str>) -> Option<&str> {
        key.filter(|key| !key.trim().is_empty())
    }
    match kind {
        ActivationKind::MultipleChoice => {
            let key = present(correct_answer).ok_or_else(|| {
                ServiceError::InvalidInput(
                    "multiple choice activations need a `correctAnswer`".into(),
                )
            })?;
            if options
                .iter()
                .any(|option| option.id == key || option.text == key)
            {
                Ok(())
            } else {
                Err(ServiceError::InvalidInput(format!(
                    "`correctAnswer` `{key}` matches no option"
                )))
            }
        }
        ActivationKind::TextAnswer => present(exact_answer).map(|_| ()).ok_or_else(|| {
            ServiceError::InvalidInput("text answer activations need an `exactAnswer`".into())
        }),
        ActivationKind::Poll => Ok(()),
    }
}
