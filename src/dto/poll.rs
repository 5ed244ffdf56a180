//! DTOs exposing poll snapshots, one-shot and streamed.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{dao::models::PollState, services::poll_aggregator::PollSnapshot};

/// Query identifying the participant whose view is requested.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PollQuery {
    /// Participant whose own vote status is reported.
    pub player_id: Uuid,
}

/// How a snapshot stream is refreshed.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Re-read on the configured cadence.
    #[default]
    Interval,
    /// Re-read whenever the activation changes.
    Subscription,
}

/// Query of the snapshot stream.
#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PollStreamQuery {
    /// Participant whose own vote is reported.
    pub player_id: Uuid,
    /// Refresh strategy; `interval` when omitted.
    #[serde(default)]
    #[param(inline)]
    pub mode: StreamMode,
}

/// Tallies and own-vote status for one activation.
#[skip_serializing_none]
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshotResponse {
    /// Activation the tallies belong to; absent for an idle session.
    pub activation_id: Option<Uuid>,
    /// Votes keyed by option id, in option order.
    #[schema(value_type = Object)]
    pub tally_by_option: IndexMap<String, u64>,
    /// Votes keyed by option text, in option order.
    #[schema(value_type = Object)]
    pub tally_by_option_text: IndexMap<String, u64>,
    /// Sum of the tallies.
    pub total_votes: u64,
    /// Whether the requesting participant has voted.
    pub has_voted: bool,
    /// Option the participant picked, when they voted.
    pub selected_option_id: Option<String>,
    /// Lifecycle state of the activation.
    pub poll_state: PollState,
}

impl From<PollSnapshot> for PollSnapshotResponse {
    fn from(snapshot: PollSnapshot) -> Self {
        Self {
            activation_id: snapshot.activation_id,
            tally_by_option: snapshot.tally_by_option,
            tally_by_option_text: snapshot.tally_by_option_text,
            total_votes: snapshot.total_votes,
            has_voted: snapshot.has_voted,
            selected_option_id: snapshot.selected_option_id,
            poll_state: snapshot.poll_state,
        }
    }
}
