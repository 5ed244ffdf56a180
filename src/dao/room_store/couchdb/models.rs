use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const ACTIVATION_PREFIX: &str = "activation::";
pub const VOTE_PREFIX: &str = "vote::";
pub const ANSWER_PREFIX: &str = "answer::";
pub const PLAYER_PREFIX: &str = "player::";
pub const END_SUFFIX: &str = "\u{ffff}";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Envelope adding the CouchDB bookkeeping fields around a stored entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchDocument<T> {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: T,
}

impl<T> CouchDocument<T> {
    pub fn new(id: String, body: T) -> Self {
        Self {
            id,
            rev: None,
            body,
        }
    }
}

pub fn activation_doc_id(id: Uuid) -> String {
    format!("{ACTIVATION_PREFIX}{id}")
}

pub fn player_doc_id(id: Uuid) -> String {
    format!("{PLAYER_PREFIX}{id}")
}

/// The document id doubles as the uniqueness constraint: a second PUT on it yields 409.
pub fn vote_doc_id(activation_id: Uuid, player_id: Uuid) -> String {
    format!("{VOTE_PREFIX}{activation_id}::{player_id}")
}

pub fn answer_doc_id(activation_id: Uuid, player_id: Uuid) -> String {
    format!("{ANSWER_PREFIX}{activation_id}::{player_id}")
}

/// Key prefix selecting every response of one activation.
pub fn responses_prefix(prefix: &str, activation_id: Uuid) -> String {
    format!("{prefix}{activation_id}::")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_ids_share_the_activation_prefix() {
        let activation = Uuid::new_v4();
        let id = vote_doc_id(activation, Uuid::new_v4());
        assert!(id.starts_with(&responses_prefix(VOTE_PREFIX, activation)));
        assert_ne!(id, vote_doc_id(activation, Uuid::new_v4()));
    }
}
