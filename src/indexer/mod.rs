//! Contract events surfaced by the chain indexer.
//!
//! The indexer returns raw event nodes; the `data` payload is parsed lazily so
//! a single malformed event never fails a whole batch.

pub mod graphql;

use crate::wager::TokenRef;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

pub use graphql::GraphqlIndexer;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("indexer request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("indexer returned status {0}")]
    Status(u16),
    #[error("indexer query error: {0}")]
    Query(String),
    #[error("malformed event payload: {0}")]
    Payload(String),
}

#[async_trait]
pub trait EventSource: Send + Sync {
    /// Recent contract events, newest first.
    async fn recent_events(&self) -> Result<Vec<IndexerEvent>, IndexerError>;
}

/// One event node as returned by the indexer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerEvent {
    pub id: String,
    pub contract_addr: String,
    pub created_at: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl IndexerEvent {
    /// Creation time. Accepts RFC 3339 and zone-less timestamps (read as UTC).
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.created_at) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.created_at, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn payload(&self) -> Result<EventPayload, IndexerError> {
        EventPayload::parse(&self.data)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Wager,
    Matchmake,
    Other,
}

impl EventAction {
    fn from_name(action: &str) -> Self {
        match action {
            "wager" => Self::Wager,
            "matchmake" => Self::Matchmake,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Wager => write!(f, "wager"),
            EventAction::Matchmake => write!(f, "matchmake"),
            EventAction::Other => write!(f, "other"),
        }
    }
}

/// Parsed `data` of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    pub token: TokenRef,
    pub expires_at: Option<DateTime<Utc>>,
    pub action: EventAction,
}

/// Raw payload fields. Numbers arrive as strings or numbers depending on the
/// indexer version.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPayload {
    collection: String,
    token_id: serde_json::Value,
    #[serde(default)]
    expires_at: Option<serde_json::Value>,
    #[serde(default)]
    action: Option<String>,
}

impl EventPayload {
    pub fn parse(data: &serde_json::Value) -> Result<Self, IndexerError> {
        // Some indexer deployments return the JSON scalar as an encoded string.
        let raw: RawPayload = match data {
            serde_json::Value::String(encoded) => serde_json::from_str(encoded),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| IndexerError::Payload(e.to_string()))?;

        let token_id = as_u64(&raw.token_id)
            .ok_or_else(|| IndexerError::Payload(format!("tokenId {}", raw.token_id)))?;

        let expires_at = match raw.expires_at {
            Some(value) => {
                let secs = as_u64(&value)
                    .ok_or_else(|| IndexerError::Payload(format!("expiresAt {value}")))?;
                Some(
                    DateTime::<Utc>::from_timestamp(secs as i64, 0)
                        .ok_or_else(|| IndexerError::Payload(format!("expiresAt {secs}")))?,
                )
            }
            None => None,
        };

        // Events without an action predate matchmaking and are wagers.
        let action = raw
            .action
            .as_deref()
            .map(EventAction::from_name)
            .unwrap_or(EventAction::Wager);

        Ok(Self {
            token: TokenRef::new(raw.collection, token_id),
            expires_at,
            action,
        })
    }
}

fn as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
