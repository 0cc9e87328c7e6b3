//! GraphQL client for the chain indexer's `events` query.

use crate::indexer::{EventSource, IndexerError, IndexerEvent};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<EventsData>,
    #[serde(default)]
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct EventsData {
    events: EventConnection,
}

#[derive(Debug, Deserialize)]
struct EventConnection {
    edges: Vec<EventEdge>,
}

/// Nodes stay untyped until each one is decoded on its own.
#[derive(Debug, Deserialize)]
struct EventEdge {
    #[serde(default)]
    node: serde_json::Value,
}

pub struct GraphqlIndexer {
    url: String,
    query: String,
    http: Client,
}

impl GraphqlIndexer {
    /// `actions` are the wasm event actions to subscribe to, e.g. `["wager", "matchmake"]`.
    pub fn new(
        url: String,
        contract_type: &str,
        actions: &[&str],
        timeout: Duration,
    ) -> Result<Self, IndexerError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            url,
            query: events_query(contract_type, actions),
            http,
        })
    }
}

/// Decode each edge's node separately, dropping the ones that do not fit.
fn decode_nodes(edges: Vec<EventEdge>) -> Vec<IndexerEvent> {
    edges
        .into_iter()
        .filter_map(|edge| {
            let id = edge.node.get("id").cloned();
            match serde_json::from_value::<IndexerEvent>(edge.node) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(event = ?id, error = %e, "skipping malformed indexer event");
                    None
                }
            }
        })
        .collect()
}

/// Newest-first event query filtered to one contract type and a set of actions.
fn events_query(contract_type: &str, actions: &[&str]) -> String {
    let events = actions
        .iter()
        .map(|action| format!(r#"{{ name: "wasm", action: "{action}" }}"#))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        r#"query Events {{
  events(
    sortBy: BLOCK_HEIGHT_DESC
    contractFilters: [{{ contractType: "{contract_type}", events: [{events}] }}]
  ) {{
    edges {{
      node {{
        id
        data
        contractAddr
        createdAt
      }}
    }}
  }}
}}"#
    )
}

#[async_trait]
impl EventSource for GraphqlIndexer {
    async fn recent_events(&self) -> Result<Vec<IndexerEvent>, IndexerError> {
        let body = serde_json::json!({ "query": self.query });
        let resp = self.http.post(&self.url).json(&body).send().await?;

        if !resp.status().is_success() {
            return Err(IndexerError::Status(resp.status().as_u16()));
        }

        let body: GraphqlResponse = resp.json().await?;
        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let messages = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(IndexerError::Query(messages));
        }

        let edges = body
            .data
            .ok_or_else(|| IndexerError::Query("response has no data".to_string()))?
            .events
            .edges;

        let fetched = edges.len();
        let events = decode_nodes(edges);
        debug!(fetched, decoded = events.len(), "indexer events fetched");
        Ok(events)
    }
}
