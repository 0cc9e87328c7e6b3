//! Outbound webhook notifications.
//!
//! Messages are Discord-style embeds posted as a multipart form with a single
//! `payload_json` field. Delivery is best-effort: callers spawn the post and
//! only log failures.

pub mod messages;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::multipart::Form;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub use messages::{matchmaking_message, settlement_message, FeeSplit, MessageStyle};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook returned status {0}")]
    Status(u16),
    #[error("failed to encode webhook payload: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, msg: &WebhookMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebhookMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embed {
    pub title: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub inline: bool,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: false,
        }
    }

    pub fn inline(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            inline: true,
            ..Self::new(name, value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

/// Webhook poster for a single channel URL.
pub struct DiscordWebhook {
    url: String,
    http: Client,
}

impl DiscordWebhook {
    pub fn new(url: String, timeout: Duration) -> Result<Self, NotifyError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http })
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn post(&self, msg: &WebhookMessage) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(msg)?;
        let form = Form::new().text("payload_json", payload);

        let resp = self.http.post(&self.url).multipart(form).send().await?;
        if !resp.status().is_success() {
            return Err(NotifyError::Status(resp.status().as_u16()));
        }

        debug!(embeds = msg.embeds.len(), "webhook posted");
        Ok(())
    }
}
