//! Channel message create/delete

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rest::DiscordRestClient;

/// Failure posting or removing a channel message.
#[derive(Debug, Error)]
pub enum MessageError {
    /// The channel does not exist or the bot cannot see it.
    #[error("channel {0} not found")]
    ChannelNotFound(String),

    /// Discord answered with a non-success status.
    #[error("Discord returned {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The request never produced a response.
    #[error("Discord request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Which mentions Discord should turn into pings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllowedMentions {
    /// Mention types parsed from content; left empty to disable bulk pings
    pub parse: Vec<String>,
    /// User ids that may be pinged
    pub users: Vec<String>,
}

/// A link button (component type 2, style 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkButton {
    #[serde(rename = "type")]
    kind: u8,
    style: u8,
    /// Button caption
    pub label: String,
    /// Target URL
    pub url: String,
}

impl LinkButton {
    /// Creates a button that opens `url`.
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: 2,
            style: 5,
            label: label.into(),
            url: url.into(),
        }
    }
}

/// Row of components (component type 1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    kind: u8,
    /// Buttons in the row
    pub components: Vec<LinkButton>,
}

impl ActionRow {
    /// Wraps buttons in a row.
    pub fn new(components: Vec<LinkButton>) -> Self {
        Self { kind: 1, components }
    }
}

/// Body of `POST /channels/{id}/messages`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    /// Message text
    pub content: String,
    /// Mention restrictions
    pub allowed_mentions: AllowedMentions,
    /// Interactive components
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ActionRow>,
}

/// A message Discord accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SentMessage {
    /// Message id
    pub id: String,
    /// Channel the message lives in
    pub channel_id: String,
}

/// Posts and removes channel messages.
#[async_trait]
pub trait ChannelMessenger: Send + Sync {
    /// Posts `message` to `channel_id`.
    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, MessageError>;

    /// Deletes a message. A message that is already gone counts as deleted.
    async fn delete_message(&self, channel_id: &str, message_id: &str)
        -> Result<(), MessageError>;
}

async fn rejected(resp: reqwest::Response) -> MessageError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    MessageError::Rejected { status, body }
}

#[async_trait]
impl ChannelMessenger for DiscordRestClient {
    async fn send_message(
        &self,
        channel_id: &str,
        message: &OutgoingMessage,
    ) -> Result<SentMessage, MessageError> {
        let resp = self
            .request(Method::POST, &format!("/channels/{channel_id}/messages"))
            .json(message)
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(resp.json().await?),
            StatusCode::NOT_FOUND => Err(MessageError::ChannelNotFound(channel_id.to_string())),
            _ => Err(rejected(resp).await),
        }
    }

    async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), MessageError> {
        let resp = self
            .request(
                Method::DELETE,
                &format!("/channels/{channel_id}/messages/{message_id}"),
            )
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(rejected(resp).await),
        }
    }
}
