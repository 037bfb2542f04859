//! Claim conversation transcripts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prizebot_common::{AppError, AppResult};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// One message in a claim conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptMessage {
    /// Platform id of the sender.
    pub author_id: String,
    /// Message text.
    pub content: String,
    /// When the message was posted.
    pub sent_at: DateTime<Utc>,
}

/// Reads recent messages of the conversation attached to a claim.
#[async_trait]
/// Up to `limit` of the most recent messages.
pub trait TranscriptReader: Send + Sync {
    async fn recent_messages(
        &self,
        conversation_ref: &str,
        limit: u32,
    ) -> AppResult<Vec<TranscriptMessage>>;
}

/// Reader that never sees any messages.
#[derive(Debug, Clone, Default)]
pub struct NoOpTranscriptReader;

#[async_trait]
impl TranscriptReader for NoOpTranscriptReader {
    async fn recent_messages(
        &self,
        _conversation_ref: &str,
        _limit: u32,
    ) -> AppResult<Vec<TranscriptMessage>> {
        Ok(Vec::new())
    }
}

#[derive(Deserialize)]
struct ChannelMessage {
    author: MessageAuthor,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct MessageAuthor {
    id: String,
}

/// Reader for Discord channels and threads, authenticated with a bot token.
#[derive(Clone)]
pub struct DiscordTranscriptReader {
    api_base: String,
    bot_token: String,
    http_client: Arc<reqwest::Client>,
}

impl DiscordTranscriptReader {
    /// Create a reader against `api_base` (e.g. `https://discord.com/api/v10`).
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            api_base: api_base.into(),
            bot_token: bot_token.into(),
            http_client: Arc::new(http_client),
        })
    }
}

#[async_trait]
impl TranscriptReader for DiscordTranscriptReader {
    async fn recent_messages(
        &self,
        conversation_ref: &str,
        limit: u32,
    ) -> AppResult<Vec<TranscriptMessage>> {
        let response = self
            .http_client
            .get(format!(
                "{}/channels/{conversation_ref}/messages",
                self.api_base
            ))
            .query(&[("limit", limit.min(100))])
            .header("Authorization", format!("Bot {}", self.bot_token))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Transcript request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Transcript read returned HTTP {}",
                response.status()
            )));
        }

        let messages: Vec<ChannelMessage> = response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Transcript response: {e}")))?;

        Ok(messages
            .into_iter()
            .map(|m| TranscriptMessage {
                author_id: m.author.id,
                content: m.content,
                sent_at: m.timestamp,
            })
            .collect())
    }
}
