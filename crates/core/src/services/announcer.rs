//! Public announcements.
//!
//! The lifecycle and claim services only talk to the [`Announcer`] trait.
//! Every call is fallible and never retried here; callers decide whether a
//! failure leaves state for the next scheduler tick to retry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prizebot_common::{AppError, AppResult};
use prizebot_db::entities::{giveaway, giveaway_winner};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// External reference of a posted announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRef(pub String);

/// Content of a live announcement edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdate {
    /// Current number of entries.
    pub entries_count: i32,
    /// Deadline shown in the countdown.
    pub ends_at: DateTime<Utc>,
}

/// Claim events worth telling the channel about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimNotice {
    /// The claim deadline is approaching.
    Reminder {
        user_id: String,
        deadline: DateTime<Utc>,
        final_reminder: bool,
    },
    /// The winner responded.
    Claimed {
        user_id: String,
    },
    /// The winner let the deadline pass.
    Unclaimed {
        user_id: String,
    },
    /// A replacement winner was drawn.
    NewWinner {
        user_id: String,
        deadline: DateTime<Utc>,
    },
}

/// Announcement channel.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Post the opening announcement of a giveaway.
    async fn publish(&self, giveaway: &giveaway::Model) -> AppResult<MessageRef>;

    /// Edit a previously posted announcement.
    async fn edit(&self, message: &MessageRef, update: &LiveUpdate) -> AppResult<()>;

    /// Announce the initial winners of an ended giveaway.
    async fn announce_winners(
        &self,
        giveaway: &giveaway::Model,
        winners: &[giveaway_winner::Model],
    ) -> AppResult<()>;

    /// Tell the channel about a claim event.
    async fn claim_notice(&self, giveaway: &giveaway::Model, notice: &ClaimNotice)
    -> AppResult<()>;
}

/// Announcer that posts nothing. Used when no webhook is configured.
#[derive(Debug, Clone, Default)]
pub struct NoOpAnnouncer;

#[async_trait]
impl Announcer for NoOpAnnouncer {
    async fn publish(&self, giveaway: &giveaway::Model) -> AppResult<MessageRef> {
        Ok(MessageRef(format!("noop:{}", giveaway.id)))
    }

    async fn edit(&self, _message: &MessageRef, _update: &LiveUpdate) -> AppResult<()> {
        Ok(())
    }

    async fn announce_winners(
        &self,
        _giveaway: &giveaway::Model,
        _winners: &[giveaway_winner::Model],
    ) -> AppResult<()> {
        Ok(())
    }

    async fn claim_notice(
        &self,
        _giveaway: &giveaway::Model,
        _notice: &ClaimNotice,
    ) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct WebhookMessage {
    id: String,
}

/// Announcer backed by a Discord channel webhook.
#[derive(Clone)]
pub struct DiscordWebhookAnnouncer {
    webhook_url: String,
    http_client: Arc<reqwest::Client>,
}

impl DiscordWebhookAnnouncer {
    /// Create an announcer for `webhook_url`.
    pub fn new(webhook_url: impl Into<String>) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            webhook_url: webhook_url.into(),
            http_client: Arc::new(http_client),
        })
    }

    async fn post(&self, content: String) -> AppResult<WebhookMessage> {
        let response = self
            .http_client
            .post(format!("{}?wait=true", self.webhook_url))
            .json(&json!({ "content": content, "allowed_mentions": { "parse": ["users"] } }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Webhook returned HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook response: {e}")))
    }
}

fn timestamp_tag(at: DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

fn opening_text(giveaway: &giveaway::Model) -> String {
    let prize = giveaway.prize.as_deref().unwrap_or(&giveaway.title);
    format!(
        "**{}**\nPrize: {prize}\nWinners: {}\nEnds {}",
        giveaway.title,
        giveaway.winners_count,
        timestamp_tag(giveaway.ends_at)
    )
}

fn winners_text(giveaway: &giveaway::Model, winners: &[giveaway_winner::Model]) -> String {
    if winners.is_empty() {
        return format!("**{}** has ended with no eligible entrants.", giveaway.title);
    }
    let mentions: Vec<String> = winners.iter().map(|w| format!("<@{}>", w.user_id)).collect();
    let seed = giveaway.fair_rng_seed.as_deref().unwrap_or("-");
    format!(
        "**{}** has ended. Congratulations {}!\nDraw seed: `{seed}`",
        giveaway.title,
        mentions.join(", ")
    )
}

fn notice_text(giveaway: &giveaway::Model, notice: &ClaimNotice) -> String {
    match notice {
        ClaimNotice::Reminder {
            user_id,
            deadline,
            final_reminder,
        } => {
            let label = if *final_reminder { "Final reminder" } else { "Reminder" };
            format!(
                "{label}: <@{user_id}>, claim your prize from **{}** {}.",
                giveaway.title,
                timestamp_tag(*deadline)
            )
        }
        ClaimNotice::Claimed { user_id } => {
            format!("<@{user_id}> claimed their prize from **{}**.", giveaway.title)
        }
        ClaimNotice::Unclaimed { user_id } => format!(
            "<@{user_id}> did not claim their prize from **{}** in time.",
            giveaway.title
        ),
        ClaimNotice::NewWinner { user_id, deadline } => format!(
            "New winner for **{}**: <@{user_id}>! Claim it {}.",
            giveaway.title,
            timestamp_tag(*deadline)
        ),
    }
}

#[async_trait]
impl Announcer for DiscordWebhookAnnouncer {
    async fn publish(&self, giveaway: &giveaway::Model) -> AppResult<MessageRef> {
        let message = self.post(opening_text(giveaway)).await?;
        Ok(MessageRef(message.id))
    }

    async fn edit(&self, message: &MessageRef, update: &LiveUpdate) -> AppResult<()> {
        let content = format!(
            "Entries: {}\nEnds {}",
            update.entries_count,
            timestamp_tag(update.ends_at)
        );
        let response = self
            .http_client
            .patch(format!("{}/messages/{}", self.webhook_url, message.0))
            .json(&json!({ "content": content }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("Webhook edit failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Webhook edit returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn announce_winners(
        &self,
        giveaway: &giveaway::Model,
        winners: &[giveaway_winner::Model],
    ) -> AppResult<()> {
        self.post(winners_text(giveaway, winners)).await.map(|_| ())
    }

    async fn claim_notice(
        &self,
        giveaway: &giveaway::Model,
        notice: &ClaimNotice,
    ) -> AppResult<()> {
        self.post(notice_text(giveaway, notice)).await.map(|_| ())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use prizebot_db::entities::giveaway::{GiveawayOptions, GiveawayRules, GiveawayStatus};
    use prizebot_db::entities::giveaway_winner::WinnerMethod;

    fn ended_giveaway() -> giveaway::Model {
        let now = Utc::now();
        giveaway::Model {
            id: "g1".to_string(),
            guild_id: "guild".to_string(),
            channel_id: "chan".to_string(),
            host_id: "host".to_string(),
            title: "Mechanical keyboard".to_string(),
            prize: None,
            winners_count: 2,
            rules: GiveawayRules::default(),
            options: GiveawayOptions::default(),
            status: GiveawayStatus::Ended,
            scheduled_at: None,
            starts_at: Some(now),
            ends_at: now,
            ended_at: Some(now),
            cancelled_at: None,
            processing: false,
            processing_started_at: None,
            fair_rng_seed: Some("abc123".to_string()),
            winners_announced: false,
            entries_count: 3,
            last_live_update_at: None,
            announcement_message_id: None,
            created_at: now,
        }
    }

    #[test]
    fn test_winners_text_mentions_and_seed() {
        let winner = giveaway_winner::Model {
            id: "w1".to_string(),
            giveaway_id: "g1".to_string(),
            user_id: "42".to_string(),
            picked_at: Utc::now(),
            method: WinnerMethod::Initial,
            reroll_of: None,
            prize: None,
        };

        let text = winners_text(&ended_giveaway(), &[winner]);

        assert!(text.contains("<@42>"));
        assert!(text.contains("`abc123`"));
    }

    #[test]
    fn test_winners_text_empty() {
        let text = winners_text(&ended_giveaway(), &[]);
        assert!(text.contains("no eligible entrants"));
    }

    #[test]
    fn test_final_reminder_label() {
        let notice = ClaimNotice::Reminder {
            user_id: "7".to_string(),
            deadline: Utc::now(),
            final_reminder: true,
        };
        assert!(notice_text(&ended_giveaway(), &notice).starts_with("Final reminder"));
    }

    #[tokio::test]
    async fn test_noop_publish() {
        let message = NoOpAnnouncer.publish(&ended_giveaway()).await.unwrap();
        assert_eq!(message, MessageRef("noop:g1".to_string()));
    }
}
