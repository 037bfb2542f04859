//! Giveaway entity.

use std::collections::BTreeMap;

use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Giveaway lifecycle status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum GiveawayStatus {
    /// Being prepared, not visible to members.
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Waiting for `scheduled_at`.
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Accepting entries.
    #[sea_orm(string_value = "active")]
    Active,
    /// Winners drawn. Re-rolls may still append winners.
    #[sea_orm(string_value = "ended")]
    Ended,
    /// Stopped by staff before ending.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl GiveawayStatus {
    /// Whether no further status change is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }

    /// Lowercase name used in logs and API payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Active => "active",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Entry requirements and weighting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(default, rename_all = "camelCase")]
pub struct GiveawayRules {
    /// Members must hold at least one of these roles. Empty means no requirement.
    pub required_role_ids: Vec<String>,
    /// Minimum time since the member joined the guild, in seconds.
    pub min_membership_secs: i64,
    /// Accepted member locales. Empty means any locale.
    pub allowed_locales: Vec<String>,
    /// Maximum number of entries, `0` for unlimited.
    pub entrants_cap: i32,
    /// Entry weight granted per role id. The highest matching multiplier wins.
    pub role_weights: BTreeMap<String, i32>,
}

/// Presentation and behaviour switches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(default, rename_all = "camelCase")]
pub struct GiveawayOptions {
    /// Staff and expired claims may draw replacement winners.
    pub allow_reroll: bool,
    pub auto_pin: bool,
    /// Send winners a direct message in addition to the public announcement.
    pub dm_winners: bool,
    /// Seconds between live announcement edits, `0` disables live updates.
    pub live_update_interval_secs: i64,
    /// Bot accounts keep their entry but can never be drawn.
    pub exclude_bots: bool,
    /// Entries flagged as suspicious alts can never be drawn.
    pub exclude_suspicious: bool,
}

impl Default for GiveawayOptions {
    fn default() -> Self {
        Self {
            allow_reroll: true,
            auto_pin: false,
            dm_winners: true,
            live_update_interval_secs: 0,
            exclude_bots: true,
            exclude_suspicious: false,
        }
    }
}

/// A timed prize drawing.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaway")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Guild (tenant) owning this giveaway.
    #[sea_orm(indexed)]
    pub guild_id: String,

    /// Channel the public announcement lives in.
    pub channel_id: String,

    /// Staff member who created the giveaway.
    pub host_id: String,

    pub title: String,

    /// Prize label copied onto each winner record.
    #[sea_orm(nullable)]
    pub prize: Option<String>,

    pub winners_count: i32,

    #[sea_orm(column_type = "JsonBinary")]
    pub rules: GiveawayRules,

    #[sea_orm(column_type = "JsonBinary")]
    pub options: GiveawayOptions,

    #[sea_orm(indexed)]
    pub status: GiveawayStatus,

    #[sea_orm(nullable)]
    pub scheduled_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub starts_at: Option<DateTimeUtc>,

    #[sea_orm(indexed)]
    pub ends_at: DateTimeUtc,

    #[sea_orm(nullable)]
    pub ended_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub cancelled_at: Option<DateTimeUtc>,

    /// Single-document mutex held for the duration of one End or Reroll.
    pub processing: bool,

    #[sea_orm(nullable)]
    pub processing_started_at: Option<DateTimeUtc>,

    /// Seed published so anyone can replay the draw.
    #[sea_orm(nullable)]
    pub fair_rng_seed: Option<String>,

    pub winners_announced: bool,

    /// Denormalized entry counter, maintained by conditional updates.
    pub entries_count: i32,

    #[sea_orm(nullable)]
    pub last_live_update_at: Option<DateTimeUtc>,

    /// External reference of the public announcement message.
    #[sea_orm(nullable)]
    pub announcement_message_id: Option<String>,

    pub created_at: DateTimeUtc,
}

impl Model {
    /// Whether entries are currently accepted at `now`.
    #[must_use]
    pub fn is_open_at(&self, now: DateTimeUtc) -> bool {
        self.status == GiveawayStatus::Active && self.ends_at > now
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::giveaway_entry::Entity")]
    Entries,
    #[sea_orm(has_many = "super::giveaway_winner::Entity")]
    Winners,
    #[sea_orm(has_many = "super::giveaway_claim::Entity")]
    Claims,
    #[sea_orm(has_many = "super::giveaway_log::Entity")]
    Logs,
}

impl Related<super::giveaway_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Entries.def()
    }
}

impl Related<super::giveaway_winner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Winners.def()
    }
}

impl Related<super::giveaway_claim::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Claims.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
