//! Prize claim entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Claim status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    /// Waiting for the winner to respond.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// The winner responded.
    #[sea_orm(string_value = "claimed")]
    Claimed,
    /// The deadline passed without a response.
    #[sea_orm(string_value = "unclaimed")]
    Unclaimed,
    /// A successor claim replaced this one.
    #[sea_orm(string_value = "rerolled")]
    Rerolled,
}

/// Follow-up record for one winner.
///
/// Successive re-rolls form a singly linked chain through `previous_claim_id`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaway_claim")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub winner_id: String,

    pub user_id: String,

    #[sea_orm(indexed)]
    pub giveaway_id: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(indexed)]
    pub claim_deadline_at: DateTimeUtc,

    #[sea_orm(indexed)]
    pub status: ClaimStatus,

    pub reroll_count: i32,

    #[sea_orm(nullable)]
    pub previous_claim_id: Option<String>,

    /// Set once the first (24h by default) reminder went out.
    pub first_reminder_sent: bool,

    /// Set once the final (6h by default) reminder went out.
    pub final_reminder_sent: bool,

    /// External conversation (for example a support thread) watched for replies.
    #[sea_orm(nullable)]
    pub conversation_ref: Option<String>,

    #[sea_orm(nullable)]
    pub conversation_opened_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub claimed_at: Option<DateTimeUtc>,

    #[sea_orm(column_type = "Text", nullable)]
    pub response_excerpt: Option<String>,

    /// When the claim left `pending`.
    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::giveaway::Entity",
        from = "Column::GiveawayId",
        to = "super::giveaway::Column::Id",
        on_delete = "Cascade"
    )]
    Giveaway,
    #[sea_orm(
        belongs_to = "super::giveaway_winner::Entity",
        from = "Column::WinnerId",
        to = "super::giveaway_winner::Column::Id",
        on_delete = "Cascade"
    )]
    Winner,
}

impl Related<super::giveaway::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Giveaway.def()
    }
}

impl Related<super::giveaway_winner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Winner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
