//! Giveaway entry entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a member entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum EntryMethod {
    #[sea_orm(string_value = "button")]
    Button,
    #[sea_orm(string_value = "command")]
    Command,
    #[sea_orm(string_value = "dashboard")]
    Dashboard,
    /// Added by staff.
    #[sea_orm(string_value = "manual")]
    Manual,
}

/// One member's participation in one giveaway. Unique per (giveaway, user).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaway_entry")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub giveaway_id: String,

    pub user_id: String,

    /// Display name at the time of entry.
    pub display_name: String,

    pub joined_at: DateTimeUtc,

    pub method: EntryMethod,

    /// Draw weight, at least 1.
    pub weight: i32,

    pub is_bot: bool,

    /// Flagged by moderation as a probable alternate account.
    pub suspicious_alt: bool,
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
}

impl Related<super::giveaway::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Giveaway.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
