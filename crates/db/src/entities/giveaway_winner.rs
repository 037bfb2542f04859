//! Giveaway winner entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How a winner was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum WinnerMethod {
    /// Drawn when the giveaway ended.
    #[sea_orm(string_value = "initial")]
    Initial,
    /// Drawn as a replacement.
    #[sea_orm(string_value = "reroll")]
    Reroll,
    /// Chosen by staff.
    #[sea_orm(string_value = "manual")]
    Manual,
}

/// Immutable record of one pick. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "giveaway_winner")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub giveaway_id: String,

    pub user_id: String,

    pub picked_at: DateTimeUtc,

    pub method: WinnerMethod,

    /// The winner record this pick replaces.
    #[sea_orm(nullable)]
    pub reroll_of: Option<String>,

    #[sea_orm(nullable)]
    pub prize: Option<String>,
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
