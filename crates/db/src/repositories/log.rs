//! Giveaway audit log repository.

use std::sync::Arc;

use prizebot_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter,
    QueryOrder, Set,
};

use crate::db_err;
use crate::entities::{GiveawayLog, giveaway_log};

/// Append-only repository for audit records.
#[derive(Clone)]
pub struct LogRepository {
    db: Arc<DatabaseConnection>,
}

impl LogRepository {
    /// Create a new log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append one record. Records are never updated.
    pub async fn append(&self, model: giveaway_log::Model) -> AppResult<()> {
        giveaway_log::ActiveModel {
            id: Set(model.id),
            giveaway_id: Set(model.giveaway_id),
            actor: Set(model.actor),
            action: Set(model.action),
            payload: Set(model.payload),
            created_at: Set(model.created_at),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Records of a giveaway, oldest first.
    pub async fn find_by_giveaway(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_log::Model>> {
        GiveawayLog::find()
            .filter(giveaway_log::Column::GiveawayId.eq(giveaway_id))
            .order_by(giveaway_log::Column::CreatedAt, Order::Asc)
            .order_by(giveaway_log::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}
