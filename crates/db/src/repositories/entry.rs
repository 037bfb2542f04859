//! Giveaway entry repository.

use std::sync::Arc;

use prizebot_common::AppResult;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};

use crate::db_err;
use crate::entities::{GiveawayEntry, giveaway_entry};
use crate::store::InsertOutcome;

/// Repository for giveaway entries.
#[derive(Clone)]
pub struct EntryRepository {
    db: Arc<DatabaseConnection>,
}

impl EntryRepository {
    /// Create a new entry repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All entries of a giveaway in join order.
    pub async fn find_by_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_entry::Model>> {
        GiveawayEntry::find()
            .filter(giveaway_entry::Column::GiveawayId.eq(giveaway_id))
            .order_by(giveaway_entry::Column::JoinedAt, Order::Asc)
            .order_by(giveaway_entry::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Count entries of a giveaway.
    pub async fn count_by_giveaway(&self, giveaway_id: &str) -> AppResult<u64> {
        GiveawayEntry::find()
            .filter(giveaway_entry::Column::GiveawayId.eq(giveaway_id))
            .count(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Find the entry of one member.
    pub async fn find_by_user(
        &self,
        giveaway_id: &str,
        user_id: &str,
    ) -> AppResult<Option<giveaway_entry::Model>> {
        GiveawayEntry::find()
            .filter(giveaway_entry::Column::GiveawayId.eq(giveaway_id))
            .filter(giveaway_entry::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert an entry. The unique index on `(giveaway_id, user_id)` reports duplicates.
    pub async fn create(
        &self,
        model: giveaway_entry::Model,
    ) -> AppResult<InsertOutcome<giveaway_entry::Model>> {
        let active_model = giveaway_entry::ActiveModel {
            id: Set(model.id),
            giveaway_id: Set(model.giveaway_id),
            user_id: Set(model.user_id),
            display_name: Set(model.display_name),
            joined_at: Set(model.joined_at),
            method: Set(model.method),
            weight: Set(model.weight),
            is_bot: Set(model.is_bot),
            suspicious_alt: Set(model.suspicious_alt),
        };

        match active_model.insert(self.db.as_ref()).await {
            Ok(entry) => Ok(InsertOutcome::Inserted(entry)),
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                Ok(InsertOutcome::Duplicate)
            }
            Err(err) => Err(db_err(err)),
        }
    }

    /// Delete the entry of one member.
    pub async fn delete_by_user(&self, giveaway_id: &str, user_id: &str) -> AppResult<bool> {
        let deleted = GiveawayEntry::delete_many()
            .filter(giveaway_entry::Column::GiveawayId.eq(giveaway_id))
            .filter(giveaway_entry::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(deleted.rows_affected > 0)
    }
}
