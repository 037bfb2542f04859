//! Giveaway winner repository.

use std::sync::Arc;

use prizebot_common::AppResult;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Order, QueryFilter, QueryOrder, Set,
};

use crate::db_err;
use crate::entities::{GiveawayWinner, giveaway_winner};

/// Repository for drawn winners.
#[derive(Clone)]
pub struct WinnerRepository {
    db: Arc<DatabaseConnection>,
}

impl WinnerRepository {
    /// Create a new winner repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find winner by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<giveaway_winner::Model>> {
        GiveawayWinner::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Winners of a giveaway in pick order.
    pub async fn find_by_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_winner::Model>> {
        GiveawayWinner::find()
            .filter(giveaway_winner::Column::GiveawayId.eq(giveaway_id))
            .order_by(giveaway_winner::Column::PickedAt, Order::Asc)
            .order_by(giveaway_winner::Column::Id, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert a batch of winners in one statement.
    pub async fn create_many(&self, winners: Vec<giveaway_winner::Model>) -> AppResult<()> {
        if winners.is_empty() {
            return Ok(());
        }

        let rows = winners.into_iter().map(|w| giveaway_winner::ActiveModel {
            id: Set(w.id),
            giveaway_id: Set(w.giveaway_id),
            user_id: Set(w.user_id),
            picked_at: Set(w.picked_at),
            method: Set(w.method),
            reroll_of: Set(w.reroll_of),
            prize: Set(w.prize),
        });

        GiveawayWinner::insert_many(rows)
            .exec(self.db.as_ref())
            .await
            .map_err(db_err)?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::giveaway_winner::WinnerMethod;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_many_empty_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = WinnerRepository::new(db);
        assert!(repo.create_many(Vec::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_find_by_giveaway() {
        let winner = giveaway_winner::Model {
            id: "w1".to_string(),
            giveaway_id: "g1".to_string(),
            user_id: "alice".to_string(),
            picked_at: Utc::now(),
            method: WinnerMethod::Initial,
            reroll_of: None,
            prize: None,
        };

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[winner]])
                .into_connection(),
        );

        let repo = WinnerRepository::new(db);
        let winners = repo.find_by_giveaway("g1").await.unwrap();

        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].method, WinnerMethod::Initial);
    }
}
