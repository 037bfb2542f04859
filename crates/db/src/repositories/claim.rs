//! Prize claim repository.

use std::sync::Arc;

use prizebot_common::AppResult;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};

use crate::db_err;
use crate::entities::{
    GiveawayClaim,
    giveaway_claim::{self, ClaimStatus},
};
use crate::store::{ClaimGuard, ClaimPatch, ConditionalUpdate};

/// Repository for prize claims.
#[derive(Clone)]
pub struct ClaimRepository {
    db: Arc<DatabaseConnection>,
}

impl ClaimRepository {
    /// Create a new claim repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find claim by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<giveaway_claim::Model>> {
        GiveawayClaim::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert a new claim.
    pub async fn create(&self, model: giveaway_claim::Model) -> AppResult<giveaway_claim::Model> {
        giveaway_claim::ActiveModel {
            id: Set(model.id),
            winner_id: Set(model.winner_id),
            user_id: Set(model.user_id),
            giveaway_id: Set(model.giveaway_id),
            created_at: Set(model.created_at),
            claim_deadline_at: Set(model.claim_deadline_at),
            status: Set(model.status),
            reroll_count: Set(model.reroll_count),
            previous_claim_id: Set(model.previous_claim_id),
            first_reminder_sent: Set(model.first_reminder_sent),
            final_reminder_sent: Set(model.final_reminder_sent),
            conversation_ref: Set(model.conversation_ref),
            conversation_opened_at: Set(model.conversation_opened_at),
            claimed_at: Set(model.claimed_at),
            response_excerpt: Set(model.response_excerpt),
            resolved_at: Set(model.resolved_at),
        }
        .insert(self.db.as_ref())
        .await
        .map_err(db_err)
    }

    /// Pending claims, earliest deadline first.
    pub async fn find_pending(&self, limit: u64) -> AppResult<Vec<giveaway_claim::Model>> {
        GiveawayClaim::find()
            .filter(giveaway_claim::Column::Status.eq(ClaimStatus::Pending))
            .order_by(giveaway_claim::Column::ClaimDeadlineAt, Order::Asc)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// All claims of a giveaway, oldest first.
    pub async fn find_by_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_claim::Model>> {
        GiveawayClaim::find()
            .filter(giveaway_claim::Column::GiveawayId.eq(giveaway_id))
            .order_by(giveaway_claim::Column::CreatedAt, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Apply `patch` in a single statement filtered by `guard`.
    pub async fn update_if(
        &self,
        id: &str,
        guard: &ClaimGuard,
        patch: &ClaimPatch,
    ) -> AppResult<ConditionalUpdate<giveaway_claim::Model>> {
        if *patch == ClaimPatch::default() {
            let current = self.find_by_id(id).await?;
            return Ok(match current {
                Some(model) if guard.matches(&model) => ConditionalUpdate::Applied(model),
                other => ConditionalUpdate::Rejected(other),
            });
        }

        let mut update = GiveawayClaim::update_many();
        if let Some(status) = patch.status {
            update = update.col_expr(giveaway_claim::Column::Status, Expr::value(status.to_value()));
        }
        if let Some(sent) = patch.first_reminder_sent {
            update = update.col_expr(giveaway_claim::Column::FirstReminderSent, Expr::value(sent));
        }
        if let Some(sent) = patch.final_reminder_sent {
            update = update.col_expr(giveaway_claim::Column::FinalReminderSent, Expr::value(sent));
        }
        if let Some(conversation) = &patch.conversation_ref {
            update = update.col_expr(
                giveaway_claim::Column::ConversationRef,
                Expr::value(conversation.clone()),
            );
        }
        if let Some(at) = patch.conversation_opened_at {
            update = update.col_expr(giveaway_claim::Column::ConversationOpenedAt, Expr::value(at));
        }
        if let Some(at) = patch.claimed_at {
            update = update.col_expr(giveaway_claim::Column::ClaimedAt, Expr::value(at));
        }
        if let Some(excerpt) = &patch.response_excerpt {
            update = update.col_expr(
                giveaway_claim::Column::ResponseExcerpt,
                Expr::value(excerpt.clone()),
            );
        }
        if let Some(resolved) = patch.resolved_at {
            update = update.col_expr(giveaway_claim::Column::ResolvedAt, Expr::value(resolved));
        }

        let mut condition = Condition::all().add(giveaway_claim::Column::Id.eq(id));
        if let Some(status) = guard.status {
            condition = condition.add(giveaway_claim::Column::Status.eq(status));
        }
        if let Some(sent) = guard.first_reminder_sent {
            condition = condition.add(giveaway_claim::Column::FirstReminderSent.eq(sent));
        }
        if let Some(sent) = guard.final_reminder_sent {
            condition = condition.add(giveaway_claim::Column::FinalReminderSent.eq(sent));
        }

        let mut updated = update
            .filter(condition)
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(db_err)?;

        match updated.pop() {
            Some(model) => Ok(ConditionalUpdate::Applied(model)),
            None => Ok(ConditionalUpdate::Rejected(self.find_by_id(id).await?)),
        }
    }
}
