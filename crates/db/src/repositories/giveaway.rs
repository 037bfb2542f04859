//! Giveaway repository.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use prizebot_common::AppResult;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::{Expr, NullOrdering},
};

use crate::db_err;
use crate::entities::{
    Giveaway,
    giveaway::{self, GiveawayStatus},
};
use crate::store::{ConditionalUpdate, GiveawayGuard, GiveawayPatch};

/// Repository for giveaway documents.
#[derive(Clone)]
pub struct GiveawayRepository {
    db: Arc<DatabaseConnection>,
}

impl GiveawayRepository {
    /// Create a new giveaway repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find giveaway by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<giveaway::Model>> {
        Giveaway::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Insert a new giveaway.
    pub async fn create(&self, model: giveaway::Model) -> AppResult<giveaway::Model> {
        let active_model = giveaway::ActiveModel {
            id: Set(model.id),
            guild_id: Set(model.guild_id),
            channel_id: Set(model.channel_id),
            host_id: Set(model.host_id),
            title: Set(model.title),
            prize: Set(model.prize),
            winners_count: Set(model.winners_count),
            rules: Set(model.rules),
            options: Set(model.options),
            status: Set(model.status),
            scheduled_at: Set(model.scheduled_at),
            starts_at: Set(model.starts_at),
            ends_at: Set(model.ends_at),
            ended_at: Set(model.ended_at),
            cancelled_at: Set(model.cancelled_at),
            processing: Set(model.processing),
            processing_started_at: Set(model.processing_started_at),
            fair_rng_seed: Set(model.fair_rng_seed),
            winners_announced: Set(model.winners_announced),
            entries_count: Set(model.entries_count),
            last_live_update_at: Set(model.last_live_update_at),
            announcement_message_id: Set(model.announcement_message_id),
            created_at: Set(model.created_at),
        };

        active_model.insert(self.db.as_ref()).await.map_err(db_err)
    }

    /// Giveaways of a guild, newest first.
    pub async fn find_by_guild(
        &self,
        guild_id: &str,
        status: Option<GiveawayStatus>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        let mut query = Giveaway::find().filter(giveaway::Column::GuildId.eq(guild_id));
        if let Some(status) = status {
            query = query.filter(giveaway::Column::Status.eq(status));
        }

        query
            .order_by(giveaway::Column::CreatedAt, Order::Desc)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Apply `patch` in a single statement filtered by `guard`.
    ///
    /// The guard is part of the `WHERE` clause, so the check and the write
    /// are atomic with respect to concurrent callers.
    pub async fn update_if(
        &self,
        id: &str,
        guard: &GiveawayGuard,
        patch: &GiveawayPatch,
    ) -> AppResult<ConditionalUpdate<giveaway::Model>> {
        if *patch == GiveawayPatch::default() {
            let current = self.find_by_id(id).await?;
            return Ok(match current {
                Some(model) if guard.matches(&model) => ConditionalUpdate::Applied(model),
                other => ConditionalUpdate::Rejected(other),
            });
        }

        let mut update = Giveaway::update_many();
        if let Some(status) = patch.status {
            update = update.col_expr(giveaway::Column::Status, Expr::value(status.to_value()));
        }
        if let Some(processing) = patch.processing {
            update = update.col_expr(giveaway::Column::Processing, Expr::value(processing));
        }
        if let Some(started) = patch.processing_started_at {
            update = update.col_expr(giveaway::Column::ProcessingStartedAt, Expr::value(started));
        }
        if let Some(starts_at) = patch.starts_at {
            update = update.col_expr(giveaway::Column::StartsAt, Expr::value(starts_at));
        }
        if let Some(ended_at) = patch.ended_at {
            update = update.col_expr(giveaway::Column::EndedAt, Expr::value(ended_at));
        }
        if let Some(cancelled_at) = patch.cancelled_at {
            update = update.col_expr(giveaway::Column::CancelledAt, Expr::value(cancelled_at));
        }
        if let Some(seed) = &patch.fair_rng_seed {
            update = update.col_expr(giveaway::Column::FairRngSeed, Expr::value(seed.clone()));
        }
        if let Some(announced) = patch.winners_announced {
            update = update.col_expr(giveaway::Column::WinnersAnnounced, Expr::value(announced));
        }
        if let Some(at) = patch.last_live_update_at {
            update = update.col_expr(giveaway::Column::LastLiveUpdateAt, Expr::value(at));
        }
        if let Some(message_id) = &patch.announcement_message_id {
            update = update.col_expr(
                giveaway::Column::AnnouncementMessageId,
                Expr::value(message_id.clone()),
            );
        }
        if patch.entries_delta != 0 {
            update = update.col_expr(
                giveaway::Column::EntriesCount,
                Expr::col(giveaway::Column::EntriesCount).add(patch.entries_delta),
            );
        }

        let mut updated = update
            .filter(giveaway::Column::Id.eq(id))
            .filter(guard_condition(guard))
            .exec_with_returning(self.db.as_ref())
            .await
            .map_err(db_err)?;

        match updated.pop() {
            Some(model) => Ok(ConditionalUpdate::Applied(model)),
            None => Ok(ConditionalUpdate::Rejected(self.find_by_id(id).await?)),
        }
    }

    /// Scheduled giveaways whose start time has passed.
    pub async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        Giveaway::find()
            .filter(giveaway::Column::Status.eq(GiveawayStatus::Scheduled))
            .filter(giveaway::Column::ScheduledAt.lte(now))
            .order_by(giveaway::Column::ScheduledAt, Order::Asc)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Unlocked active giveaways past their end time.
    pub async fn find_due_active(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        Giveaway::find()
            .filter(giveaway::Column::Status.eq(GiveawayStatus::Active))
            .filter(giveaway::Column::Processing.eq(false))
            .filter(giveaway::Column::EndsAt.lte(now))
            .order_by(giveaway::Column::EndsAt, Order::Asc)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Ended giveaways still waiting for their winners announcement.
    pub async fn find_unannounced(&self, limit: u64) -> AppResult<Vec<giveaway::Model>> {
        Giveaway::find()
            .filter(giveaway::Column::Status.eq(GiveawayStatus::Ended))
            .filter(giveaway::Column::WinnersAnnounced.eq(false))
            .filter(giveaway::Column::Processing.eq(false))
            .order_by(giveaway::Column::EndedAt, Order::Asc)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Open active giveaways that have a public announcement to refresh.
    pub async fn find_live_update_candidates(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        Giveaway::find()
            .filter(giveaway::Column::Status.eq(GiveawayStatus::Active))
            .filter(giveaway::Column::Processing.eq(false))
            .filter(giveaway::Column::EndsAt.gt(now))
            .filter(giveaway::Column::AnnouncementMessageId.is_not_null())
            // Never-updated giveaways first, or a full batch could starve them.
            .order_by_with_nulls(
                giveaway::Column::LastLiveUpdateAt,
                Order::Asc,
                NullOrdering::First,
            )
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }

    /// Giveaways whose processing lock predates `cutoff`.
    pub async fn find_stale_locks(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        Giveaway::find()
            .filter(giveaway::Column::Processing.eq(true))
            .filter(giveaway::Column::ProcessingStartedAt.lt(cutoff))
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(db_err)
    }
}

fn guard_condition(guard: &GiveawayGuard) -> Condition {
    let mut condition = Condition::all();
    if !guard.status_in.is_empty() {
        condition = condition.add(giveaway::Column::Status.is_in(guard.status_in.iter().copied()));
    }
    if let Some(processing) = guard.processing {
        condition = condition.add(giveaway::Column::Processing.eq(processing));
    }
    if let Some(announced) = guard.winners_announced {
        condition = condition.add(giveaway::Column::WinnersAnnounced.eq(announced));
    }
    if let Some(at) = guard.scheduled_at_or_before {
        condition = condition.add(giveaway::Column::ScheduledAt.lte(at));
    }
    if let Some(cutoff) = guard.locked_before {
        condition = condition.add(giveaway::Column::ProcessingStartedAt.lt(cutoff));
    }
    if let Some(cap) = guard.entries_below {
        condition = condition.add(giveaway::Column::EntriesCount.lt(cap));
    }
    condition
}
