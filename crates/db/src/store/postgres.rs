//! `PostgreSQL` store built on the sea-orm repositories.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prizebot_common::AppResult;
use sea_orm::DatabaseConnection;

use super::{
    ClaimGuard, ClaimPatch, ConditionalUpdate, GiveawayGuard, GiveawayPatch, GiveawayStore,
    InsertOutcome,
};
use crate::entities::{
    giveaway::{self, GiveawayStatus},
    giveaway_claim, giveaway_entry, giveaway_log, giveaway_winner,
};
use crate::repositories::{
    ClaimRepository, EntryRepository, GiveawayRepository, LogRepository, WinnerRepository,
};

/// Store backed by a shared database connection pool.
#[derive(Clone)]
pub struct SeaOrmStore {
    giveaways: GiveawayRepository,
    entries: EntryRepository,
    winners: WinnerRepository,
    claims: ClaimRepository,
    logs: LogRepository,
}

impl SeaOrmStore {
    /// Create a store over a migrated connection.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            giveaways: GiveawayRepository::new(Arc::clone(&db)),
            entries: EntryRepository::new(Arc::clone(&db)),
            winners: WinnerRepository::new(Arc::clone(&db)),
            claims: ClaimRepository::new(Arc::clone(&db)),
            logs: LogRepository::new(db),
        }
    }
}

#[async_trait]
impl GiveawayStore for SeaOrmStore {
    async fn insert_giveaway(&self, giveaway: giveaway::Model) -> AppResult<giveaway::Model> {
        self.giveaways.create(giveaway).await
    }

    async fn find_giveaway(&self, id: &str) -> AppResult<Option<giveaway::Model>> {
        self.giveaways.find_by_id(id).await
    }

    async fn list_by_guild(
        &self,
        guild_id: &str,
        status: Option<GiveawayStatus>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.giveaways.find_by_guild(guild_id, status, limit).await
    }

    async fn update_giveaway_if(
        &self,
        id: &str,
        guard: &GiveawayGuard,
        patch: &GiveawayPatch,
    ) -> AppResult<ConditionalUpdate<giveaway::Model>> {
        self.giveaways.update_if(id, guard, patch).await
    }

    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.giveaways.find_due_scheduled(now, limit).await
    }

    async fn find_due_active(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.giveaways.find_due_active(now, limit).await
    }

    async fn find_unannounced(&self, limit: u64) -> AppResult<Vec<giveaway::Model>> {
        self.giveaways.find_unannounced(limit).await
    }

    async fn find_live_update_candidates(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.giveaways.find_live_update_candidates(now, limit).await
    }

    async fn find_stale_locks(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.giveaways.find_stale_locks(cutoff, limit).await
    }

    async fn find_entries(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_entry::Model>> {
        self.entries.find_by_giveaway(giveaway_id).await
    }

    async fn count_entries(&self, giveaway_id: &str) -> AppResult<u64> {
        self.entries.count_by_giveaway(giveaway_id).await
    }

    async fn find_entry(
        &self,
        giveaway_id: &str,
        user_id: &str,
    ) -> AppResult<Option<giveaway_entry::Model>> {
        self.entries.find_by_user(giveaway_id, user_id).await
    }

    async fn insert_entry(
        &self,
        entry: giveaway_entry::Model,
    ) -> AppResult<InsertOutcome<giveaway_entry::Model>> {
        self.entries.create(entry).await
    }

    async fn delete_entry(&self, giveaway_id: &str, user_id: &str) -> AppResult<bool> {
        self.entries.delete_by_user(giveaway_id, user_id).await
    }

    async fn insert_winners(&self, winners: Vec<giveaway_winner::Model>) -> AppResult<()> {
        self.winners.create_many(winners).await
    }

    async fn find_winners(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_winner::Model>> {
        self.winners.find_by_giveaway(giveaway_id).await
    }

    async fn find_winner(&self, id: &str) -> AppResult<Option<giveaway_winner::Model>> {
        self.winners.find_by_id(id).await
    }

    async fn insert_claim(
        &self,
        claim: giveaway_claim::Model,
    ) -> AppResult<giveaway_claim::Model> {
        self.claims.create(claim).await
    }

    async fn find_claim(&self, id: &str) -> AppResult<Option<giveaway_claim::Model>> {
        self.claims.find_by_id(id).await
    }

    async fn find_pending_claims(&self, limit: u64) -> AppResult<Vec<giveaway_claim::Model>> {
        self.claims.find_pending(limit).await
    }

    async fn find_claims_for_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_claim::Model>> {
        self.claims.find_by_giveaway(giveaway_id).await
    }

    async fn update_claim_if(
        &self,
        id: &str,
        guard: &ClaimGuard,
        patch: &ClaimPatch,
    ) -> AppResult<ConditionalUpdate<giveaway_claim::Model>> {
        self.claims.update_if(id, guard, patch).await
    }

    async fn append_log(&self, log: giveaway_log::Model) -> AppResult<()> {
        self.logs.append(log).await
    }

    async fn find_logs(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_log::Model>> {
        self.logs.find_by_giveaway(giveaway_id).await
    }
}
