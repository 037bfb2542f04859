//! Persistence seam for the giveaway engine.
//!
//! Every state transition that can race goes through a conditional update:
//! the store applies the patch only when the guard still matches the stored
//! document, and reports which of the two happened. This is what keeps two
//! concurrent End attempts from both drawing winners.

mod memory;
mod postgres;

pub use memory::{FaultPoint, MemoryStore, StoreFailure};
pub use postgres::SeaOrmStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prizebot_common::AppResult;

use crate::entities::{
    giveaway::{self, GiveawayStatus},
    giveaway_claim::{self, ClaimStatus},
    giveaway_entry, giveaway_log, giveaway_winner,
};

/// Result of a guarded write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalUpdate<T> {
    /// The guard matched and the patch was applied. Holds the new document.
    Applied(T),
    /// The guard did not match. Holds the current document if it exists.
    Rejected(Option<T>),
}

impl<T> ConditionalUpdate<T> {
    /// The updated document, if the write went through.
    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(doc) => Some(doc),
            Self::Rejected(_) => None,
        }
    }

    /// Whether the write went through.
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Result of an insert into a uniquely-keyed collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<T> {
    Inserted(T),
    /// A row with the same unique key already exists.
    Duplicate,
}

/// Preconditions on a stored giveaway. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiveawayGuard {
    /// Status must be one of these. Empty matches any status.
    pub status_in: Vec<GiveawayStatus>,
    /// Processing lock must be held (`true`) or free (`false`).
    pub processing: Option<bool>,
    /// Winners must or must not have been announced.
    pub winners_announced: Option<bool>,
    /// `scheduled_at` must be set and not later than this instant.
    pub scheduled_at_or_before: Option<DateTime<Utc>>,
    /// `processing_started_at` must be set and strictly earlier than this instant.
    pub locked_before: Option<DateTime<Utc>>,
    /// `entries_count` must be strictly below this value.
    pub entries_below: Option<i32>,
}

impl GiveawayGuard {
    /// Guard on a single status.
    #[must_use]
    pub fn status(status: GiveawayStatus) -> Self {
        Self {
            status_in: vec![status],
            ..Self::default()
        }
    }

    /// Guard on a status with the processing lock free.
    #[must_use]
    pub fn unlocked(status: GiveawayStatus) -> Self {
        Self {
            status_in: vec![status],
            processing: Some(false),
            ..Self::default()
        }
    }

    /// Whether `model` satisfies every set precondition.
    #[must_use]
    pub fn matches(&self, model: &giveaway::Model) -> bool {
        if !self.status_in.is_empty() && !self.status_in.contains(&model.status) {
            return false;
        }
        if self.processing.is_some_and(|p| p != model.processing) {
            return false;
        }
        if self
            .winners_announced
            .is_some_and(|a| a != model.winners_announced)
        {
            return false;
        }
        if let Some(limit) = self.scheduled_at_or_before {
            if !model.scheduled_at.is_some_and(|at| at <= limit) {
                return false;
            }
        }
        if let Some(cutoff) = self.locked_before {
            if !model.processing_started_at.is_some_and(|at| at < cutoff) {
                return false;
            }
        }
        if let Some(cap) = self.entries_below {
            if model.entries_count >= cap {
                return false;
            }
        }
        true
    }
}

/// Field changes for a giveaway. `None` leaves a field untouched.
///
/// Nullable columns use `Option<Option<_>>` so a patch can clear them.
/// Fields are named after the columns they set.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GiveawayPatch {
    pub status: Option<GiveawayStatus>,
    pub processing: Option<bool>,
    pub processing_started_at: Option<Option<DateTime<Utc>>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ended_at: Option<Option<DateTime<Utc>>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub fair_rng_seed: Option<String>,
    pub winners_announced: Option<bool>,
    pub last_live_update_at: Option<DateTime<Utc>>,
    pub announcement_message_id: Option<String>,
    /// Added to `entries_count`. Zero leaves the counter alone.
    pub entries_delta: i32,
}

impl GiveawayPatch {
    /// Apply the patch to an in-memory model.
    pub fn apply(&self, model: &mut giveaway::Model) {
        if let Some(status) = self.status {
            model.status = status;
        }
        if let Some(processing) = self.processing {
            model.processing = processing;
        }
        if let Some(started) = self.processing_started_at {
            model.processing_started_at = started;
        }
        if let Some(starts_at) = self.starts_at {
            model.starts_at = Some(starts_at);
        }
        if let Some(ended_at) = self.ended_at {
            model.ended_at = ended_at;
        }
        if let Some(cancelled_at) = self.cancelled_at {
            model.cancelled_at = Some(cancelled_at);
        }
        if let Some(seed) = &self.fair_rng_seed {
            model.fair_rng_seed = Some(seed.clone());
        }
        if let Some(announced) = self.winners_announced {
            model.winners_announced = announced;
        }
        if let Some(at) = self.last_live_update_at {
            model.last_live_update_at = Some(at);
        }
        if let Some(message_id) = &self.announcement_message_id {
            model.announcement_message_id = Some(message_id.clone());
        }
        model.entries_count += self.entries_delta;
    }
}

/// Preconditions on a stored claim. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimGuard {
    /// Claim must be in this status.
    pub status: Option<ClaimStatus>,
    /// First reminder flag must have this value.
    pub first_reminder_sent: Option<bool>,
    /// Final reminder flag must have this value.
    pub final_reminder_sent: Option<bool>,
}

impl ClaimGuard {
    /// Guard on a single status.
    #[must_use]
    pub fn status(status: ClaimStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether `model` satisfies every set precondition.
    #[must_use]
    pub fn matches(&self, model: &giveaway_claim::Model) -> bool {
        self.status.is_none_or(|s| s == model.status)
            && self
                .first_reminder_sent
                .is_none_or(|f| f == model.first_reminder_sent)
            && self
                .final_reminder_sent
                .is_none_or(|f| f == model.final_reminder_sent)
    }
}

/// Field changes for a claim, named after the columns they set.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPatch {
    pub status: Option<ClaimStatus>,
    pub first_reminder_sent: Option<bool>,
    pub final_reminder_sent: Option<bool>,
    pub conversation_ref: Option<String>,
    pub conversation_opened_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub response_excerpt: Option<String>,
    pub resolved_at: Option<Option<DateTime<Utc>>>,
}

impl ClaimPatch {
    /// Apply the patch to an in-memory model.
    pub fn apply(&self, model: &mut giveaway_claim::Model) {
        if let Some(status) = self.status {
            model.status = status;
        }
        if let Some(sent) = self.first_reminder_sent {
            model.first_reminder_sent = sent;
        }
        if let Some(sent) = self.final_reminder_sent {
            model.final_reminder_sent = sent;
        }
        if let Some(conversation) = &self.conversation_ref {
            model.conversation_ref = Some(conversation.clone());
        }
        if let Some(at) = self.conversation_opened_at {
            model.conversation_opened_at = Some(at);
        }
        if let Some(at) = self.claimed_at {
            model.claimed_at = Some(at);
        }
        if let Some(excerpt) = &self.response_excerpt {
            model.response_excerpt = Some(excerpt.clone());
        }
        if let Some(resolved) = self.resolved_at {
            model.resolved_at = resolved;
        }
    }
}

/// Storage operations used by the lifecycle, claim and scheduler services.
#[async_trait]
pub trait GiveawayStore: Send + Sync {
    // ==================== Giveaways ====================

    async fn insert_giveaway(&self, giveaway: giveaway::Model) -> AppResult<giveaway::Model>;

    async fn find_giveaway(&self, id: &str) -> AppResult<Option<giveaway::Model>>;

    /// Giveaways of a guild, newest first.
    async fn list_by_guild(
        &self,
        guild_id: &str,
        status: Option<GiveawayStatus>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>>;

    /// Apply `patch` only if `guard` matches the stored giveaway.
    async fn update_giveaway_if(
        &self,
        id: &str,
        guard: &GiveawayGuard,
        patch: &GiveawayPatch,
    ) -> AppResult<ConditionalUpdate<giveaway::Model>>;

    /// Scheduled giveaways whose start time has passed.
    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>>;

    /// Unlocked active giveaways whose end time has passed, oldest deadline first.
    async fn find_due_active(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>>;

    /// Ended, unlocked giveaways whose winners were not announced yet.
    async fn find_unannounced(&self, limit: u64) -> AppResult<Vec<giveaway::Model>>;

    /// Unlocked active giveaways that are still open and have an announcement.
    async fn find_live_update_candidates(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>>;

    /// Giveaways whose processing lock was taken before `cutoff`.
    async fn find_stale_locks(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>>;

    // ==================== Entries ====================

    /// All entries of a giveaway ordered by `(joined_at, id)`.
    async fn find_entries(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_entry::Model>>;

    async fn count_entries(&self, giveaway_id: &str) -> AppResult<u64>;

    async fn find_entry(
        &self,
        giveaway_id: &str,
        user_id: &str,
    ) -> AppResult<Option<giveaway_entry::Model>>;

    /// Insert an entry, reporting a duplicate `(giveaway_id, user_id)` pair.
    async fn insert_entry(
        &self,
        entry: giveaway_entry::Model,
    ) -> AppResult<InsertOutcome<giveaway_entry::Model>>;

    /// Delete an entry. Returns whether a row was removed.
    async fn delete_entry(&self, giveaway_id: &str, user_id: &str) -> AppResult<bool>;

    // ==================== Winners ====================

    async fn insert_winners(&self, winners: Vec<giveaway_winner::Model>) -> AppResult<()>;

    /// Winners of a giveaway in pick order.
    async fn find_winners(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_winner::Model>>;

    async fn find_winner(&self, id: &str) -> AppResult<Option<giveaway_winner::Model>>;

    // ==================== Claims ====================

    async fn insert_claim(
        &self,
        claim: giveaway_claim::Model,
    ) -> AppResult<giveaway_claim::Model>;

    async fn find_claim(&self, id: &str) -> AppResult<Option<giveaway_claim::Model>>;

    /// Pending claims, earliest deadline first.
    async fn find_pending_claims(&self, limit: u64) -> AppResult<Vec<giveaway_claim::Model>>;

    async fn find_claims_for_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_claim::Model>>;

    async fn update_claim_if(
        &self,
        id: &str,
        guard: &ClaimGuard,
        patch: &ClaimPatch,
    ) -> AppResult<ConditionalUpdate<giveaway_claim::Model>>;

    // ==================== Audit log ====================

    async fn append_log(&self, log: giveaway_log::Model) -> AppResult<()>;

    /// Log records of a giveaway, oldest first.
    async fn find_logs(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_log::Model>>;
}
