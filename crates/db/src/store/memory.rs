//! In-process store.
//!
//! Backs `database.url = "memory://"` and the service tests. A single mutex
//! serializes every operation, which gives conditional updates the same
//! atomicity the SQL store gets from its `WHERE` clause.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prizebot_common::{AppError, AppResult};
use tokio::sync::Mutex;

use super::{
    ClaimGuard, ClaimPatch, ConditionalUpdate, GiveawayGuard, GiveawayPatch, GiveawayStore,
    InsertOutcome,
};
use crate::entities::{
    giveaway::{self, GiveawayStatus},
    giveaway_claim::{self, ClaimStatus},
    giveaway_entry, giveaway_log, giveaway_winner,
};

/// Failure the memory store can be told to return from every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailure {
    /// Behave like a database that rejects our credentials.
    Unauthorized,
    /// Behave like an unreachable database.
    Unavailable,
}

/// A single write the memory store can be told to fail once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// A giveaway update whose patch moves the status to this value.
    StatusChange(GiveawayStatus),
    /// Any claim insert.
    ClaimInsert,
}

#[derive(Default)]
struct State {
    giveaways: HashMap<String, giveaway::Model>,
    entries: Vec<giveaway_entry::Model>,
    winners: Vec<giveaway_winner::Model>,
    claims: HashMap<String, giveaway_claim::Model>,
    logs: Vec<giveaway_log::Model>,
    faults: Vec<FaultPoint>,
}

impl State {
    fn trip(&mut self, point: FaultPoint) -> AppResult<()> {
        match self.faults.iter().position(|f| *f == point) {
            Some(index) => {
                self.faults.remove(index);
                Err(AppError::Database(format!("injected fault: {point:?}")))
            }
            None => Ok(()),
        }
    }
}

/// Store keeping every document in process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    failure: AtomicU8,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail, or recover with `None`.
    pub fn set_failure(&self, failure: Option<StoreFailure>) {
        let code = match failure {
            None => 0,
            Some(StoreFailure::Unauthorized) => 1,
            Some(StoreFailure::Unavailable) => 2,
        };
        self.failure.store(code, Ordering::SeqCst);
    }

    /// Fail the next write matching `point`. Later writes succeed again.
    pub async fn fail_once(&self, point: FaultPoint) {
        self.state.lock().await.faults.push(point);
    }

    fn check(&self) -> AppResult<()> {
        match self.failure.load(Ordering::SeqCst) {
            1 => Err(AppError::StoreUnauthorized(
                "password authentication failed".to_string(),
            )),
            2 => Err(AppError::Database("connection refused".to_string())),
            _ => Ok(()),
        }
    }
}

fn take_sorted<T>(
    mut items: Vec<T>,
    limit: u64,
    key: impl Fn(&T, &T) -> std::cmp::Ordering,
) -> Vec<T> {
    items.sort_by(key);
    items.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    items
}

#[async_trait]
impl GiveawayStore for MemoryStore {
    async fn insert_giveaway(&self, giveaway: giveaway::Model) -> AppResult<giveaway::Model> {
        self.check()?;
        let mut state = self.state.lock().await;
        if state.giveaways.contains_key(&giveaway.id) {
            return Err(AppError::Conflict(format!("Giveaway exists: {}", giveaway.id)));
        }
        state.giveaways.insert(giveaway.id.clone(), giveaway.clone());
        Ok(giveaway)
    }

    async fn find_giveaway(&self, id: &str) -> AppResult<Option<giveaway::Model>> {
        self.check()?;
        Ok(self.state.lock().await.giveaways.get(id).cloned())
    }

    async fn list_by_guild(
        &self,
        guild_id: &str,
        status: Option<GiveawayStatus>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .giveaways
            .values()
            .filter(|g| g.guild_id == guild_id && status.is_none_or(|s| s == g.status))
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| b.created_at.cmp(&a.created_at)))
    }

    async fn update_giveaway_if(
        &self,
        id: &str,
        guard: &GiveawayGuard,
        patch: &GiveawayPatch,
    ) -> AppResult<ConditionalUpdate<giveaway::Model>> {
        self.check()?;
        let mut state = self.state.lock().await;
        let matched = state.giveaways.get(id).map(|model| guard.matches(model));
        if matched == Some(true) {
            if let Some(status) = patch.status {
                state.trip(FaultPoint::StatusChange(status))?;
            }
        }
        let Some(model) = state.giveaways.get_mut(id) else {
            return Ok(ConditionalUpdate::Rejected(None));
        };
        if !guard.matches(model) {
            return Ok(ConditionalUpdate::Rejected(Some(model.clone())));
        }
        patch.apply(model);
        Ok(ConditionalUpdate::Applied(model.clone()))
    }

    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .giveaways
            .values()
            .filter(|g| {
                g.status == GiveawayStatus::Scheduled && g.scheduled_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| a.scheduled_at.cmp(&b.scheduled_at)))
    }

    async fn find_due_active(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .giveaways
            .values()
            .filter(|g| g.status == GiveawayStatus::Active && !g.processing && g.ends_at <= now)
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| a.ends_at.cmp(&b.ends_at)))
    }

    async fn find_unannounced(&self, limit: u64) -> AppResult<Vec<giveaway::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .giveaways
            .values()
            .filter(|g| {
                g.status == GiveawayStatus::Ended && !g.winners_announced && !g.processing
            })
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| a.ended_at.cmp(&b.ended_at)))
    }

    async fn find_live_update_candidates(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .giveaways
            .values()
            .filter(|g| {
                g.status == GiveawayStatus::Active
                    && !g.processing
                    && g.ends_at > now
                    && g.announcement_message_id.is_some()
            })
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| {
            a.last_live_update_at.cmp(&b.last_live_update_at)
        }))
    }

    async fn find_stale_locks(
        &self,
        cutoff: DateTime<Utc>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .giveaways
            .values()
            .filter(|g| g.processing && g.processing_started_at.is_some_and(|at| at < cutoff))
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| {
            a.processing_started_at.cmp(&b.processing_started_at)
        }))
    }

    async fn find_entries(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_entry::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let mut entries: Vec<_> = state
            .entries
            .iter()
            .filter(|e| e.giveaway_id == giveaway_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| (a.joined_at, &a.id).cmp(&(b.joined_at, &b.id)));
        Ok(entries)
    }

    async fn count_entries(&self, giveaway_id: &str) -> AppResult<u64> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .filter(|e| e.giveaway_id == giveaway_id)
            .count() as u64)
    }

    async fn find_entry(
        &self,
        giveaway_id: &str,
        user_id: &str,
    ) -> AppResult<Option<giveaway_entry::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .entries
            .iter()
            .find(|e| e.giveaway_id == giveaway_id && e.user_id == user_id)
            .cloned())
    }

    async fn insert_entry(
        &self,
        entry: giveaway_entry::Model,
    ) -> AppResult<InsertOutcome<giveaway_entry::Model>> {
        self.check()?;
        let mut state = self.state.lock().await;
        if state
            .entries
            .iter()
            .any(|e| e.giveaway_id == entry.giveaway_id && e.user_id == entry.user_id)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        state.entries.push(entry.clone());
        Ok(InsertOutcome::Inserted(entry))
    }

    async fn delete_entry(&self, giveaway_id: &str, user_id: &str) -> AppResult<bool> {
        self.check()?;
        let mut state = self.state.lock().await;
        let before = state.entries.len();
        state
            .entries
            .retain(|e| !(e.giveaway_id == giveaway_id && e.user_id == user_id));
        Ok(state.entries.len() < before)
    }

    async fn insert_winners(&self, winners: Vec<giveaway_winner::Model>) -> AppResult<()> {
        self.check()?;
        self.state.lock().await.winners.extend(winners);
        Ok(())
    }

    async fn find_winners(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_winner::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .winners
            .iter()
            .filter(|w| w.giveaway_id == giveaway_id)
            .cloned()
            .collect())
    }

    async fn find_winner(&self, id: &str) -> AppResult<Option<giveaway_winner::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state.winners.iter().find(|w| w.id == id).cloned())
    }

    async fn insert_claim(
        &self,
        claim: giveaway_claim::Model,
    ) -> AppResult<giveaway_claim::Model> {
        self.check()?;
        let mut state = self.state.lock().await;
        state.trip(FaultPoint::ClaimInsert)?;
        if state.claims.contains_key(&claim.id) {
            return Err(AppError::Conflict(format!("Claim exists: {}", claim.id)));
        }
        state.claims.insert(claim.id.clone(), claim.clone());
        Ok(claim)
    }

    async fn find_claim(&self, id: &str) -> AppResult<Option<giveaway_claim::Model>> {
        self.check()?;
        Ok(self.state.lock().await.claims.get(id).cloned())
    }

    async fn find_pending_claims(&self, limit: u64) -> AppResult<Vec<giveaway_claim::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let found = state
            .claims
            .values()
            .filter(|c| c.status == ClaimStatus::Pending)
            .cloned()
            .collect();
        Ok(take_sorted(found, limit, |a, b| {
            a.claim_deadline_at.cmp(&b.claim_deadline_at)
        }))
    }

    async fn find_claims_for_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_claim::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        let mut claims: Vec<_> = state
            .claims
            .values()
            .filter(|c| c.giveaway_id == giveaway_id)
            .cloned()
            .collect();
        claims.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(claims)
    }

    async fn update_claim_if(
        &self,
        id: &str,
        guard: &ClaimGuard,
        patch: &ClaimPatch,
    ) -> AppResult<ConditionalUpdate<giveaway_claim::Model>> {
        self.check()?;
        let mut state = self.state.lock().await;
        let Some(model) = state.claims.get_mut(id) else {
            return Ok(ConditionalUpdate::Rejected(None));
        };
        if !guard.matches(model) {
            return Ok(ConditionalUpdate::Rejected(Some(model.clone())));
        }
        patch.apply(model);
        Ok(ConditionalUpdate::Applied(model.clone()))
    }

    async fn append_log(&self, log: giveaway_log::Model) -> AppResult<()> {
        self.check()?;
        self.state.lock().await.logs.push(log);
        Ok(())
    }

    async fn find_logs(&self, giveaway_id: &str) -> AppResult<Vec<giveaway_log::Model>> {
        self.check()?;
        let state = self.state.lock().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.giveaway_id == giveaway_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::giveaway::{GiveawayOptions, GiveawayRules};
    use crate::entities::giveaway_entry::EntryMethod;
    use chrono::Duration;

    fn active_giveaway(id: &str) -> giveaway::Model {
        let now = Utc::now();
        giveaway::Model {
            id: id.to_string(),
            guild_id: "guild".to_string(),
            channel_id: "chan".to_string(),
            host_id: "host".to_string(),
            title: "Keyboard".to_string(),
            prize: None,
            winners_count: 1,
            rules: GiveawayRules::default(),
            options: GiveawayOptions::default(),
            status: GiveawayStatus::Active,
            scheduled_at: None,
            starts_at: Some(now),
            ends_at: now - Duration::seconds(1),
            ended_at: None,
            cancelled_at: None,
            processing: false,
            processing_started_at: None,
            fair_rng_seed: None,
            winners_announced: false,
            entries_count: 0,
            last_live_update_at: None,
            announcement_message_id: None,
            created_at: now,
        }
    }

    fn entry(giveaway_id: &str, user_id: &str) -> giveaway_entry::Model {
        giveaway_entry::Model {
            id: format!("{giveaway_id}-{user_id}"),
            giveaway_id: giveaway_id.to_string(),
            user_id: user_id.to_string(),
            display_name: user_id.to_string(),
            joined_at: Utc::now(),
            method: EntryMethod::Command,
            weight: 1,
            is_bot: false,
            suspicious_alt: false,
        }
    }

    #[tokio::test]
    async fn test_conditional_update_only_once() {
        let store = MemoryStore::new();
        store.insert_giveaway(active_giveaway("g1")).await.unwrap();

        let guard = GiveawayGuard::unlocked(GiveawayStatus::Active);
        let patch = GiveawayPatch {
            processing: Some(true),
            ..GiveawayPatch::default()
        };

        let first = store.update_giveaway_if("g1", &guard, &patch).await.unwrap();
        let second = store.update_giveaway_if("g1", &guard, &patch).await.unwrap();

        assert!(first.is_applied());
        assert!(matches!(second, ConditionalUpdate::Rejected(Some(g)) if g.processing));
    }

    #[tokio::test]
    async fn test_duplicate_entry() {
        let store = MemoryStore::new();

        let first = store.insert_entry(entry("g1", "alice")).await.unwrap();
        let mut again = entry("g1", "alice");
        again.id = "other".to_string();
        let second = store.insert_entry(again).await.unwrap();

        assert!(matches!(first, InsertOutcome::Inserted(_)));
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(store.count_entries("g1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_due_active_skips_locked() {
        let store = MemoryStore::new();
        store.insert_giveaway(active_giveaway("g1")).await.unwrap();
        let mut locked = active_giveaway("g2");
        locked.processing = true;
        store.insert_giveaway(locked).await.unwrap();

        let due = store.find_due_active(Utc::now(), 10).await.unwrap();

        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, "g1");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new();
        store.set_failure(Some(StoreFailure::Unauthorized));

        let err = store.find_giveaway("g1").await.unwrap_err();
        assert!(err.is_store_auth_failure());

        store.set_failure(None);
        assert!(store.find_giveaway("g1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fault_point_fails_once() {
        let store = MemoryStore::new();
        store.insert_giveaway(active_giveaway("g1")).await.unwrap();
        store
            .fail_once(FaultPoint::StatusChange(GiveawayStatus::Ended))
            .await;

        let close = GiveawayPatch {
            status: Some(GiveawayStatus::Ended),
            ..GiveawayPatch::default()
        };
        let guard = GiveawayGuard::status(GiveawayStatus::Active);

        assert!(store.update_giveaway_if("g1", &guard, &close).await.is_err());
        let stored = store.find_giveaway("g1").await.unwrap().unwrap();
        assert_eq!(stored.status, GiveawayStatus::Active);

        let retried = store.update_giveaway_if("g1", &guard, &close).await.unwrap();
        assert!(retried.is_applied());
    }
}
