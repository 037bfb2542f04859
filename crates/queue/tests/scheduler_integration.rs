//! Scheduler tick integration tests against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use prizebot_common::{AppError, AppResult};
use prizebot_core::{
    Announcer, ClaimNotice, ClaimPolicy, ClaimService, CreateGiveawayInput, EnterRequest,
    GiveawayService, LiveUpdate, MemberContext, MessageRef, NoOpTranscriptReader,
};
use prizebot_db::entities::giveaway::{self, GiveawayOptions, GiveawayRules, GiveawayStatus};
use prizebot_db::entities::giveaway_entry::EntryMethod;
use prizebot_db::entities::giveaway_winner;
use prizebot_db::store::{GiveawayStore, MemoryStore, StoreFailure};
use prizebot_queue::{
    GiveawayJobExecutor, JobExecutor, KillSwitch, SchedulerConfig, Tick, run_scheduler, run_tick,
};

#[derive(Default)]
struct FlakyAnnouncer {
    fail_announce: AtomicBool,
    announced: AtomicUsize,
    edits: AtomicUsize,
}

#[async_trait]
impl Announcer for FlakyAnnouncer {
    async fn publish(&self, giveaway: &giveaway::Model) -> AppResult<MessageRef> {
        Ok(MessageRef(format!("msg-{}", giveaway.id)))
    }

    async fn edit(&self, _message: &MessageRef, _update: &LiveUpdate) -> AppResult<()> {
        self.edits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn announce_winners(
        &self,
        _giveaway: &giveaway::Model,
        _winners: &[giveaway_winner::Model],
    ) -> AppResult<()> {
        if self.fail_announce.load(Ordering::SeqCst) {
            return Err(AppError::ExternalService("webhook returned 502".to_string()));
        }
        self.announced.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn claim_notice(&self, _giveaway: &giveaway::Model, _notice: &ClaimNotice) -> AppResult<()> {
        Ok(())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    announcer: Arc<FlakyAnnouncer>,
    giveaways: GiveawayService,
    executor: Arc<GiveawayJobExecutor>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let announcer = Arc::new(FlakyAnnouncer::default());
    let policy = ClaimPolicy::default();
    let giveaways = GiveawayService::new(store.clone(), announcer.clone(), policy.window);
    let claims = ClaimService::new(
        store.clone(),
        giveaways.clone(),
        announcer.clone(),
        Arc::new(NoOpTranscriptReader),
        policy,
    );
    let executor = Arc::new(GiveawayJobExecutor::new(
        store.clone(),
        giveaways.clone(),
        claims,
        announcer.clone(),
        SchedulerConfig::default(),
    ));
    Harness {
        store,
        announcer,
        giveaways,
        executor,
    }
}

fn input(ends_in: Duration) -> CreateGiveawayInput {
    CreateGiveawayInput {
        guild_id: "guild-1".to_string(),
        channel_id: "chan-1".to_string(),
        title: "Keyboard".to_string(),
        prize: None,
        winners_count: 1,
        rules: GiveawayRules::default(),
        options: GiveawayOptions::default(),
        scheduled_at: None,
        ends_at: Utc::now() + ends_in,
        draft: false,
        seed: None,
    }
}

async fn enter(h: &Harness, giveaway_id: &str, user_id: &str) {
    let request = EnterRequest {
        user_id: user_id.to_string(),
        display_name: user_id.to_string(),
        method: EntryMethod::Command,
        member: MemberContext::default(),
    };
    assert!(h.giveaways.enter(giveaway_id, request).await.unwrap().is_done());
}

#[tokio::test]
async fn test_end_tick_ends_due_and_announces() {
    let h = harness();
    let due = h.giveaways.create("host", input(Duration::minutes(1))).await.unwrap();
    let later = h.giveaways.create("host", input(Duration::hours(5))).await.unwrap();
    enter(&h, &due.id, "a").await;

    let report = h.executor.end_due(Utc::now() + Duration::minutes(2)).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);

    let ended = h.giveaways.get(&due.id).await.unwrap().unwrap();
    assert_eq!(ended.status, GiveawayStatus::Ended);
    assert!(ended.winners_announced);
    assert_eq!(h.announcer.announced.load(Ordering::SeqCst), 1);

    let untouched = h.giveaways.get(&later.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, GiveawayStatus::Active);

    // Nothing left to do on the next tick.
    let again = h.executor.end_due(Utc::now() + Duration::minutes(2)).await.unwrap();
    assert!(again.is_empty());
    assert_eq!(h.announcer.announced.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_announcement_is_retried_next_tick() {
    let h = harness();
    let g = h.giveaways.create("host", input(Duration::minutes(1))).await.unwrap();
    enter(&h, &g.id, "a").await;
    h.announcer.fail_announce.store(true, Ordering::SeqCst);

    let now = Utc::now() + Duration::minutes(2);
    let report = h.executor.end_due(now).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert!(!h.giveaways.get(&g.id).await.unwrap().unwrap().winners_announced);

    h.announcer.fail_announce.store(false, Ordering::SeqCst);
    h.executor.end_due(now).await.unwrap();
    assert!(h.giveaways.get(&g.id).await.unwrap().unwrap().winners_announced);
    assert_eq!(h.announcer.announced.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_end_batch_is_bounded() {
    let h = harness();
    for _ in 0..12 {
        h.giveaways.create("host", input(Duration::minutes(1))).await.unwrap();
    }

    let now = Utc::now() + Duration::minutes(2);
    assert_eq!(h.executor.end_due(now).await.unwrap().processed, 10);
    assert_eq!(h.executor.end_due(now).await.unwrap().processed, 2);
}

#[tokio::test]
async fn test_promote_tick() {
    let h = harness();
    let mut scheduled = input(Duration::hours(2));
    scheduled.scheduled_at = Some(Utc::now() + Duration::minutes(30));
    let g = h.giveaways.create("host", scheduled).await.unwrap();
    assert_eq!(g.status, GiveawayStatus::Scheduled);

    assert!(h.executor.promote_due(Utc::now()).await.unwrap().is_empty());
    let report = h.executor.promote_due(Utc::now() + Duration::hours(1)).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(
        h.giveaways.get(&g.id).await.unwrap().unwrap().status,
        GiveawayStatus::Active
    );
}

#[tokio::test]
async fn test_live_update_is_throttled_and_stops_after_end() {
    let h = harness();
    let mut live = input(Duration::minutes(10));
    live.options.live_update_interval_secs = 60;
    let g = h.giveaways.create("host", live).await.unwrap();

    let now = Utc::now();
    assert_eq!(h.executor.live_update(now).await.unwrap().processed, 1);
    assert_eq!(h.executor.live_update(now + Duration::seconds(30)).await.unwrap().processed, 0);
    assert_eq!(h.executor.live_update(now + Duration::seconds(61)).await.unwrap().processed, 1);
    assert_eq!(h.announcer.edits.load(Ordering::SeqCst), 2);

    h.giveaways.end(&g.id, "host").await.unwrap();
    assert!(h.executor.live_update(now + Duration::minutes(5)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_live_update_disabled_by_default() {
    let h = harness();
    h.giveaways.create("host", input(Duration::minutes(10))).await.unwrap();
    assert!(h.executor.live_update(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_claim_sweep_tick_rerolls_expired_claim() {
    let h = harness();
    let g = h.giveaways.create("host", input(Duration::minutes(1))).await.unwrap();
    enter(&h, &g.id, "a").await;
    enter(&h, &g.id, "b").await;
    h.executor.end_due(Utc::now() + Duration::minutes(2)).await.unwrap();

    let report = run_tick(h.executor.as_ref(), Tick::ClaimSweep, Utc::now() + Duration::hours(49))
        .await
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(h.giveaways.winners(&g.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_auth_failure_propagates_from_tick() {
    let h = harness();
    h.store.set_failure(Some(StoreFailure::Unauthorized));
    let err = h.executor.end_due(Utc::now()).await.unwrap_err();
    assert!(err.is_store_auth_failure());

    h.store.set_failure(Some(StoreFailure::Unavailable));
    let err = h.executor.promote_due(Utc::now()).await.unwrap_err();
    assert!(!err.is_store_auth_failure());
}

#[tokio::test]
async fn test_scheduler_stops_after_repeated_auth_failures() {
    let h = harness();
    h.store.set_failure(Some(StoreFailure::Unauthorized));
    let config = SchedulerConfig {
        promote_interval: StdDuration::from_millis(5),
        end_interval: StdDuration::from_millis(5),
        live_update_interval: StdDuration::from_millis(5),
        claim_sweep_interval: StdDuration::from_millis(5),
        lock_watchdog_interval: StdDuration::from_millis(5),
        ..SchedulerConfig::default()
    };
    let kill_switch = Arc::new(KillSwitch::new(3));

    let handles = run_scheduler(&config, h.executor.clone(), kill_switch.clone());
    for handle in handles {
        tokio::time::timeout(StdDuration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
    assert!(kill_switch.is_tripped());
}

#[tokio::test]
async fn test_watchdog_tick_releases_stale_lock() {
    use prizebot_db::store::{GiveawayGuard, GiveawayPatch};

    let h = harness();
    let g = h.giveaways.create("host", input(Duration::minutes(1))).await.unwrap();
    let stale = Utc::now() - Duration::hours(1);
    h.store
        .update_giveaway_if(
            &g.id,
            &GiveawayGuard::default(),
            &GiveawayPatch {
                processing: Some(true),
                processing_started_at: Some(Some(stale)),
                ..GiveawayPatch::default()
            },
        )
        .await
        .unwrap();

    let report = h.executor.release_stale_locks(Utc::now()).await.unwrap();
    assert_eq!(report.processed, 1);
    assert!(!h.giveaways.get(&g.id).await.unwrap().unwrap().processing);
}
