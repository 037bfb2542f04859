//! End-to-end giveaway engine scenarios against the in-memory store.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use prizebot_common::AppResult;
use prizebot_core::services::draw;
use prizebot_core::{
    Announcer, ClaimNotice, ClaimPolicy, ClaimService, CreateGiveawayInput, DrawOptions,
    EnterRequest, GiveawayService, LiveUpdate, MemberContext, MessageRef, Outcome, Rejection,
    RerollRequest, Ticket, TranscriptMessage, TranscriptReader,
};
use prizebot_db::entities::giveaway::{self, GiveawayOptions, GiveawayRules, GiveawayStatus};
use prizebot_db::entities::giveaway_claim::ClaimStatus;
use prizebot_db::entities::giveaway_entry::EntryMethod;
use prizebot_db::entities::giveaway_winner::{self, WinnerMethod};
use prizebot_db::store::{
    FaultPoint, GiveawayGuard, GiveawayPatch, GiveawayStore, MemoryStore, StoreFailure,
};

#[derive(Default)]
struct RecordingAnnouncer {
    notices: Mutex<Vec<ClaimNotice>>,
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn publish(&self, giveaway: &giveaway::Model) -> AppResult<MessageRef> {
        Ok(MessageRef(format!("msg-{}", giveaway.id)))
    }

    async fn edit(&self, _message: &MessageRef, _update: &LiveUpdate) -> AppResult<()> {
        Ok(())
    }

    async fn announce_winners(
        &self,
        _giveaway: &giveaway::Model,
        _winners: &[giveaway_winner::Model],
    ) -> AppResult<()> {
        Ok(())
    }

    async fn claim_notice(&self, _giveaway: &giveaway::Model, notice: &ClaimNotice) -> AppResult<()> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedTranscripts {
    messages: Mutex<Vec<TranscriptMessage>>,
}

#[async_trait]
impl TranscriptReader for ScriptedTranscripts {
    async fn recent_messages(&self, _conversation_ref: &str, _limit: u32) -> AppResult<Vec<TranscriptMessage>> {
        Ok(self.messages.lock().unwrap().clone())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    announcer: Arc<RecordingAnnouncer>,
    transcripts: Arc<ScriptedTranscripts>,
    giveaways: GiveawayService,
    claims: ClaimService,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let announcer = Arc::new(RecordingAnnouncer::default());
    let transcripts = Arc::new(ScriptedTranscripts::default());
    let policy = ClaimPolicy::default();
    let giveaways = GiveawayService::new(store.clone(), announcer.clone(), policy.window);
    let claims = ClaimService::new(
        store.clone(),
        giveaways.clone(),
        announcer.clone(),
        transcripts.clone(),
        policy,
    );
    Harness {
        store,
        announcer,
        transcripts,
        giveaways,
        claims,
    }
}

fn input(winners_count: i32) -> CreateGiveawayInput {
    CreateGiveawayInput {
        guild_id: "guild-1".to_string(),
        channel_id: "chan-1".to_string(),
        title: "Nitro giveaway".to_string(),
        prize: Some("Nitro".to_string()),
        winners_count,
        rules: GiveawayRules::default(),
        options: GiveawayOptions::default(),
        scheduled_at: None,
        ends_at: Utc::now() + Duration::hours(1),
        draft: false,
        seed: None,
    }
}

fn enter_request(user_id: &str) -> EnterRequest {
    EnterRequest {
        user_id: user_id.to_string(),
        display_name: user_id.to_uppercase(),
        method: EntryMethod::Button,
        member: MemberContext::default(),
    }
}

async fn active_with_entrants(h: &Harness, winners_count: i32, users: &[&str]) -> giveaway::Model {
    let g = h.giveaways.create("host", input(winners_count)).await.unwrap();
    for user in users {
        let report = h.giveaways.enter(&g.id, enter_request(user)).await.unwrap().done().unwrap();
        assert!(!report.duplicate);
    }
    g
}

#[tokio::test]
async fn test_create_active_publishes_announcement() {
    let h = harness();
    let g = h.giveaways.create("host", input(1)).await.unwrap();

    assert_eq!(g.status, GiveawayStatus::Active);
    assert!(g.starts_at.is_some());
    assert_eq!(g.announcement_message_id.as_deref(), Some(format!("msg-{}", g.id).as_str()));

    let logs = h.giveaways.logs(&g.id).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].action, "create");
}

#[tokio::test]
async fn test_create_rejects_past_end() {
    let h = harness();
    let mut bad = input(1);
    bad.ends_at = Utc::now() - Duration::minutes(1);
    assert!(h.giveaways.create("host", bad).await.is_err());

    let mut zero = input(0);
    zero.ends_at = Utc::now() + Duration::hours(1);
    assert!(h.giveaways.create("host", zero).await.is_err());
}

#[tokio::test]
async fn test_end_draws_replayable_winners() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["alice", "bob", "carol"]).await;

    let report = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();

    assert_eq!(report.giveaway.status, GiveawayStatus::Ended);
    assert!(!report.giveaway.processing);
    assert_eq!(report.giveaway.fair_rng_seed.as_deref(), Some(report.seed.as_str()));
    assert_eq!(report.winners.len(), 1);
    assert_eq!(report.claims.len(), 1);
    assert_eq!(report.claims[0].status, ClaimStatus::Pending);
    assert_eq!(report.total_eligible, 3);
    assert_eq!(report.shortfall, 0);

    // Anyone holding the seed and the entry list reproduces the pick.
    let entries = h.giveaways.entries(&g.id).await.unwrap();
    let tickets: Vec<Ticket> = entries.iter().map(Ticket::from).collect();
    let replay = draw::pick(
        &tickets,
        1,
        &DrawOptions {
            seed: Some(report.seed.clone()),
            ..DrawOptions::default()
        },
    );
    assert_eq!(replay.winners[0].id, report.winners[0].user_id);

    let end_logs: Vec<_> = h
        .giveaways
        .logs(&g.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|l| l.action == "end")
        .collect();
    assert_eq!(end_logs.len(), 1);
    assert_eq!(end_logs[0].payload["seed"], report.seed.as_str());
}

#[tokio::test]
async fn test_concurrent_end_draws_once() {
    let h = harness();
    let g = active_with_entrants(&h, 2, &["a", "b", "c", "d"]).await;

    let (first, second) = tokio::join!(h.giveaways.end(&g.id, "host"), h.giveaways.end(&g.id, "bot"));
    let outcomes = [first.unwrap(), second.unwrap()];

    let done = outcomes.iter().filter(|o| o.is_done()).count();
    assert_eq!(done, 1);
    assert!(
        outcomes
            .iter()
            .any(|o| o.rejection() == Some(&Rejection::NotActiveOrLocked))
    );
    assert_eq!(h.giveaways.winners(&g.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_end_twice_is_rejected() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    assert!(h.giveaways.end(&g.id, "host").await.unwrap().is_done());

    let again = h.giveaways.end(&g.id, "host").await.unwrap();
    assert_eq!(again.rejection(), Some(&Rejection::NotActiveOrLocked));
    assert_eq!(
        h.giveaways.end("missing", "host").await.unwrap().rejection(),
        Some(&Rejection::NotFound)
    );
}

#[tokio::test]
async fn test_bots_are_recorded_but_never_win() {
    let h = harness();
    let g = h.giveaways.create("host", input(1)).await.unwrap();
    let mut bot = enter_request("robot");
    bot.member.is_bot = true;
    let entry = h.giveaways.enter(&g.id, bot).await.unwrap().done().unwrap().entry;
    assert!(entry.is_bot);

    let report = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    assert!(report.winners.is_empty());
    assert_eq!(report.shortfall, 1);
    assert!(report.claims.is_empty());
}

#[tokio::test]
async fn test_entrants_cap() {
    let h = harness();
    let mut capped = input(1);
    capped.rules.entrants_cap = 2;
    let g = h.giveaways.create("host", capped).await.unwrap();

    assert!(h.giveaways.enter(&g.id, enter_request("a")).await.unwrap().is_done());
    assert!(h.giveaways.enter(&g.id, enter_request("b")).await.unwrap().is_done());
    let third = h.giveaways.enter(&g.id, enter_request("c")).await.unwrap();
    assert_eq!(third.rejection(), Some(&Rejection::CapReached));

    let current = h.giveaways.get(&g.id).await.unwrap().unwrap();
    assert_eq!(current.entries_count, 2);
}

#[tokio::test]
async fn test_duplicate_entry_is_idempotent() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;

    let again = h.giveaways.enter(&g.id, enter_request("a")).await.unwrap().done().unwrap();
    assert!(again.duplicate);
    assert_eq!(h.giveaways.get(&g.id).await.unwrap().unwrap().entries_count, 1);
    assert_eq!(h.giveaways.entries(&g.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_ineligible_entry_is_rejected() {
    let h = harness();
    let mut gated = input(1);
    gated.rules.required_role_ids = vec!["member".to_string()];
    let g = h.giveaways.create("host", gated).await.unwrap();

    let outcome = h.giveaways.enter(&g.id, enter_request("a")).await.unwrap();
    assert!(matches!(outcome.rejection(), Some(Rejection::NotEligible { .. })));
    assert_eq!(h.giveaways.get(&g.id).await.unwrap().unwrap().entries_count, 0);
}

#[tokio::test]
async fn test_role_weight_recorded_on_entry() {
    let h = harness();
    let mut weighted = input(1);
    weighted.rules.role_weights.insert("booster".to_string(), 4);
    let g = h.giveaways.create("host", weighted).await.unwrap();

    let mut request = enter_request("a");
    request.member.role_ids = vec!["booster".to_string()];
    let entry = h.giveaways.enter(&g.id, request).await.unwrap().done().unwrap().entry;
    assert_eq!(entry.weight, 4);
}

#[tokio::test]
async fn test_leave_releases_slot() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a", "b"]).await;

    assert_eq!(h.giveaways.leave(&g.id, "a").await.unwrap().done(), Some(true));
    assert_eq!(h.giveaways.leave(&g.id, "a").await.unwrap().done(), Some(false));
    assert_eq!(h.giveaways.get(&g.id).await.unwrap().unwrap().entries_count, 1);
}

#[tokio::test]
async fn test_enter_after_end_is_rejected() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    h.giveaways.end(&g.id, "host").await.unwrap();

    let late = h.giveaways.enter(&g.id, enter_request("b")).await.unwrap();
    assert_eq!(late.rejection(), Some(&Rejection::NotActive));
}

#[tokio::test]
async fn test_reroll_excludes_every_past_winner() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a", "b", "c"]).await;
    let ended = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    let first = ended.winners[0].user_id.clone();

    let request = RerollRequest {
        count: Some(2),
        ..RerollRequest::default()
    };
    let second = h.giveaways.reroll(&g.id, request, "host").await.unwrap().done().unwrap();
    assert_eq!(second.winners.len(), 2);
    assert!(second.winners.iter().all(|w| w.user_id != first));
    assert!(second.seed.starts_with(&ended.seed));

    let request = RerollRequest {
        count: Some(1),
        ..RerollRequest::default()
    };
    let exhausted = h.giveaways.reroll(&g.id, request, "host").await.unwrap().done().unwrap();
    assert!(exhausted.winners.is_empty());
    assert_eq!(exhausted.shortfall, 1);

    let current = h.giveaways.get(&g.id).await.unwrap().unwrap();
    assert!(!current.processing);
}

#[tokio::test]
async fn test_reroll_requires_ended_and_enabled() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a", "b"]).await;
    let early = h.giveaways.reroll(&g.id, RerollRequest::default(), "host").await.unwrap();
    assert_eq!(early.rejection(), Some(&Rejection::NotEnded));

    let mut locked_down = input(1);
    locked_down.options.allow_reroll = false;
    let g2 = h.giveaways.create("host", locked_down).await.unwrap();
    h.giveaways.enter(&g2.id, enter_request("a")).await.unwrap();
    h.giveaways.end(&g2.id, "host").await.unwrap();
    let disabled = h.giveaways.reroll(&g2.id, RerollRequest::default(), "host").await.unwrap();
    assert_eq!(disabled.rejection(), Some(&Rejection::RerollDisabled));
}

#[tokio::test]
async fn test_cancel_and_invalid_transition() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;

    let cancelled = h.giveaways.cancel(&g.id, "host").await.unwrap().done().unwrap();
    assert_eq!(cancelled.status, GiveawayStatus::Cancelled);
    assert!(cancelled.cancelled_at.is_some());

    let again = h.giveaways.cancel(&g.id, "host").await.unwrap();
    assert_eq!(
        again.rejection(),
        Some(&Rejection::InvalidTransition {
            from: GiveawayStatus::Cancelled
        })
    );
}

#[tokio::test]
async fn test_draft_publish_and_scheduled_promotion() {
    let h = harness();
    let mut draft = input(1);
    draft.draft = true;
    draft.scheduled_at = Some(Utc::now() + Duration::minutes(10));
    let g = h.giveaways.create("host", draft).await.unwrap();
    assert_eq!(g.status, GiveawayStatus::Draft);

    let scheduled = h.giveaways.publish(&g.id, "host").await.unwrap().done().unwrap();
    assert_eq!(scheduled.status, GiveawayStatus::Scheduled);

    // Not due yet.
    let early = h.giveaways.promote(&g.id, Utc::now()).await.unwrap();
    assert!(!early.is_done());

    let later = Utc::now() + Duration::minutes(11);
    let active = h.giveaways.promote(&g.id, later).await.unwrap().done().unwrap();
    assert_eq!(active.status, GiveawayStatus::Active);
    assert!(active.announcement_message_id.is_some());

    // Promoting again is a no-op.
    let again = h.giveaways.promote(&g.id, later).await.unwrap().done().unwrap();
    assert_eq!(again.starts_at, active.starts_at);
}

#[tokio::test]
async fn test_stale_lock_is_released() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    let long_ago = Utc::now() - Duration::hours(1);
    let lock = GiveawayPatch {
        processing: Some(true),
        processing_started_at: Some(Some(long_ago)),
        ended_at: Some(Some(long_ago)),
        ..GiveawayPatch::default()
    };
    h.store
        .update_giveaway_if(&g.id, &GiveawayGuard::default(), &lock)
        .await
        .unwrap();

    let released = h
        .giveaways
        .release_stale_locks(Utc::now() - Duration::minutes(10), 10)
        .await
        .unwrap();
    assert_eq!(released, 1);

    let current = h.giveaways.get(&g.id).await.unwrap().unwrap();
    assert!(!current.processing);
    assert!(current.ended_at.is_none());
    assert_eq!(current.status, GiveawayStatus::Active);
    assert!(h.giveaways.end(&g.id, "host").await.unwrap().is_done());
}

#[tokio::test]
async fn test_store_auth_failure_surfaces_as_error() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    h.store.set_failure(Some(StoreFailure::Unauthorized));

    let err = h.giveaways.end(&g.id, "host").await.unwrap_err();
    assert!(err.is_store_auth_failure());

    h.store.set_failure(None);
    let current = h.giveaways.get(&g.id).await.unwrap().unwrap();
    assert_eq!(current.status, GiveawayStatus::Active);
}

async fn pending_claim_for(h: &Harness, giveaway_id: &str) -> prizebot_db::entities::giveaway_claim::Model {
    h.claims
        .list_for_giveaway(giveaway_id)
        .await
        .unwrap()
        .into_iter()
        .find(|c| c.status == ClaimStatus::Pending)
        .unwrap()
}

#[tokio::test]
async fn test_expired_claim_rerolls_then_exhausts() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a", "b"]).await;
    let ended = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    let original = ended.claims[0].clone();

    let t49: DateTime<Utc> = Utc::now() + Duration::hours(49);
    let report = h.claims.sweep(t49).await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.rerolled, 1);

    let old = h.claims.get(&original.id).await.unwrap().unwrap();
    assert_eq!(old.status, ClaimStatus::Rerolled);
    let successor = pending_claim_for(&h, &g.id).await;
    assert_eq!(successor.previous_claim_id.as_deref(), Some(original.id.as_str()));
    assert_eq!(successor.reroll_count, 1);
    assert_ne!(successor.user_id, original.user_id);

    let winners = h.giveaways.winners(&g.id).await.unwrap();
    let replacement = winners.iter().find(|w| w.user_id == successor.user_id).unwrap();
    assert_eq!(replacement.reroll_of.as_deref(), Some(original.winner_id.as_str()));

    // Nobody is left for the second expiry.
    let report = h.claims.sweep(t49 + Duration::hours(49)).await.unwrap();
    assert_eq!(report.exhausted, 1);
    let last = h.claims.get(&successor.id).await.unwrap().unwrap();
    assert_eq!(last.status, ClaimStatus::Unclaimed);
    let logs = h.giveaways.logs(&g.id).await.unwrap();
    assert!(logs.iter().any(|l| l.action == "claim_chain_exhausted"));

    let notices = h.announcer.notices.lock().unwrap();
    assert!(notices.iter().any(|n| matches!(n, ClaimNotice::NewWinner { .. })));
}

#[tokio::test]
async fn test_reminders_sent_once_each() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    h.giveaways.end(&g.id, "host").await.unwrap();
    let now = Utc::now();

    assert_eq!(h.claims.sweep(now + Duration::hours(1)).await.unwrap().reminders, 0);
    assert_eq!(h.claims.sweep(now + Duration::hours(25)).await.unwrap().reminders, 1);
    assert_eq!(h.claims.sweep(now + Duration::hours(26)).await.unwrap().reminders, 0);
    assert_eq!(h.claims.sweep(now + Duration::hours(43)).await.unwrap().reminders, 1);
    assert_eq!(h.claims.sweep(now + Duration::hours(44)).await.unwrap().reminders, 0);

    let claim = pending_claim_for(&h, &g.id).await;
    assert!(claim.first_reminder_sent);
    assert!(claim.final_reminder_sent);
}

#[tokio::test]
async fn test_winner_reply_marks_claimed() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    let ended = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    let claim = ended.claims[0].clone();
    let opened = Utc::now();

    h.claims
        .attach_conversation(&claim.id, "thread-1", opened)
        .await
        .unwrap()
        .done()
        .unwrap();
    h.transcripts.messages.lock().unwrap().extend([
        TranscriptMessage {
            author_id: "staff".to_string(),
            content: "Congrats! Reply to claim.".to_string(),
            sent_at: opened + Duration::seconds(1),
        },
        TranscriptMessage {
            author_id: claim.user_id.clone(),
            content: "Thanks, my tag is a#0001".to_string(),
            sent_at: opened + Duration::minutes(3),
        },
    ]);

    let report = h.claims.sweep(opened + Duration::minutes(5)).await.unwrap();
    assert_eq!(report.claimed, 1);

    let claimed = h.claims.get(&claim.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, ClaimStatus::Claimed);
    assert_eq!(claimed.response_excerpt.as_deref(), Some("Thanks, my tag is a#0001"));

    let confirm = h.claims.confirm(&claim.id, "host").await.unwrap();
    assert_eq!(confirm.rejection(), Some(&Rejection::NotPending));
}

#[tokio::test]
async fn test_outcome_reports_not_found_claim() {
    let h = harness();
    let outcome = h.claims.confirm("missing", "host").await.unwrap();
    assert!(matches!(outcome, Outcome::Rejected(Rejection::NotFound)));
}

#[tokio::test]
async fn test_committed_seed_drives_end() {
    let h = harness();
    let mut seeded = input(1);
    seeded.seed = Some("S1".to_string());
    let g = h.giveaways.create("host", seeded).await.unwrap();
    assert_eq!(g.fair_rng_seed.as_deref(), Some("S1"));
    for user in ["alice", "bob", "carol"] {
        h.giveaways.enter(&g.id, enter_request(user)).await.unwrap();
    }

    let report = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    assert_eq!(report.seed, "S1");
    assert_eq!(report.giveaway.fair_rng_seed.as_deref(), Some("S1"));

    let entries = h.giveaways.entries(&g.id).await.unwrap();
    let tickets: Vec<Ticket> = entries.iter().map(Ticket::from).collect();
    let expected = draw::pick(
        &tickets,
        1,
        &DrawOptions {
            seed: Some("S1".to_string()),
            ..DrawOptions::default()
        },
    );
    assert_eq!(report.winners[0].user_id, expected.winners[0].id);
}

#[tokio::test]
async fn test_suspicious_entrants_excluded_when_configured() {
    let h = harness();
    let mut strict = input(1);
    strict.options.exclude_suspicious = true;
    let g = h.giveaways.create("host", strict).await.unwrap();
    for user in ["alt-1", "alt-2"] {
        let mut request = enter_request(user);
        request.member.suspicious_alt = true;
        h.giveaways.enter(&g.id, request).await.unwrap();
    }
    h.giveaways.enter(&g.id, enter_request("honest")).await.unwrap();

    let report = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    assert_eq!(report.total_eligible, 1);
    assert_eq!(report.winners[0].user_id, "honest");

    // The same flag keeps them out of rerolls once the honest winner is excluded.
    let reroll = h
        .giveaways
        .reroll(&g.id, RerollRequest::default(), "host")
        .await
        .unwrap()
        .done()
        .unwrap();
    assert!(reroll.winners.is_empty());
    assert_eq!(reroll.total_eligible, 0);
}

#[tokio::test]
async fn test_enter_rejected_while_end_holds_lock() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a"]).await;
    let lock = GiveawayPatch {
        processing: Some(true),
        processing_started_at: Some(Some(Utc::now())),
        ..GiveawayPatch::default()
    };
    h.store
        .update_giveaway_if(&g.id, &GiveawayGuard::unlocked(GiveawayStatus::Active), &lock)
        .await
        .unwrap();

    let late = h.giveaways.enter(&g.id, enter_request("late")).await.unwrap();
    assert_eq!(late.rejection(), Some(&Rejection::NotActive));

    let current = h.giveaways.get(&g.id).await.unwrap().unwrap();
    assert_eq!(current.entries_count, 1);
    assert!(h.giveaways.entries(&g.id).await.unwrap().iter().all(|e| e.user_id != "late"));
}

#[tokio::test]
async fn test_failed_close_resumes_without_redrawing() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a", "b", "c"]).await;
    h.store
        .fail_once(FaultPoint::StatusChange(GiveawayStatus::Ended))
        .await;

    assert!(h.giveaways.end(&g.id, "host").await.is_err());
    let current = h.giveaways.get(&g.id).await.unwrap().unwrap();
    assert_eq!(current.status, GiveawayStatus::Active);
    assert!(!current.processing);
    let seed = current.fair_rng_seed.clone().unwrap();
    let first_winners = h.giveaways.winners(&g.id).await.unwrap();
    assert_eq!(first_winners.len(), 1);

    let report = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    assert_eq!(report.giveaway.status, GiveawayStatus::Ended);
    assert_eq!(report.seed, seed);
    assert_eq!(report.winners, first_winners);
    assert_eq!(report.claims.len(), 1);

    let winners = h.giveaways.winners(&g.id).await.unwrap();
    assert_eq!(winners.len(), 1);
    assert_eq!(h.claims.list_for_giveaway(&g.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_successor_claim_is_finished_next_sweep() {
    let h = harness();
    let g = active_with_entrants(&h, 1, &["a", "b", "c"]).await;
    let ended = h.giveaways.end(&g.id, "host").await.unwrap().done().unwrap();
    let original = ended.claims[0].clone();
    h.store.fail_once(FaultPoint::ClaimInsert).await;

    let t49 = Utc::now() + Duration::hours(49);
    let report = h.claims.sweep(t49).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.rerolled, 0);

    // Back to pending, with the replacement already drawn.
    let reopened = h.claims.get(&original.id).await.unwrap().unwrap();
    assert_eq!(reopened.status, ClaimStatus::Pending);
    let winners = h.giveaways.winners(&g.id).await.unwrap();
    assert_eq!(winners.len(), 2);
    let replacement = winners
        .iter()
        .find(|w| w.method == WinnerMethod::Reroll)
        .unwrap()
        .clone();

    let report = h.claims.sweep(t49).await.unwrap();
    assert_eq!(report.rerolled, 1);
    assert_eq!(report.failed, 0);

    let old = h.claims.get(&original.id).await.unwrap().unwrap();
    assert_eq!(old.status, ClaimStatus::Rerolled);
    let successor = pending_claim_for(&h, &g.id).await;
    assert_eq!(successor.winner_id, replacement.id);
    assert_eq!(successor.previous_claim_id.as_deref(), Some(original.id.as_str()));
    assert_eq!(h.giveaways.winners(&g.id).await.unwrap().len(), 2);
    assert_eq!(h.claims.list_for_giveaway(&g.id).await.unwrap().len(), 2);
}
