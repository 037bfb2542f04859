//! Prize claim follow-up.
//!
//! Every winner gets a claim with a response deadline. A sweep detects
//! responses, sends reminders, and replaces winners who let their deadline
//! pass. Replacements link back through `previous_claim_id`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use prizebot_common::{AppResult, ClaimSettings, IdGenerator};
use prizebot_db::entities::{
    giveaway,
    giveaway_claim::{self, ClaimStatus},
    giveaway_log,
    giveaway_winner::{self, WinnerMethod},
};
use prizebot_db::store::{ClaimGuard, ClaimPatch, ConditionalUpdate, GiveawayStore};
use serde::Serialize;
use serde_json::json;

use super::announcer::{Announcer, ClaimNotice};
use super::giveaway::{GiveawayService, RerollRequest};
use super::outcome::{Outcome, Rejection};
use super::transcript::TranscriptReader;

/// Actor recorded for expiry-driven rerolls.
pub const CLAIM_EXPIRY_ACTOR: &str = "system:claim-expiry";

const SWEEP_LIMIT: u64 = 500;
const TRANSCRIPT_LIMIT: u32 = 50;
const EXCERPT_CHARS: usize = 200;

/// Claim deadlines and reminder thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// Time a winner has to respond.
    pub window: Duration,
    /// Time before the deadline at which the first reminder is due.
    pub first_reminder: Duration,
    /// Time before the deadline at which the final reminder is due.
    pub final_reminder: Duration,
}

impl From<&ClaimSettings> for ClaimPolicy {
    fn from(settings: &ClaimSettings) -> Self {
        Self {
            window: Duration::hours(settings.window_hours),
            first_reminder: Duration::hours(settings.first_reminder_hours),
            final_reminder: Duration::hours(settings.final_reminder_hours),
        }
    }
}

impl Default for ClaimPolicy {
    fn default() -> Self {
        Self::from(&ClaimSettings::default())
    }
}

/// Counters from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    /// Claims resolved by a detected reply.
    pub claimed: usize,
    /// Reminders sent, first and final combined.
    pub reminders: usize,
    /// Claims whose deadline passed this sweep.
    pub expired: usize,
    /// Expired claims handed to a replacement winner.
    pub rerolled: usize,
    /// Expired claims with no replacement left to draw.
    pub exhausted: usize,
    /// Claims skipped after an error. They are retried next sweep.
    pub failed: usize,
}

fn pending_claim(
    id_gen: &IdGenerator,
    winner: &giveaway_winner::Model,
    now: DateTime<Utc>,
    window: Duration,
    previous: Option<&giveaway_claim::Model>,
) -> giveaway_claim::Model {
    giveaway_claim::Model {
        id: id_gen.generate(),
        winner_id: winner.id.clone(),
        user_id: winner.user_id.clone(),
        giveaway_id: winner.giveaway_id.clone(),
        created_at: now,
        claim_deadline_at: now + window,
        status: ClaimStatus::Pending,
        reroll_count: previous.map_or(0, |p| p.reroll_count + 1),
        previous_claim_id: previous.map(|p| p.id.clone()),
        first_reminder_sent: false,
        final_reminder_sent: false,
        conversation_ref: None,
        conversation_opened_at: None,
        claimed_at: None,
        response_excerpt: None,
        resolved_at: None,
    }
}

/// Open one pending claim per winner.
pub(crate) async fn open_claims(
    store: &dyn GiveawayStore,
    id_gen: &IdGenerator,
    winners: &[giveaway_winner::Model],
    now: DateTime<Utc>,
    window: Duration,
) -> AppResult<Vec<giveaway_claim::Model>> {
    let mut claims = Vec::with_capacity(winners.len());
    for winner in winners {
        let claim = pending_claim(id_gen, winner, now, window, None);
        claims.push(store.insert_claim(claim).await?);
    }
    Ok(claims)
}

/// What happened to one expired claim.
enum Expiry {
    /// Another sweep resolved it first.
    Skipped,
    /// A replacement winner was drawn.
    Rerolled,
    /// No eligible entrant left, or rerolls are disabled.
    Exhausted,
    /// The giveaway was locked. The claim stays pending for the next sweep.
    Deferred,
}

enum Replacement {
    Winner(giveaway_winner::Model),
    Settled(Expiry),
}

/// Service following up on prize claims.
#[derive(Clone)]
pub struct ClaimService {
    store: Arc<dyn GiveawayStore>,
    giveaways: GiveawayService,
    announcer: Arc<dyn Announcer>,
    transcripts: Arc<dyn TranscriptReader>,
    policy: ClaimPolicy,
    id_gen: IdGenerator,
}

impl ClaimService {
    /// Create a new claim service.
    #[must_use]
    pub fn new(
        store: Arc<dyn GiveawayStore>,
        giveaways: GiveawayService,
        announcer: Arc<dyn Announcer>,
        transcripts: Arc<dyn TranscriptReader>,
        policy: ClaimPolicy,
    ) -> Self {
        Self {
            store,
            giveaways,
            announcer,
            transcripts,
            policy,
            id_gen: IdGenerator::new(),
        }
    }

    /// Look up a claim by id.
    pub async fn get(&self, id: &str) -> AppResult<Option<giveaway_claim::Model>> {
        self.store.find_claim(id).await
    }

    /// Every claim of a giveaway, including resolved ones.
    pub async fn list_for_giveaway(
        &self,
        giveaway_id: &str,
    ) -> AppResult<Vec<giveaway_claim::Model>> {
        self.store.find_claims_for_giveaway(giveaway_id).await
    }

    /// Remember the private conversation opened with the winner.
    pub async fn attach_conversation(
        &self,
        claim_id: &str,
        conversation_ref: &str,
        opened_at: DateTime<Utc>,
    ) -> AppResult<Outcome<giveaway_claim::Model>> {
        let patch = ClaimPatch {
            conversation_ref: Some(conversation_ref.to_string()),
            conversation_opened_at: Some(opened_at),
            ..ClaimPatch::default()
        };
        self.pending_update(claim_id, &ClaimGuard::status(ClaimStatus::Pending), &patch)
            .await
    }

    /// Mark a claim as claimed on staff confirmation.
    pub async fn confirm(
        &self,
        claim_id: &str,
        actor: &str,
    ) -> AppResult<Outcome<giveaway_claim::Model>> {
        let now = Utc::now();
        let patch = ClaimPatch {
            status: Some(ClaimStatus::Claimed),
            claimed_at: Some(now),
            resolved_at: Some(Some(now)),
            ..ClaimPatch::default()
        };
        let outcome = self
            .pending_update(claim_id, &ClaimGuard::status(ClaimStatus::Pending), &patch)
            .await?;

        if let Outcome::Done(claim) = &outcome {
            self.log(
                &claim.giveaway_id,
                actor,
                "claim_confirmed",
                json!({ "claimId": claim.id, "userId": claim.user_id }),
            )
            .await;
        }
        Ok(outcome)
    }

    async fn pending_update(
        &self,
        claim_id: &str,
        guard: &ClaimGuard,
        patch: &ClaimPatch,
    ) -> AppResult<Outcome<giveaway_claim::Model>> {
        Ok(match self.store.update_claim_if(claim_id, guard, patch).await? {
            ConditionalUpdate::Applied(claim) => Outcome::Done(claim),
            ConditionalUpdate::Rejected(None) => Outcome::Rejected(Rejection::NotFound),
            ConditionalUpdate::Rejected(Some(_)) => Outcome::Rejected(Rejection::NotPending),
        })
    }

    /// Run one claim sweep: responses first, then reminders, then expiry.
    ///
    /// Per-claim failures are logged and counted. Only a failure to list
    /// pending claims aborts the sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();
        self.detect_responses(now, &mut report).await?;
        self.send_reminders(now, &mut report).await?;
        self.expire(now, &mut report).await?;

        if report != SweepReport::default() {
            tracing::info!(
                claimed = report.claimed,
                reminders = report.reminders,
                expired = report.expired,
                rerolled = report.rerolled,
                exhausted = report.exhausted,
                failed = report.failed,
                "Claim sweep finished"
            );
        }
        Ok(report)
    }

    async fn detect_responses(&self, now: DateTime<Utc>, report: &mut SweepReport) -> AppResult<()> {
        let pending = self.store.find_pending_claims(SWEEP_LIMIT).await?;

        for claim in pending {
            let (Some(conversation), Some(opened_at)) =
                (claim.conversation_ref.as_deref(), claim.conversation_opened_at)
            else {
                continue;
            };

            let messages = match self
                .transcripts
                .recent_messages(conversation, TRANSCRIPT_LIMIT)
                .await
            {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(claim_id = %claim.id, error = %e, "Failed to read claim conversation");
                    report.failed += 1;
                    continue;
                }
            };

            let Some(reply) = messages
                .iter()
                .filter(|m| m.author_id == claim.user_id && m.sent_at >= opened_at)
                .min_by_key(|m| m.sent_at)
            else {
                continue;
            };

            let patch = ClaimPatch {
                status: Some(ClaimStatus::Claimed),
                claimed_at: Some(reply.sent_at),
                response_excerpt: Some(reply.content.chars().take(EXCERPT_CHARS).collect()),
                resolved_at: Some(Some(now)),
                ..ClaimPatch::default()
            };
            match self
                .store
                .update_claim_if(&claim.id, &ClaimGuard::status(ClaimStatus::Pending), &patch)
                .await
            {
                Ok(ConditionalUpdate::Applied(claimed)) => {
                    report.claimed += 1;
                    tracing::info!(claim_id = %claimed.id, user_id = %claimed.user_id, "Prize claimed");
                    self.notify(
                        &claimed.giveaway_id,
                        &ClaimNotice::Claimed {
                            user_id: claimed.user_id.clone(),
                        },
                    )
                    .await;
                }
                Ok(ConditionalUpdate::Rejected(_)) => {}
                Err(e) => {
                    tracing::error!(claim_id = %claim.id, error = %e, "Failed to mark claim claimed");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn send_reminders(&self, now: DateTime<Utc>, report: &mut SweepReport) -> AppResult<()> {
        let pending = self.store.find_pending_claims(SWEEP_LIMIT).await?;

        for claim in pending {
            if claim.claim_deadline_at <= now {
                continue;
            }
            let remaining = claim.claim_deadline_at - now;

            // The final reminder supersedes a first reminder that never went out.
            let (guard, patch, final_reminder) =
                if !claim.final_reminder_sent && remaining <= self.policy.final_reminder {
                    (
                        ClaimGuard {
                            final_reminder_sent: Some(false),
                            ..ClaimGuard::status(ClaimStatus::Pending)
                        },
                        ClaimPatch {
                            first_reminder_sent: Some(true),
                            final_reminder_sent: Some(true),
                            ..ClaimPatch::default()
                        },
                        true,
                    )
                } else if !claim.first_reminder_sent && remaining <= self.policy.first_reminder {
                    (
                        ClaimGuard {
                            first_reminder_sent: Some(false),
                            ..ClaimGuard::status(ClaimStatus::Pending)
                        },
                        ClaimPatch {
                            first_reminder_sent: Some(true),
                            ..ClaimPatch::default()
                        },
                        false,
                    )
                } else {
                    continue;
                };

            // Flag first so overlapping sweeps cannot both send.
            match self.store.update_claim_if(&claim.id, &guard, &patch).await {
                Ok(ConditionalUpdate::Applied(updated)) => {
                    report.reminders += 1;
                    self.notify(
                        &updated.giveaway_id,
                        &ClaimNotice::Reminder {
                            user_id: updated.user_id.clone(),
                            deadline: updated.claim_deadline_at,
                            final_reminder,
                        },
                    )
                    .await;
                }
                Ok(ConditionalUpdate::Rejected(_)) => {}
                Err(e) => {
                    tracing::error!(claim_id = %claim.id, error = %e, "Failed to flag reminder");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn expire(&self, now: DateTime<Utc>, report: &mut SweepReport) -> AppResult<()> {
        let pending = self.store.find_pending_claims(SWEEP_LIMIT).await?;

        for claim in pending.into_iter().filter(|c| c.claim_deadline_at < now) {
            match self.expire_one(&claim, now).await {
                Ok(Expiry::Skipped | Expiry::Deferred) => {}
                Ok(Expiry::Rerolled) => {
                    report.expired += 1;
                    report.rerolled += 1;
                }
                Ok(Expiry::Exhausted) => {
                    report.expired += 1;
                    report.exhausted += 1;
                }
                Err(e) => {
                    if e.is_store_auth_failure() {
                        return Err(e);
                    }
                    tracing::error!(claim_id = %claim.id, error = %e, "Failed to expire claim");
                    report.failed += 1;
                }
            }
        }
        Ok(())
    }

    async fn expire_one(&self, claim: &giveaway_claim::Model, now: DateTime<Utc>) -> AppResult<Expiry> {
        let unclaimed = ClaimPatch {
            status: Some(ClaimStatus::Unclaimed),
            resolved_at: Some(Some(now)),
            ..ClaimPatch::default()
        };
        let claim = match self
            .store
            .update_claim_if(&claim.id, &ClaimGuard::status(ClaimStatus::Pending), &unclaimed)
            .await?
        {
            ConditionalUpdate::Applied(claim) => claim,
            ConditionalUpdate::Rejected(_) => return Ok(Expiry::Skipped),
        };

        // Until the claim is marked rerolled it goes back to pending on any
        // failure, so the next sweep finishes the replacement.
        match self.replace(&claim, now).await {
            Ok(Expiry::Deferred) => {
                self.reopen(&claim).await;
                Ok(Expiry::Deferred)
            }
            Ok(expiry) => Ok(expiry),
            Err(e) => {
                self.reopen(&claim).await;
                Err(e)
            }
        }
    }

    /// Hand an unclaimed prize to the next entrant.
    ///
    /// An earlier attempt may have stopped after drawing the replacement
    /// winner or after opening the successor claim. Both are picked up here
    /// instead of drawing again.
    async fn replace(&self, claim: &giveaway_claim::Model, now: DateTime<Utc>) -> AppResult<Expiry> {
        let claims = self.store.find_claims_for_giveaway(&claim.giveaway_id).await?;
        let existing = claims
            .iter()
            .find(|c| c.previous_claim_id.as_deref() == Some(claim.id.as_str()))
            .cloned();

        let successor = match existing {
            Some(successor) => successor,
            None => {
                let winner = match self.undelivered_replacement(claim, &claims).await? {
                    Some(winner) => winner,
                    None => match self.draw_replacement(claim).await? {
                        Replacement::Winner(winner) => winner,
                        Replacement::Settled(expiry) => return Ok(expiry),
                    },
                };
                let successor =
                    pending_claim(&self.id_gen, &winner, now, self.policy.window, Some(claim));
                self.store.insert_claim(successor).await?
            }
        };

        let rerolled = ClaimPatch {
            status: Some(ClaimStatus::Rerolled),
            ..ClaimPatch::default()
        };
        self.store
            .update_claim_if(&claim.id, &ClaimGuard::status(ClaimStatus::Unclaimed), &rerolled)
            .await?;

        tracing::info!(
            claim_id = %claim.id,
            successor_id = %successor.id,
            user_id = %successor.user_id,
            "Replacement winner drawn"
        );
        self.notify(
            &claim.giveaway_id,
            &ClaimNotice::Unclaimed {
                user_id: claim.user_id.clone(),
            },
        )
        .await;
        self.notify(
            &claim.giveaway_id,
            &ClaimNotice::NewWinner {
                user_id: successor.user_id.clone(),
                deadline: successor.claim_deadline_at,
            },
        )
        .await;
        Ok(Expiry::Rerolled)
    }

    /// A replacement winner drawn for this claim that never got its own claim.
    async fn undelivered_replacement(
        &self,
        claim: &giveaway_claim::Model,
        claims: &[giveaway_claim::Model],
    ) -> AppResult<Option<giveaway_winner::Model>> {
        let winners = self.store.find_winners(&claim.giveaway_id).await?;
        Ok(winners.into_iter().find(|w| {
            w.method == WinnerMethod::Reroll
                && w.reroll_of.as_deref() == Some(claim.winner_id.as_str())
                && !claims.iter().any(|c| c.winner_id == w.id)
        }))
    }

    async fn draw_replacement(&self, claim: &giveaway_claim::Model) -> AppResult<Replacement> {
        let exclude_users = self.chain_users(claim).await?;
        let request = RerollRequest {
            count: Some(1),
            reroll_of: Some(claim.winner_id.clone()),
            exclude_users,
        };

        let report = match self
            .giveaways
            .reroll(&claim.giveaway_id, request, CLAIM_EXPIRY_ACTOR)
            .await?
        {
            Outcome::Done(report) => report,
            Outcome::Rejected(Rejection::Locked) => {
                return Ok(Replacement::Settled(Expiry::Deferred));
            }
            Outcome::Rejected(rejection) => {
                tracing::warn!(
                    claim_id = %claim.id,
                    giveaway_id = %claim.giveaway_id,
                    reason = rejection.code(),
                    "Claim expired, no replacement drawn"
                );
                self.notify(
                    &claim.giveaway_id,
                    &ClaimNotice::Unclaimed {
                        user_id: claim.user_id.clone(),
                    },
                )
                .await;
                self.log(
                    &claim.giveaway_id,
                    CLAIM_EXPIRY_ACTOR,
                    "claim_chain_stopped",
                    json!({ "claimId": claim.id, "reason": rejection.code() }),
                )
                .await;
                return Ok(Replacement::Settled(Expiry::Exhausted));
            }
        };

        match report.winners.into_iter().next() {
            Some(winner) => Ok(Replacement::Winner(winner)),
            None => {
                tracing::warn!(
                    claim_id = %claim.id,
                    giveaway_id = %claim.giveaway_id,
                    "Claim expired and no eligible entrant is left"
                );
                self.notify(
                    &claim.giveaway_id,
                    &ClaimNotice::Unclaimed {
                        user_id: claim.user_id.clone(),
                    },
                )
                .await;
                self.log(
                    &claim.giveaway_id,
                    CLAIM_EXPIRY_ACTOR,
                    "claim_chain_exhausted",
                    json!({ "claimId": claim.id, "rerollCount": claim.reroll_count }),
                )
                .await;
                Ok(Replacement::Settled(Expiry::Exhausted))
            }
        }
    }

    /// Users along this claim's chain, walking `previous_claim_id` back to the root.
    async fn chain_users(&self, claim: &giveaway_claim::Model) -> AppResult<Vec<String>> {
        let mut users = vec![claim.user_id.clone()];
        let mut visited = HashSet::from([claim.id.clone()]);
        let mut next = claim.previous_claim_id.clone();

        while let Some(id) = next {
            if !visited.insert(id.clone()) {
                tracing::warn!(claim_id = %claim.id, "Claim chain loops back on itself");
                break;
            }
            let Some(previous) = self.store.find_claim(&id).await? else {
                break;
            };
            users.push(previous.user_id.clone());
            next = previous.previous_claim_id;
        }
        Ok(users)
    }

    /// Put an unclaimed claim back to pending so a later sweep retries it.
    async fn reopen(&self, claim: &giveaway_claim::Model) {
        let patch = ClaimPatch {
            status: Some(ClaimStatus::Pending),
            resolved_at: Some(None),
            ..ClaimPatch::default()
        };
        if let Err(e) = self
            .store
            .update_claim_if(&claim.id, &ClaimGuard::status(ClaimStatus::Unclaimed), &patch)
            .await
        {
            tracing::error!(claim_id = %claim.id, error = %e, "Failed to reopen claim");
        }
    }

    async fn notify(&self, giveaway_id: &str, notice: &ClaimNotice) {
        let giveaway: giveaway::Model = match self.store.find_giveaway(giveaway_id).await {
            Ok(Some(giveaway)) => giveaway,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(giveaway_id = %giveaway_id, error = %e, "Failed to load giveaway for claim notice");
                return;
            }
        };
        if let Err(e) = self.announcer.claim_notice(&giveaway, notice).await {
            tracing::warn!(giveaway_id = %giveaway_id, error = %e, "Failed to send claim notice");
        }
    }

    async fn log(&self, giveaway_id: &str, actor: &str, action: &str, payload: serde_json::Value) {
        let record = giveaway_log::Model {
            id: self.id_gen.generate(),
            giveaway_id: giveaway_id.to_string(),
            actor: actor.to_string(),
            action: action.to_string(),
            payload,
            created_at: Utc::now(),
        };
        if let Err(e) = self.store.append_log(record).await {
            tracing::error!(giveaway_id = %giveaway_id, action, error = %e, "Failed to write audit log");
        }
    }
}
