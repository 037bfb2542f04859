//! Giveaway lifecycle service.
//!
//! State machine: `draft -> scheduled -> active -> {ended, cancelled}`.
//! End and reroll serialize on the giveaway's `processing` flag, which is
//! only ever taken through a conditional store update.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use prizebot_common::{AppError, AppResult, IdGenerator};
use prizebot_db::entities::{
    giveaway::{self, GiveawayOptions, GiveawayRules, GiveawayStatus},
    giveaway_claim,
    giveaway_entry::{self, EntryMethod},
    giveaway_log,
    giveaway_winner::{self, WinnerMethod},
};
use prizebot_db::store::{
    ConditionalUpdate, GiveawayGuard, GiveawayPatch, GiveawayStore, InsertOutcome,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use super::announcer::Announcer;
use super::claim::open_claims;
use super::draw::{self, DrawOptions, Ticket};
use super::outcome::{Outcome, Rejection};

/// Actor recorded for scheduler-driven transitions.
pub const SYSTEM_ACTOR: &str = "system:scheduler";

/// Input for creating a giveaway.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGiveawayInput {
    /// Owning guild.
    #[validate(length(min = 1, max = 32))]
    pub guild_id: String,
    /// Channel the announcement is posted in.
    #[validate(length(min = 1, max = 32))]
    pub channel_id: String,
    /// Headline of the announcement.
    #[validate(length(min = 1, max = 256))]
    pub title: String,
    /// Prize label copied onto each winner.
    #[validate(length(max = 256))]
    pub prize: Option<String>,
    /// Number of initial winners.
    #[validate(range(min = 1, max = 100))]
    pub winners_count: i32,
    /// Entry requirements and role weights.
    #[serde(default)]
    pub rules: GiveawayRules,
    /// Reroll, live update and draw filter switches.
    #[serde(default)]
    pub options: GiveawayOptions,
    /// Start later. Ignored for drafts until they are published.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// When the giveaway stops accepting entries and draws.
    pub ends_at: DateTime<Utc>,
    /// Keep the giveaway hidden until it is published.
    #[serde(default)]
    pub draft: bool,
    /// Commit the draw seed up front. One is generated at End otherwise.
    #[validate(length(min = 1, max = 128))]
    pub seed: Option<String>,
}

/// Member facts an adapter supplies with an entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberContext {
    /// Roles the member holds.
    #[serde(default)]
    pub role_ids: Vec<String>,
    /// When the member joined the guild, if known.
    pub joined_guild_at: Option<DateTime<Utc>>,
    /// Member locale, e.g. `en-US`.
    pub locale: Option<String>,
    /// The member is a bot account.
    #[serde(default)]
    pub is_bot: bool,
    /// Flagged as a likely alternate account by moderation.
    #[serde(default)]
    pub suspicious_alt: bool,
}

/// Request to enter a giveaway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterRequest {
    /// Platform id of the member.
    pub user_id: String,
    /// Name shown in entry listings.
    pub display_name: String,
    /// How the entry was made.
    #[serde(default = "default_entry_method")]
    pub method: EntryMethod,
    /// Facts used for eligibility and weighting.
    #[serde(default)]
    pub member: MemberContext,
}

const fn default_entry_method() -> EntryMethod {
    EntryMethod::Button
}

/// Result of an accepted entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterReport {
    /// The stored entry, new or existing.
    pub entry: giveaway_entry::Model,
    /// The member had already entered. Nothing changed.
    pub duplicate: bool,
}

/// Result of ending a giveaway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndReport {
    /// The giveaway after closing.
    pub giveaway: giveaway::Model,
    /// Initial winners in pick order.
    pub winners: Vec<giveaway_winner::Model>,
    /// One pending claim per winner.
    pub claims: Vec<giveaway_claim::Model>,
    /// Seed the draw ran with.
    pub seed: String,
    /// Entrants left after filtering.
    pub total_eligible: usize,
    /// Winners that could not be filled.
    pub shortfall: usize,
}

/// Request to draw replacement winners.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerollRequest {
    /// Number of winners to draw. Defaults to the giveaway's `winners_count`.
    pub count: Option<u32>,
    /// Winner record being replaced.
    pub reroll_of: Option<String>,
    /// Members to exclude on top of every past winner.
    #[serde(default)]
    pub exclude_users: Vec<String>,
}

/// Result of a reroll. An empty winner list means the pool is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RerollReport {
    /// Replacement winners in pick order.
    pub winners: Vec<giveaway_winner::Model>,
    /// Derived seed the reroll ran with.
    pub seed: String,
    /// Entrants left after filtering and exclusions.
    pub total_eligible: usize,
    /// Replacements that could not be filled.
    pub shortfall: usize,
}

/// Draw filters configured on the giveaway.
fn draw_options(options: &GiveawayOptions, seed: String) -> DrawOptions {
    DrawOptions {
        exclude_bots: options.exclude_bots,
        exclude_suspicious: options.exclude_suspicious,
        seed: Some(seed),
        ..DrawOptions::default()
    }
}

/// Highest role multiplier the member qualifies for, at least 1.
fn entry_weight(rules: &GiveawayRules, member: &MemberContext) -> i32 {
    member
        .role_ids
        .iter()
        .filter_map(|role| rules.role_weights.get(role))
        .copied()
        .max()
        .unwrap_or(1)
        .max(1)
}

/// Check entry requirements. Returns the reason on failure.
fn check_eligibility(
    rules: &GiveawayRules,
    member: &MemberContext,
    now: DateTime<Utc>,
) -> Result<(), String> {
    if !rules.required_role_ids.is_empty()
        && !rules
            .required_role_ids
            .iter()
            .any(|role| member.role_ids.contains(role))
    {
        return Err("missing required role".to_string());
    }

    if rules.min_membership_secs > 0 {
        let Some(joined) = member.joined_guild_at else {
            return Err("membership duration unknown".to_string());
        };
        if now - joined < Duration::seconds(rules.min_membership_secs) {
            return Err("member joined too recently".to_string());
        }
    }

    if !rules.allowed_locales.is_empty() {
        let allowed = member
            .locale
            .as_ref()
            .is_some_and(|locale| rules.allowed_locales.iter().any(|l| l.eq_ignore_ascii_case(locale)));
        if !allowed {
            return Err("locale not allowed".to_string());
        }
    }

    Ok(())
}

/// Service driving the giveaway state machine.
#[derive(Clone)]
pub struct GiveawayService {
    store: Arc<dyn GiveawayStore>,
    announcer: Arc<dyn Announcer>,
    claim_window: Duration,
    id_gen: IdGenerator,
}

impl GiveawayService {
    /// Create a new giveaway service.
    #[must_use]
    pub fn new(
        store: Arc<dyn GiveawayStore>,
        announcer: Arc<dyn Announcer>,
        claim_window: Duration,
    ) -> Self {
        Self {
            store,
            announcer,
            claim_window,
            id_gen: IdGenerator::new(),
        }
    }

    // ==================== Queries ====================

    /// Look up a giveaway by id.
    pub async fn get(&self, id: &str) -> AppResult<Option<giveaway::Model>> {
        self.store.find_giveaway(id).await
    }

    /// Giveaways of a guild, newest first, at most 100.
    pub async fn list(
        &self,
        guild_id: &str,
        status: Option<GiveawayStatus>,
        limit: u64,
    ) -> AppResult<Vec<giveaway::Model>> {
        self.store.list_by_guild(guild_id, status, limit.min(100)).await
    }

    /// Entries in join order.
    pub async fn entries(&self, id: &str) -> AppResult<Vec<giveaway_entry::Model>> {
        self.store.find_entries(id).await
    }

    /// Initial and replacement winners in pick order.
    pub async fn winners(&self, id: &str) -> AppResult<Vec<giveaway_winner::Model>> {
        self.store.find_winners(id).await
    }

    /// Audit trail, oldest first.
    pub async fn logs(&self, id: &str) -> AppResult<Vec<giveaway_log::Model>> {
        self.store.find_logs(id).await
    }

    // ==================== Transitions ====================

    /// Create a giveaway as a draft, scheduled, or immediately active.
    pub async fn create(
        &self,
        actor: &str,
        input: CreateGiveawayInput,
    ) -> AppResult<giveaway::Model> {
        input.validate()?;

        let now = Utc::now();
        if input.ends_at <= now {
            return Err(AppError::Validation("endsAt must be in the future".to_string()));
        }
        if let Some(scheduled_at) = input.scheduled_at {
            if scheduled_at >= input.ends_at {
                return Err(AppError::Validation(
                    "scheduledAt must be before endsAt".to_string(),
                ));
            }
        }
        if input.rules.entrants_cap < 0 {
            return Err(AppError::Validation("entrantsCap must not be negative".to_string()));
        }

        let status = if input.draft {
            GiveawayStatus::Draft
        } else if input.scheduled_at.is_some_and(|at| at > now) {
            GiveawayStatus::Scheduled
        } else {
            GiveawayStatus::Active
        };

        let model = giveaway::Model {
            id: self.id_gen.generate(),
            guild_id: input.guild_id,
            channel_id: input.channel_id,
            host_id: actor.to_string(),
            title: input.title,
            prize: input.prize,
            winners_count: input.winners_count,
            rules: input.rules,
            options: input.options,
            status,
            scheduled_at: input.scheduled_at,
            starts_at: (status == GiveawayStatus::Active).then_some(now),
            ends_at: input.ends_at,
            ended_at: None,
            cancelled_at: None,
            processing: false,
            processing_started_at: None,
            fair_rng_seed: input.seed,
            winners_announced: false,
            entries_count: 0,
            last_live_update_at: None,
            announcement_message_id: None,
            created_at: now,
        };

        let mut created = self.store.insert_giveaway(model).await?;
        self.log(&created.id, actor, "create", json!({ "status": status })).await;
        tracing::info!(giveaway_id = %created.id, status = status.as_str(), "Giveaway created");

        if status == GiveawayStatus::Active {
            created = self.publish_announcement(created).await;
        }
        Ok(created)
    }

    /// Publish a draft: scheduled if its start lies ahead, active otherwise.
    pub async fn publish(&self, id: &str, actor: &str) -> AppResult<Outcome<giveaway::Model>> {
        let Some(current) = self.store.find_giveaway(id).await? else {
            return Ok(Outcome::Rejected(Rejection::NotFound));
        };

        let now = Utc::now();
        let scheduled = current.scheduled_at.is_some_and(|at| at > now);
        let patch = if scheduled {
            GiveawayPatch {
                status: Some(GiveawayStatus::Scheduled),
                ..GiveawayPatch::default()
            }
        } else {
            GiveawayPatch {
                status: Some(GiveawayStatus::Active),
                starts_at: Some(now),
                ..GiveawayPatch::default()
            }
        };

        let published = match self
            .store
            .update_giveaway_if(id, &GiveawayGuard::status(GiveawayStatus::Draft), &patch)
            .await?
        {
            ConditionalUpdate::Applied(model) => model,
            ConditionalUpdate::Rejected(current) => return Ok(Self::transition_rejected(current)),
        };

        self.log(id, actor, "publish", json!({ "status": published.status }))
            .await;

        if published.status == GiveawayStatus::Active {
            return Ok(Outcome::Done(self.publish_announcement(published).await));
        }
        Ok(Outcome::Done(published))
    }

    /// Activate a scheduled giveaway whose start time has passed.
    ///
    /// Promoting an already active giveaway returns it unchanged.
    pub async fn promote(&self, id: &str, now: DateTime<Utc>) -> AppResult<Outcome<giveaway::Model>> {
        let guard = GiveawayGuard {
            scheduled_at_or_before: Some(now),
            ..GiveawayGuard::status(GiveawayStatus::Scheduled)
        };
        let patch = GiveawayPatch {
            status: Some(GiveawayStatus::Active),
            starts_at: Some(now),
            ..GiveawayPatch::default()
        };

        match self.store.update_giveaway_if(id, &guard, &patch).await? {
            ConditionalUpdate::Applied(model) => {
                self.log(id, SYSTEM_ACTOR, "promote", json!({})).await;
                tracing::info!(giveaway_id = %id, "Giveaway promoted");
                Ok(Outcome::Done(self.publish_announcement(model).await))
            }
            ConditionalUpdate::Rejected(Some(current))
                if current.status == GiveawayStatus::Active =>
            {
                Ok(Outcome::Done(current))
            }
            ConditionalUpdate::Rejected(current) => Ok(Self::transition_rejected(current)),
        }
    }

    /// End an active giveaway and draw its winners.
    ///
    /// Concurrent callers race on one conditional write; exactly one draws and
    /// the others get `not_active_or_locked`.
    pub async fn end(&self, id: &str, actor: &str) -> AppResult<Outcome<EndReport>> {
        let now = Utc::now();
        let lock = GiveawayPatch {
            processing: Some(true),
            processing_started_at: Some(Some(now)),
            ended_at: Some(Some(now)),
            ..GiveawayPatch::default()
        };

        let locked = match self
            .store
            .update_giveaway_if(id, &GiveawayGuard::unlocked(GiveawayStatus::Active), &lock)
            .await?
        {
            ConditionalUpdate::Applied(model) => model,
            ConditionalUpdate::Rejected(None) => return Ok(Outcome::Rejected(Rejection::NotFound)),
            ConditionalUpdate::Rejected(Some(_)) => {
                return Ok(Outcome::Rejected(Rejection::NotActiveOrLocked));
            }
        };

        match self.draw_and_close(locked, now).await {
            Ok(report) => {
                self.log(
                    id,
                    actor,
                    "end",
                    json!({
                        "winners": report.winners.iter().map(|w| &w.user_id).collect::<Vec<_>>(),
                        "seed": report.seed,
                        "totalEligible": report.total_eligible,
                        "shortfall": report.shortfall,
                    }),
                )
                .await;
                tracing::info!(
                    giveaway_id = %id,
                    winners = report.winners.len(),
                    shortfall = report.shortfall,
                    "Giveaway ended"
                );
                Ok(Outcome::Done(report))
            }
            Err(e) => {
                tracing::error!(giveaway_id = %id, error = %e, "End failed, releasing lock");
                let release = GiveawayPatch {
                    processing: Some(false),
                    processing_started_at: Some(None),
                    ended_at: Some(None),
                    ..GiveawayPatch::default()
                };
                let guard = GiveawayGuard {
                    processing: Some(true),
                    ..GiveawayGuard::status(GiveawayStatus::Active)
                };
                if let Err(release_err) = self.store.update_giveaway_if(id, &guard, &release).await {
                    tracing::error!(giveaway_id = %id, error = %release_err, "Failed to release lock");
                }
                Err(e)
            }
        }
    }

    /// Draw, open claims and close the giveaway under the processing lock.
    ///
    /// A failed attempt leaves its seed, winners and claims behind. A retry
    /// picks those up instead of drawing again, so an End that fails halfway
    /// never produces a second set of initial winners.
    async fn draw_and_close(
        &self,
        giveaway: giveaway::Model,
        now: DateTime<Utc>,
    ) -> AppResult<EndReport> {
        let seed = match giveaway.fair_rng_seed.clone() {
            Some(seed) => seed,
            None => self.commit_seed(&giveaway.id).await?,
        };

        let entries = self.store.find_entries(&giveaway.id).await?;
        let tickets: Vec<Ticket> = entries.iter().map(Ticket::from).collect();
        let count = usize::try_from(giveaway.winners_count).unwrap_or(0);
        let outcome = draw::pick(&tickets, count, &draw_options(&giveaway.options, seed));

        let drawn_before: Vec<giveaway_winner::Model> = self
            .store
            .find_winners(&giveaway.id)
            .await?
            .into_iter()
            .filter(|w| w.method == WinnerMethod::Initial)
            .collect();

        let winners = if drawn_before.is_empty() {
            let winners: Vec<giveaway_winner::Model> = outcome
                .winners
                .iter()
                .map(|ticket| giveaway_winner::Model {
                    id: self.id_gen.generate(),
                    giveaway_id: giveaway.id.clone(),
                    user_id: ticket.id.clone(),
                    picked_at: now,
                    method: WinnerMethod::Initial,
                    reroll_of: None,
                    prize: giveaway.prize.clone(),
                })
                .collect();
            self.store.insert_winners(winners.clone()).await?;
            winners
        } else {
            tracing::warn!(
                giveaway_id = %giveaway.id,
                winners = drawn_before.len(),
                "Resuming interrupted end with the winners already drawn"
            );
            drawn_before
        };

        let mut claims: Vec<giveaway_claim::Model> = self
            .store
            .find_claims_for_giveaway(&giveaway.id)
            .await?
            .into_iter()
            .filter(|c| winners.iter().any(|w| w.id == c.winner_id))
            .collect();
        let without_claim: Vec<giveaway_winner::Model> = winners
            .iter()
            .filter(|w| !claims.iter().any(|c| c.winner_id == w.id))
            .cloned()
            .collect();
        claims.extend(
            open_claims(
                self.store.as_ref(),
                &self.id_gen,
                &without_claim,
                now,
                self.claim_window,
            )
            .await?,
        );

        let close = GiveawayPatch {
            status: Some(GiveawayStatus::Ended),
            processing: Some(false),
            processing_started_at: Some(None),
            ..GiveawayPatch::default()
        };
        let guard = GiveawayGuard {
            processing: Some(true),
            ..GiveawayGuard::status(GiveawayStatus::Active)
        };
        let closed = self
            .store
            .update_giveaway_if(&giveaway.id, &guard, &close)
            .await?
            .applied()
            .ok_or_else(|| {
                AppError::Internal(format!("Lost processing lock on giveaway {}", giveaway.id))
            })?;

        Ok(EndReport {
            giveaway: closed,
            winners,
            claims,
            seed: outcome.seed_used,
            total_eligible: outcome.total_eligible,
            shortfall: outcome.shortfall,
        })
    }

    /// Store a fresh seed on a locked giveaway before anything is drawn with it.
    async fn commit_seed(&self, id: &str) -> AppResult<String> {
        let seed = draw::generate_seed();
        let patch = GiveawayPatch {
            fair_rng_seed: Some(seed.clone()),
            ..GiveawayPatch::default()
        };
        let guard = GiveawayGuard {
            processing: Some(true),
            ..GiveawayGuard::status(GiveawayStatus::Active)
        };
        self.store
            .update_giveaway_if(id, &guard, &patch)
            .await?
            .applied()
            .ok_or_else(|| AppError::Internal(format!("Lost processing lock on giveaway {id}")))?;
        Ok(seed)
    }

    /// Draw replacement winners for an ended giveaway.
    ///
    /// Everyone who ever won this giveaway is excluded. Claims are not opened
    /// here; the claim service attaches them for expiry rerolls.
    pub async fn reroll(
        &self,
        id: &str,
        request: RerollRequest,
        actor: &str,
    ) -> AppResult<Outcome<RerollReport>> {
        let Some(current) = self.store.find_giveaway(id).await? else {
            return Ok(Outcome::Rejected(Rejection::NotFound));
        };
        if current.status != GiveawayStatus::Ended {
            return Ok(Outcome::Rejected(Rejection::NotEnded));
        }
        if !current.options.allow_reroll {
            return Ok(Outcome::Rejected(Rejection::RerollDisabled));
        }

        let now = Utc::now();
        let lock = GiveawayPatch {
            processing: Some(true),
            processing_started_at: Some(Some(now)),
            ..GiveawayPatch::default()
        };
        let locked = match self
            .store
            .update_giveaway_if(id, &GiveawayGuard::unlocked(GiveawayStatus::Ended), &lock)
            .await?
        {
            ConditionalUpdate::Applied(model) => model,
            ConditionalUpdate::Rejected(Some(g)) if g.status == GiveawayStatus::Ended => {
                return Ok(Outcome::Rejected(Rejection::Locked));
            }
            ConditionalUpdate::Rejected(Some(_)) => {
                return Ok(Outcome::Rejected(Rejection::NotEnded));
            }
            ConditionalUpdate::Rejected(None) => return Ok(Outcome::Rejected(Rejection::NotFound)),
        };

        let result = self.draw_replacements(&locked, &request, now).await;

        let release = GiveawayPatch {
            processing: Some(false),
            processing_started_at: Some(None),
            ..GiveawayPatch::default()
        };
        let guard = GiveawayGuard {
            processing: Some(true),
            ..GiveawayGuard::status(GiveawayStatus::Ended)
        };
        if let Err(e) = self.store.update_giveaway_if(id, &guard, &release).await {
            tracing::error!(giveaway_id = %id, error = %e, "Failed to release reroll lock");
        }

        let report = result?;
        self.log(
            id,
            actor,
            "reroll",
            json!({
                "winners": report.winners.iter().map(|w| &w.user_id).collect::<Vec<_>>(),
                "rerollOf": request.reroll_of,
                "seed": report.seed,
                "shortfall": report.shortfall,
            }),
        )
        .await;
        tracing::info!(
            giveaway_id = %id,
            winners = report.winners.len(),
            shortfall = report.shortfall,
            "Giveaway rerolled"
        );
        Ok(Outcome::Done(report))
    }

    async fn draw_replacements(
        &self,
        giveaway: &giveaway::Model,
        request: &RerollRequest,
        now: DateTime<Utc>,
    ) -> AppResult<RerollReport> {
        let past_winners = self.store.find_winners(&giveaway.id).await?;
        let excluded: HashSet<&str> = past_winners
            .iter()
            .map(|w| w.user_id.as_str())
            .chain(request.exclude_users.iter().map(String::as_str))
            .collect();

        let entries = self.store.find_entries(&giveaway.id).await?;
        let tickets: Vec<Ticket> = entries
            .iter()
            .filter(|e| !excluded.contains(e.user_id.as_str()))
            .map(Ticket::from)
            .collect();

        // Seeds chain off the published end seed so rerolls replay too.
        let rerolls_so_far = past_winners
            .iter()
            .filter(|w| w.method == WinnerMethod::Reroll)
            .count();
        let seed = match &giveaway.fair_rng_seed {
            Some(base) => format!("{base}:reroll:{rerolls_so_far}"),
            None => draw::generate_seed(),
        };

        let count = request
            .count
            .map_or_else(|| usize::try_from(giveaway.winners_count).unwrap_or(0), |c| c as usize);
        let outcome = draw::pick(&tickets, count, &draw_options(&giveaway.options, seed));

        let winners: Vec<giveaway_winner::Model> = outcome
            .winners
            .iter()
            .map(|ticket| giveaway_winner::Model {
                id: self.id_gen.generate(),
                giveaway_id: giveaway.id.clone(),
                user_id: ticket.id.clone(),
                picked_at: now,
                method: WinnerMethod::Reroll,
                reroll_of: request.reroll_of.clone(),
                prize: giveaway.prize.clone(),
            })
            .collect();
        self.store.insert_winners(winners.clone()).await?;

        Ok(RerollReport {
            winners,
            seed: outcome.seed_used,
            total_eligible: outcome.total_eligible,
            shortfall: outcome.shortfall,
        })
    }

    /// Enter a member. Entering twice is a no-op reported as `duplicate`.
    pub async fn enter(&self, id: &str, request: EnterRequest) -> AppResult<Outcome<EnterReport>> {
        let Some(giveaway) = self.store.find_giveaway(id).await? else {
            return Ok(Outcome::Rejected(Rejection::NotFound));
        };
        let now = Utc::now();
        if !giveaway.is_open_at(now) {
            return Ok(Outcome::Rejected(Rejection::NotActive));
        }

        if let Some(entry) = self.store.find_entry(id, &request.user_id).await? {
            return Ok(Outcome::Done(EnterReport {
                entry,
                duplicate: true,
            }));
        }

        if let Err(reason) = check_eligibility(&giveaway.rules, &request.member, now) {
            return Ok(Outcome::Rejected(Rejection::NotEligible { reason }));
        }

        // Reserve a slot first so concurrent entries cannot overshoot the cap.
        // An End in progress has already read the entry list.
        let cap = giveaway.rules.entrants_cap;
        let guard = GiveawayGuard {
            entries_below: (cap > 0).then_some(cap),
            ..GiveawayGuard::unlocked(GiveawayStatus::Active)
        };
        let reserve = GiveawayPatch {
            entries_delta: 1,
            ..GiveawayPatch::default()
        };
        match self.store.update_giveaway_if(id, &guard, &reserve).await? {
            ConditionalUpdate::Applied(_) => {}
            ConditionalUpdate::Rejected(None) => return Ok(Outcome::Rejected(Rejection::NotFound)),
            ConditionalUpdate::Rejected(Some(current)) => {
                let rejection = if current.status == GiveawayStatus::Active && !current.processing {
                    Rejection::CapReached
                } else {
                    Rejection::NotActive
                };
                return Ok(Outcome::Rejected(rejection));
            }
        }

        let entry = giveaway_entry::Model {
            id: self.id_gen.generate(),
            giveaway_id: id.to_string(),
            user_id: request.user_id.clone(),
            display_name: request.display_name,
            joined_at: now,
            method: request.method,
            weight: entry_weight(&giveaway.rules, &request.member),
            is_bot: request.member.is_bot,
            suspicious_alt: request.member.suspicious_alt,
        };

        match self.store.insert_entry(entry.clone()).await {
            Ok(InsertOutcome::Inserted(entry)) => Ok(Outcome::Done(EnterReport {
                entry,
                duplicate: false,
            })),
            Ok(InsertOutcome::Duplicate) => {
                self.release_slot(id).await;
                let existing = self.store.find_entry(id, &request.user_id).await?;
                Ok(Outcome::Done(EnterReport {
                    entry: existing.unwrap_or(entry),
                    duplicate: true,
                }))
            }
            Err(e) => {
                self.release_slot(id).await;
                Err(e)
            }
        }
    }

    async fn release_slot(&self, id: &str) {
        let patch = GiveawayPatch {
            entries_delta: -1,
            ..GiveawayPatch::default()
        };
        if let Err(e) = self
            .store
            .update_giveaway_if(id, &GiveawayGuard::default(), &patch)
            .await
        {
            tracing::error!(giveaway_id = %id, error = %e, "Failed to release entry slot");
        }
    }

    /// Withdraw a member's entry from an active giveaway.
    pub async fn leave(&self, id: &str, user_id: &str) -> AppResult<Outcome<bool>> {
        let Some(giveaway) = self.store.find_giveaway(id).await? else {
            return Ok(Outcome::Rejected(Rejection::NotFound));
        };
        if !giveaway.is_open_at(Utc::now()) {
            return Ok(Outcome::Rejected(Rejection::NotActive));
        }

        let removed = self.store.delete_entry(id, user_id).await?;
        if removed {
            self.release_slot(id).await;
        }
        Ok(Outcome::Done(removed))
    }

    /// Cancel a scheduled or active giveaway.
    pub async fn cancel(&self, id: &str, actor: &str) -> AppResult<Outcome<giveaway::Model>> {
        let guard = GiveawayGuard {
            status_in: vec![GiveawayStatus::Scheduled, GiveawayStatus::Active],
            processing: Some(false),
            ..GiveawayGuard::default()
        };
        let patch = GiveawayPatch {
            status: Some(GiveawayStatus::Cancelled),
            cancelled_at: Some(Utc::now()),
            ..GiveawayPatch::default()
        };

        match self.store.update_giveaway_if(id, &guard, &patch).await? {
            ConditionalUpdate::Applied(model) => {
                self.log(id, actor, "cancel", json!({})).await;
                tracing::info!(giveaway_id = %id, "Giveaway cancelled");
                Ok(Outcome::Done(model))
            }
            ConditionalUpdate::Rejected(Some(current)) if current.processing => {
                Ok(Outcome::Rejected(Rejection::Locked))
            }
            ConditionalUpdate::Rejected(current) => Ok(Self::transition_rejected(current)),
        }
    }

    // ==================== Scheduler support ====================

    /// Flip `winners_announced` from false to true. Returns whether this call flipped it.
    pub async fn mark_winners_announced(&self, id: &str) -> AppResult<bool> {
        let guard = GiveawayGuard {
            winners_announced: Some(false),
            ..GiveawayGuard::status(GiveawayStatus::Ended)
        };
        let patch = GiveawayPatch {
            winners_announced: Some(true),
            ..GiveawayPatch::default()
        };
        Ok(self
            .store
            .update_giveaway_if(id, &guard, &patch)
            .await?
            .is_applied())
    }

    /// Record a live update, only while the giveaway is still active and unlocked.
    pub async fn touch_live_update(&self, id: &str, now: DateTime<Utc>) -> AppResult<bool> {
        let patch = GiveawayPatch {
            last_live_update_at: Some(now),
            ..GiveawayPatch::default()
        };
        Ok(self
            .store
            .update_giveaway_if(id, &GiveawayGuard::unlocked(GiveawayStatus::Active), &patch)
            .await?
            .is_applied())
    }

    /// Release processing locks taken before `cutoff`.
    ///
    /// An active giveaway gets its `ended_at` cleared so the next end tick
    /// picks it up again.
    pub async fn release_stale_locks(&self, cutoff: DateTime<Utc>, limit: u64) -> AppResult<usize> {
        let stale = self.store.find_stale_locks(cutoff, limit).await?;
        let mut released = 0;

        for giveaway in stale {
            let guard = GiveawayGuard {
                status_in: vec![giveaway.status],
                processing: Some(true),
                locked_before: Some(cutoff),
                ..GiveawayGuard::default()
            };
            let patch = GiveawayPatch {
                processing: Some(false),
                processing_started_at: Some(None),
                ended_at: (giveaway.status == GiveawayStatus::Active).then_some(None),
                ..GiveawayPatch::default()
            };

            if self
                .store
                .update_giveaway_if(&giveaway.id, &guard, &patch)
                .await?
                .is_applied()
            {
                released += 1;
                tracing::warn!(
                    giveaway_id = %giveaway.id,
                    locked_since = ?giveaway.processing_started_at,
                    "Released stale processing lock"
                );
                self.log(
                    &giveaway.id,
                    "system:watchdog",
                    "lock_released",
                    json!({ "lockedSince": giveaway.processing_started_at }),
                )
                .await;
            }
        }

        Ok(released)
    }

    /// Post the opening announcement and remember its message reference.
    ///
    /// Failures are logged; the giveaway simply gets no live updates.
    async fn publish_announcement(&self, giveaway: giveaway::Model) -> giveaway::Model {
        let message = match self.announcer.publish(&giveaway).await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(giveaway_id = %giveaway.id, error = %e, "Failed to publish announcement");
                return giveaway;
            }
        };

        let patch = GiveawayPatch {
            announcement_message_id: Some(message.0),
            ..GiveawayPatch::default()
        };
        match self
            .store
            .update_giveaway_if(&giveaway.id, &GiveawayGuard::default(), &patch)
            .await
        {
            Ok(ConditionalUpdate::Applied(updated)) => updated,
            Ok(ConditionalUpdate::Rejected(_)) => giveaway,
            Err(e) => {
                tracing::warn!(giveaway_id = %giveaway.id, error = %e, "Failed to store announcement reference");
                giveaway
            }
        }
    }

    fn transition_rejected<T>(current: Option<giveaway::Model>) -> Outcome<T> {
        match current {
            None => Outcome::Rejected(Rejection::NotFound),
            Some(model) => Outcome::Rejected(Rejection::InvalidTransition { from: model.status }),
        }
    }

    /// Append an audit record. Audit failures never undo a committed transition.
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
