//! Job executor backed by the giveaway services.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use prizebot_common::{AppError, AppResult};
use prizebot_core::{
    Announcer, ClaimService, GiveawayService, LiveUpdate, MessageRef, Outcome, SYSTEM_ACTOR,
};
use prizebot_db::entities::giveaway;
use prizebot_db::store::GiveawayStore;

use crate::scheduler::{JobExecutor, SchedulerConfig, TickReport};

/// Upper bound on giveaways handled per promote, live-update or watchdog tick.
const TICK_BATCH: u64 = 100;

/// Executes scheduler ticks against the giveaway engine.
#[derive(Clone)]
pub struct GiveawayJobExecutor {
    store: Arc<dyn GiveawayStore>,
    giveaways: GiveawayService,
    claims: ClaimService,
    announcer: Arc<dyn Announcer>,
    config: SchedulerConfig,
}

impl GiveawayJobExecutor {
    /// Create a new executor.
    #[must_use]
    pub fn new(
        store: Arc<dyn GiveawayStore>,
        giveaways: GiveawayService,
        claims: ClaimService,
        announcer: Arc<dyn Announcer>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            giveaways,
            claims,
            announcer,
            config,
        }
    }

    /// Announce winners of ended giveaways that have not been announced yet.
    ///
    /// The flag only flips after a successful send, so a failed send is
    /// retried on the next tick.
    async fn announce_pending(&self, report: &mut TickReport) -> AppResult<()> {
        for giveaway in self.store.find_unannounced(self.config.end_batch_size).await? {
            if let Err(e) = self.announce_one(&giveaway).await {
                if e.is_store_auth_failure() {
                    return Err(e);
                }
                tracing::warn!(giveaway_id = %giveaway.id, error = %e, "Winner announcement failed, will retry");
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn announce_one(&self, giveaway: &giveaway::Model) -> AppResult<()> {
        let winners = self.giveaways.winners(&giveaway.id).await?;
        self.announcer.announce_winners(giveaway, &winners).await?;
        if self.giveaways.mark_winners_announced(&giveaway.id).await? {
            tracing::info!(giveaway_id = %giveaway.id, winners = winners.len(), "Winners announced");
        }
        Ok(())
    }

    async fn live_update_one(&self, giveaway: &giveaway::Model, now: DateTime<Utc>) -> AppResult<bool> {
        let every = giveaway.options.live_update_interval_secs;
        if every <= 0 || giveaway.ends_at <= now {
            return Ok(false);
        }
        if giveaway
            .last_live_update_at
            .is_some_and(|last| now - last < Duration::seconds(every))
        {
            return Ok(false);
        }
        let Some(message) = giveaway.announcement_message_id.clone() else {
            return Ok(false);
        };

        let update = LiveUpdate {
            entries_count: giveaway.entries_count,
            ends_at: giveaway.ends_at,
        };
        self.announcer.edit(&MessageRef(message), &update).await?;
        self.giveaways.touch_live_update(&giveaway.id, now).await
    }
}

/// Count a per-item failure, propagating only store authorization failures.
fn absorb(report: &mut TickReport, giveaway_id: &str, action: &str, error: AppError) -> AppResult<()> {
    if error.is_store_auth_failure() {
        return Err(error);
    }
    tracing::error!(giveaway_id = %giveaway_id, action, error = %error, "Scheduled job item failed");
    report.failed += 1;
    Ok(())
}

#[async_trait]
impl JobExecutor for GiveawayJobExecutor {
    async fn promote_due(&self, now: DateTime<Utc>) -> AppResult<TickReport> {
        let mut report = TickReport::default();
        for giveaway in self.store.find_due_scheduled(now, TICK_BATCH).await? {
            match self.giveaways.promote(&giveaway.id, now).await {
                Ok(Outcome::Done(_)) => report.processed += 1,
                Ok(Outcome::Rejected(rejection)) => {
                    tracing::debug!(giveaway_id = %giveaway.id, reason = rejection.code(), "Promote skipped");
                }
                Err(e) => absorb(&mut report, &giveaway.id, "promote", e)?,
            }
        }
        Ok(report)
    }

    async fn end_due(&self, now: DateTime<Utc>) -> AppResult<TickReport> {
        let mut report = TickReport::default();
        for giveaway in self
            .store
            .find_due_active(now, self.config.end_batch_size)
            .await?
        {
            match self.giveaways.end(&giveaway.id, SYSTEM_ACTOR).await {
                Ok(Outcome::Done(_)) => report.processed += 1,
                // Another scheduler instance got there first.
                Ok(Outcome::Rejected(rejection)) => {
                    tracing::debug!(giveaway_id = %giveaway.id, reason = rejection.code(), "End skipped");
                }
                Err(e) => absorb(&mut report, &giveaway.id, "end", e)?,
            }
        }

        self.announce_pending(&mut report).await?;
        Ok(report)
    }

    async fn live_update(&self, now: DateTime<Utc>) -> AppResult<TickReport> {
        let mut report = TickReport::default();
        for giveaway in self
            .store
            .find_live_update_candidates(now, TICK_BATCH)
            .await?
        {
            match self.live_update_one(&giveaway, now).await {
                Ok(true) => report.processed += 1,
                Ok(false) => {}
                Err(e) => absorb(&mut report, &giveaway.id, "live_update", e)?,
            }
        }
        Ok(report)
    }

    async fn sweep_claims(&self, now: DateTime<Utc>) -> AppResult<TickReport> {
        let sweep = self.claims.sweep(now).await?;
        Ok(TickReport {
            processed: (sweep.claimed + sweep.reminders + sweep.expired) as u64,
            failed: sweep.failed as u64,
        })
    }

    async fn release_stale_locks(&self, now: DateTime<Utc>) -> AppResult<TickReport> {
        let cutoff = now - self.config.stale_lock_timeout;
        let released = self.giveaways.release_stale_locks(cutoff, TICK_BATCH).await?;
        Ok(TickReport {
            processed: released as u64,
            failed: 0,
        })
    }
}
