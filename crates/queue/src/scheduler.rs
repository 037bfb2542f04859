//! Periodic ticks driving the giveaway engine.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use prizebot_common::{AppResult, SchedulerSettings};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::kill_switch::KillSwitch;

/// Tick kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Activate scheduled giveaways whose start time passed.
    Promote,
    /// End due giveaways and announce their winners.
    End,
    /// Edit public announcements of running giveaways.
    LiveUpdate,
    /// Claim reminders, response detection and expiry.
    ClaimSweep,
    /// Release abandoned processing locks.
    LockWatchdog,
}

impl Tick {
    pub const ALL: [Self; 5] = [
        Self::Promote,
        Self::End,
        Self::LiveUpdate,
        Self::ClaimSweep,
        Self::LockWatchdog,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Promote => "promote",
            Self::End => "end",
            Self::LiveUpdate => "live_update",
            Self::ClaimSweep => "claim_sweep",
            Self::LockWatchdog => "lock_watchdog",
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub promote_interval: Duration,
    pub end_interval: Duration,
    pub live_update_interval: Duration,
    pub claim_sweep_interval: Duration,
    pub lock_watchdog_interval: Duration,
    /// Maximum giveaways ended per end tick.
    pub end_batch_size: u64,
    /// Age after which a processing lock is released by the watchdog.
    pub stale_lock_timeout: chrono::Duration,
    pub kill_switch_threshold: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            promote_interval: Duration::from_secs(settings.promote_interval_secs.max(1)),
            end_interval: Duration::from_secs(settings.end_interval_secs.max(1)),
            live_update_interval: Duration::from_secs(settings.live_update_interval_secs.max(1)),
            claim_sweep_interval: Duration::from_secs(settings.claim_sweep_interval_secs.max(1)),
            lock_watchdog_interval: Duration::from_secs(
                settings.lock_watchdog_interval_secs.max(1),
            ),
            end_batch_size: settings.end_batch_size.max(1),
            stale_lock_timeout: chrono::Duration::seconds(
                i64::try_from(settings.stale_lock_timeout_secs).unwrap_or(i64::MAX / 1000),
            ),
            kill_switch_threshold: settings.kill_switch_threshold,
        }
    }
}

impl SchedulerConfig {
    #[must_use]
    pub const fn interval_for(&self, tick: Tick) -> Duration {
        match tick {
            Tick::Promote => self.promote_interval,
            Tick::End => self.end_interval,
            Tick::LiveUpdate => self.live_update_interval,
            Tick::ClaimSweep => self.claim_sweep_interval,
            Tick::LockWatchdog => self.lock_watchdog_interval,
        }
    }
}

/// Counters from one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub processed: u64,
    /// Items whose processing failed and were left for the next tick.
    pub failed: u64,
}

impl TickReport {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.processed == 0 && self.failed == 0
    }
}

/// Job executor trait for scheduled ticks.
///
/// Implementations handle per-item failures themselves and only return an
/// error when the whole tick could not run.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    async fn promote_due(&self, now: DateTime<Utc>) -> AppResult<TickReport>;

    async fn end_due(&self, now: DateTime<Utc>) -> AppResult<TickReport>;

    async fn live_update(&self, now: DateTime<Utc>) -> AppResult<TickReport>;

    async fn sweep_claims(&self, now: DateTime<Utc>) -> AppResult<TickReport>;

    async fn release_stale_locks(&self, now: DateTime<Utc>) -> AppResult<TickReport>;
}

/// Run one tick of the given kind.
pub async fn run_tick<E: JobExecutor + ?Sized>(
    executor: &E,
    tick: Tick,
    now: DateTime<Utc>,
) -> AppResult<TickReport> {
    match tick {
        Tick::Promote => executor.promote_due(now).await,
        Tick::End => executor.end_due(now).await,
        Tick::LiveUpdate => executor.live_update(now).await,
        Tick::ClaimSweep => executor.sweep_claims(now).await,
        Tick::LockWatchdog => executor.release_stale_locks(now).await,
    }
}

/// Run the scheduler with the given configuration and executor.
///
/// Spawns one task per tick kind. Every task stops once the kill-switch trips.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: &SchedulerConfig,
    executor: Arc<E>,
    kill_switch: Arc<KillSwitch>,
) -> Vec<JoinHandle<()>> {
    Tick::ALL
        .into_iter()
        .map(|tick| {
            let period = config.interval_for(tick);
            let executor = executor.clone();
            let kill_switch = kill_switch.clone();
            tokio::spawn(async move {
                let mut interval = interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    interval.tick().await;
                    if kill_switch.is_tripped() {
                        tracing::warn!(tick = tick.name(), "Kill-switch tripped, stopping tick");
                        break;
                    }
                    match run_tick(executor.as_ref(), tick, Utc::now()).await {
                        Ok(report) => {
                            kill_switch.record_success();
                            if !report.is_empty() {
                                tracing::info!(
                                    tick = tick.name(),
                                    processed = report.processed,
                                    failed = report.failed,
                                    "Tick finished"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::error!(tick = tick.name(), error = %e, "Tick failed");
                            kill_switch.record_failure(&e);
                        }
                    }
                }
            })
        })
        .collect()
}
