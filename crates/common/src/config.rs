//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Staff API configuration.
    pub api: ApiConfig,
    /// Chat platform configuration.
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Scheduler tick configuration.
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Prize claim configuration.
    #[serde(default)]
    pub claims: ClaimSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL, or `memory://` for the in-process store.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl DatabaseConfig {
    /// Whether the in-process store was requested.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.url.starts_with("memory:")
    }
}

/// Staff API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bearer token required on every staff request.
    pub admin_token: String,
}

/// Discord configuration for announcements and transcript reads.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Webhook used for public announcements. Announcements are skipped when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Bot token used to read claim conversations.
    #[serde(default)]
    pub bot_token: Option<String>,
    /// REST API base URL.
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            bot_token: None,
            api_base: default_discord_api_base(),
        }
    }
}

/// Scheduler tick intervals and limits.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// Whether the background ticks run at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between scheduled-giveaway promotion ticks.
    #[serde(default = "default_promote_interval")]
    pub promote_interval_secs: u64,
    /// Seconds between end ticks.
    #[serde(default = "default_end_interval")]
    pub end_interval_secs: u64,
    /// Seconds between live announcement ticks.
    #[serde(default = "default_live_update_interval")]
    pub live_update_interval_secs: u64,
    /// Seconds between claim sweeps.
    #[serde(default = "default_claim_sweep_interval")]
    pub claim_sweep_interval_secs: u64,
    /// Seconds between stale-lock watchdog runs.
    #[serde(default = "default_lock_watchdog_interval")]
    pub lock_watchdog_interval_secs: u64,
    /// Maximum giveaways ended per end tick.
    #[serde(default = "default_end_batch_size")]
    pub end_batch_size: u64,
    /// Age after which a `processing` lock is considered abandoned.
    #[serde(default = "default_stale_lock_timeout")]
    pub stale_lock_timeout_secs: u64,
    /// Consecutive store authorization failures that disable all ticks.
    #[serde(default = "default_kill_switch_threshold")]
    pub kill_switch_threshold: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            promote_interval_secs: default_promote_interval(),
            end_interval_secs: default_end_interval(),
            live_update_interval_secs: default_live_update_interval(),
            claim_sweep_interval_secs: default_claim_sweep_interval(),
            lock_watchdog_interval_secs: default_lock_watchdog_interval(),
            end_batch_size: default_end_batch_size(),
            stale_lock_timeout_secs: default_stale_lock_timeout(),
            kill_switch_threshold: default_kill_switch_threshold(),
        }
    }
}

/// Prize claim windows.
#[derive(Debug, Clone, Deserialize)]
pub struct ClaimSettings {
    /// Hours a winner has to respond.
    #[serde(default = "default_claim_window_hours")]
    pub window_hours: i64,
    /// Hours before the deadline at which the first reminder goes out.
    #[serde(default = "default_first_reminder_hours")]
    pub first_reminder_hours: i64,
    /// Hours before the deadline at which the final reminder goes out.
    #[serde(default = "default_final_reminder_hours")]
    pub final_reminder_hours: i64,
}

impl Default for ClaimSettings {
    fn default() -> Self {
        Self {
            window_hours: default_claim_window_hours(),
            first_reminder_hours: default_first_reminder_hours(),
            final_reminder_hours: default_final_reminder_hours(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_promote_interval() -> u64 {
    10
}

const fn default_end_interval() -> u64 {
    8
}

const fn default_live_update_interval() -> u64 {
    30
}

const fn default_claim_sweep_interval() -> u64 {
    300
}

const fn default_lock_watchdog_interval() -> u64 {
    60
}

const fn default_end_batch_size() -> u64 {
    10
}

const fn default_stale_lock_timeout() -> u64 {
    600
}

const fn default_kill_switch_threshold() -> u32 {
    3
}

const fn default_claim_window_hours() -> i64 {
    48
}

const fn default_first_reminder_hours() -> i64 {
    24
}

const fn default_final_reminder_hours() -> i64 {
    6
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `PRIZEBOT_ENV`)
    /// 4. Environment variables with `PRIZEBOT__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("PRIZEBOT_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("PRIZEBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("PRIZEBOT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
