//! Prizebot server entry point.

use std::sync::Arc;

use axum::Router;
use prizebot_api::{AppState, router as api_router};
use prizebot_common::Config;
use prizebot_core::{
    Announcer, ClaimPolicy, ClaimService, DiscordTranscriptReader, DiscordWebhookAnnouncer,
    GiveawayService, NoOpAnnouncer, NoOpTranscriptReader, TranscriptReader,
};
use prizebot_db::store::{GiveawayStore, MemoryStore, SeaOrmStore};
use prizebot_queue::{GiveawayJobExecutor, KillSwitch, SchedulerConfig, run_scheduler};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Open the configured store, running migrations for `PostgreSQL`.
async fn open_store(config: &Config) -> Result<Arc<dyn GiveawayStore>, Box<dyn std::error::Error>> {
    if config.database.is_memory() {
        warn!("Using the in-memory store, state is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = prizebot_db::init(config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    prizebot_db::migrate(&db).await?;
    info!("Migrations completed");

    Ok(Arc::new(SeaOrmStore::new(Arc::new(db))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prizebot=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting prizebot server...");

    // Load configuration
    let config = Config::load()?;

    let store = open_store(&config).await?;

    let announcer: Arc<dyn Announcer> = match &config.discord.webhook_url {
        Some(url) => {
            info!("Posting announcements through the Discord webhook");
            Arc::new(DiscordWebhookAnnouncer::new(url.clone())?)
        }
        None => {
            warn!("No webhook configured, announcements are disabled");
            Arc::new(NoOpAnnouncer)
        }
    };

    let transcripts: Arc<dyn TranscriptReader> = match &config.discord.bot_token {
        Some(token) => Arc::new(DiscordTranscriptReader::new(
            config.discord.api_base.clone(),
            token.clone(),
        )?),
        None => {
            warn!("No bot token configured, claim responses must be confirmed by staff");
            Arc::new(NoOpTranscriptReader)
        }
    };

    // Initialize services
    let policy = ClaimPolicy::from(&config.claims);
    let giveaway_service = GiveawayService::new(store.clone(), announcer.clone(), policy.window);
    let claim_service = ClaimService::new(
        store.clone(),
        giveaway_service.clone(),
        announcer.clone(),
        transcripts,
        policy,
    );

    // Start scheduler
    if config.scheduler.enabled {
        let scheduler_config = SchedulerConfig::from(&config.scheduler);
        let kill_switch = Arc::new(KillSwitch::new(scheduler_config.kill_switch_threshold));
        let executor = Arc::new(GiveawayJobExecutor::new(
            store,
            giveaway_service.clone(),
            claim_service.clone(),
            announcer,
            scheduler_config.clone(),
        ));
        run_scheduler(&scheduler_config, executor, kill_switch);
        info!("Scheduler started");
    } else {
        warn!("Scheduler disabled by configuration");
    }

    let state = AppState {
        giveaway_service,
        claim_service,
        admin_token: Arc::from(config.api.admin_token.as_str()),
    };

    // Build router
    let app = Router::new()
        .nest("/api", api_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
