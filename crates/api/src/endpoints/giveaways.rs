//! Giveaway endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, Utc};
use prizebot_common::{AppError, AppResult};
use prizebot_core::{
    CreateGiveawayInput, EndReport, EnterReport, EnterRequest, RerollReport, RerollRequest,
};
use prizebot_db::entities::{
    giveaway::{self, GiveawayOptions, GiveawayRules, GiveawayStatus},
    giveaway_entry::{self, EntryMethod},
    giveaway_log,
    giveaway_winner::{self, WinnerMethod},
};
use serde::{Deserialize, Serialize};

use crate::{extractors::Staff, middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Giveaway response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveawayResponse {
    pub id: String,
    pub guild_id: String,
    pub channel_id: String,
    pub host_id: String,
    pub title: String,
    pub prize: Option<String>,
    pub winners_count: i32,
    pub rules: GiveawayRules,
    pub options: GiveawayOptions,
    pub status: GiveawayStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub processing: bool,
    pub fair_rng_seed: Option<String>,
    pub winners_announced: bool,
    pub entries_count: i32,
    pub announcement_message_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<giveaway::Model> for GiveawayResponse {
    fn from(g: giveaway::Model) -> Self {
        Self {
            id: g.id,
            guild_id: g.guild_id,
            channel_id: g.channel_id,
            host_id: g.host_id,
            title: g.title,
            prize: g.prize,
            winners_count: g.winners_count,
            rules: g.rules,
            options: g.options,
            status: g.status,
            scheduled_at: g.scheduled_at,
            starts_at: g.starts_at,
            ends_at: g.ends_at,
            ended_at: g.ended_at,
            cancelled_at: g.cancelled_at,
            processing: g.processing,
            fair_rng_seed: g.fair_rng_seed,
            winners_announced: g.winners_announced,
            entries_count: g.entries_count,
            announcement_message_id: g.announcement_message_id,
            created_at: g.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryResponse {
    pub id: String,
    pub user_id: String,
    pub display_name: String,
    pub joined_at: DateTime<Utc>,
    pub method: EntryMethod,
    pub weight: i32,
    pub is_bot: bool,
    pub suspicious_alt: bool,
}

impl From<giveaway_entry::Model> for EntryResponse {
    fn from(e: giveaway_entry::Model) -> Self {
        Self {
            id: e.id,
            user_id: e.user_id,
            display_name: e.display_name,
            joined_at: e.joined_at,
            method: e.method,
            weight: e.weight,
            is_bot: e.is_bot,
            suspicious_alt: e.suspicious_alt,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerResponse {
    pub id: String,
    pub user_id: String,
    pub picked_at: DateTime<Utc>,
    pub method: WinnerMethod,
    pub reroll_of: Option<String>,
    pub prize: Option<String>,
}

impl From<giveaway_winner::Model> for WinnerResponse {
    fn from(w: giveaway_winner::Model) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            picked_at: w.picked_at,
            method: w.method,
            reroll_of: w.reroll_of,
            prize: w.prize,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogResponse {
    pub id: String,
    pub actor: String,
    pub action: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<giveaway_log::Model> for LogResponse {
    fn from(l: giveaway_log::Model) -> Self {
        Self {
            id: l.id,
            actor: l.actor,
            action: l.action,
            payload: l.payload,
            created_at: l.created_at,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndResponse {
    pub giveaway: GiveawayResponse,
    pub winners: Vec<WinnerResponse>,
    pub seed: String,
    pub total_eligible: usize,
    pub shortfall: usize,
}

impl From<EndReport> for EndResponse {
    fn from(r: EndReport) -> Self {
        Self {
            giveaway: r.giveaway.into(),
            winners: r.winners.into_iter().map(Into::into).collect(),
            seed: r.seed,
            total_eligible: r.total_eligible,
            shortfall: r.shortfall,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RerollResponse {
    pub winners: Vec<WinnerResponse>,
    pub seed: String,
    pub total_eligible: usize,
    pub shortfall: usize,
    /// No eligible entrant was left for at least one requested winner.
    pub exhausted: bool,
}

impl From<RerollReport> for RerollResponse {
    fn from(r: RerollReport) -> Self {
        Self {
            winners: r.winners.into_iter().map(Into::into).collect(),
            seed: r.seed,
            total_eligible: r.total_eligible,
            exhausted: r.shortfall > 0,
            shortfall: r.shortfall,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterResponse {
    pub entry: EntryResponse,
    pub duplicate: bool,
}

impl From<EnterReport> for EnterResponse {
    fn from(r: EnterReport) -> Self {
        Self {
            entry: r.entry.into(),
            duplicate: r.duplicate,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveResponse {
    pub removed: bool,
}

impl From<bool> for LeaveResponse {
    fn from(removed: bool) -> Self {
        Self { removed }
    }
}

/// Request naming one giveaway.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveawayIdRequest {
    pub giveaway_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGiveawaysRequest {
    pub guild_id: String,
    pub status: Option<GiveawayStatus>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    10
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerollGiveawayRequest {
    pub giveaway_id: String,
    #[serde(flatten)]
    pub reroll: RerollRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnterGiveawayRequest {
    pub giveaway_id: String,
    #[serde(flatten)]
    pub entry: EnterRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveGiveawayRequest {
    pub giveaway_id: String,
    pub user_id: String,
}

// ==================== Handlers ====================

/// Create a giveaway.
async fn create(
    Staff(actor): Staff,
    State(state): State<AppState>,
    Json(req): Json<CreateGiveawayInput>,
) -> AppResult<ApiResponse<GiveawayResponse>> {
    let giveaway = state.giveaway_service.create(&actor, req).await?;
    Ok(ApiResponse::ok(giveaway.into()))
}

/// Show a giveaway.
async fn show(
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<GiveawayResponse>> {
    let giveaway = state
        .giveaway_service
        .get(&req.giveaway_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Giveaway {}", req.giveaway_id)))?;
    Ok(ApiResponse::ok(giveaway.into()))
}

/// List a guild's giveaways, newest first.
async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListGiveawaysRequest>,
) -> AppResult<ApiResponse<Vec<GiveawayResponse>>> {
    let giveaways = state
        .giveaway_service
        .list(&req.guild_id, req.status, req.limit)
        .await?;
    Ok(ApiResponse::ok(giveaways.into_iter().map(Into::into).collect()))
}

/// Publish a draft.
async fn publish(
    Staff(actor): Staff,
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<GiveawayResponse>> {
    let outcome = state.giveaway_service.publish(&req.giveaway_id, &actor).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// End a giveaway now and draw its winners.
async fn end(
    Staff(actor): Staff,
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<EndResponse>> {
    let outcome = state.giveaway_service.end(&req.giveaway_id, &actor).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Draw replacement winners.
async fn reroll(
    Staff(actor): Staff,
    State(state): State<AppState>,
    Json(req): Json<RerollGiveawayRequest>,
) -> AppResult<ApiResponse<RerollResponse>> {
    let outcome = state
        .giveaway_service
        .reroll(&req.giveaway_id, req.reroll, &actor)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Cancel a scheduled or active giveaway.
async fn cancel(
    Staff(actor): Staff,
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<GiveawayResponse>> {
    let outcome = state.giveaway_service.cancel(&req.giveaway_id, &actor).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Enter a member on their behalf.
async fn enter(
    State(state): State<AppState>,
    Json(req): Json<EnterGiveawayRequest>,
) -> AppResult<ApiResponse<EnterResponse>> {
    let outcome = state.giveaway_service.enter(&req.giveaway_id, req.entry).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Withdraw a member's entry.
async fn leave(
    State(state): State<AppState>,
    Json(req): Json<LeaveGiveawayRequest>,
) -> AppResult<ApiResponse<LeaveResponse>> {
    let outcome = state
        .giveaway_service
        .leave(&req.giveaway_id, &req.user_id)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

async fn entries(
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<Vec<EntryResponse>>> {
    let entries = state.giveaway_service.entries(&req.giveaway_id).await?;
    Ok(ApiResponse::ok(entries.into_iter().map(Into::into).collect()))
}

async fn winners(
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<Vec<WinnerResponse>>> {
    let winners = state.giveaway_service.winners(&req.giveaway_id).await?;
    Ok(ApiResponse::ok(winners.into_iter().map(Into::into).collect()))
}

async fn logs(
    State(state): State<AppState>,
    Json(req): Json<GiveawayIdRequest>,
) -> AppResult<ApiResponse<Vec<LogResponse>>> {
    let logs = state.giveaway_service.logs(&req.giveaway_id).await?;
    Ok(ApiResponse::ok(logs.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/publish", post(publish))
        .route("/end", post(end))
        .route("/reroll", post(reroll))
        .route("/cancel", post(cancel))
        .route("/enter", post(enter))
        .route("/leave", post(leave))
        .route("/entries", post(entries))
        .route("/winners", post(winners))
        .route("/logs", post(logs))
}
