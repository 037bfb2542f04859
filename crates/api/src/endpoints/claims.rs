//! Prize claim endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::{DateTime, Utc};
use prizebot_common::{AppError, AppResult};
use prizebot_db::entities::giveaway_claim::{self, ClaimStatus};
use serde::{Deserialize, Serialize};

use crate::{extractors::Staff, middleware::AppState, response::ApiResponse};

// ==================== Request/Response Types ====================

/// Claim response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub id: String,
    pub giveaway_id: String,
    pub winner_id: String,
    pub user_id: String,
    pub status: ClaimStatus,
    pub claim_deadline_at: DateTime<Utc>,
    pub reroll_count: i32,
    pub previous_claim_id: Option<String>,
    pub first_reminder_sent: bool,
    pub final_reminder_sent: bool,
    pub conversation_ref: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub response_excerpt: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<giveaway_claim::Model> for ClaimResponse {
    fn from(c: giveaway_claim::Model) -> Self {
        Self {
            id: c.id,
            giveaway_id: c.giveaway_id,
            winner_id: c.winner_id,
            user_id: c.user_id,
            status: c.status,
            claim_deadline_at: c.claim_deadline_at,
            reroll_count: c.reroll_count,
            previous_claim_id: c.previous_claim_id,
            first_reminder_sent: c.first_reminder_sent,
            final_reminder_sent: c.final_reminder_sent,
            conversation_ref: c.conversation_ref,
            claimed_at: c.claimed_at,
            response_excerpt: c.response_excerpt,
            resolved_at: c.resolved_at,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimIdRequest {
    pub claim_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListClaimsRequest {
    pub giveaway_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachConversationRequest {
    pub claim_id: String,
    /// Channel or thread id of the private conversation with the winner.
    pub conversation_ref: String,
    /// Defaults to now. Only replies after this instant count as a response.
    pub opened_at: Option<DateTime<Utc>>,
}

// ==================== Handlers ====================

async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListClaimsRequest>,
) -> AppResult<ApiResponse<Vec<ClaimResponse>>> {
    let claims = state.claim_service.list_for_giveaway(&req.giveaway_id).await?;
    Ok(ApiResponse::ok(claims.into_iter().map(Into::into).collect()))
}

async fn show(
    State(state): State<AppState>,
    Json(req): Json<ClaimIdRequest>,
) -> AppResult<ApiResponse<ClaimResponse>> {
    let claim = state
        .claim_service
        .get(&req.claim_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Claim {}", req.claim_id)))?;
    Ok(ApiResponse::ok(claim.into()))
}

/// Confirm a claim by hand.
async fn confirm(
    Staff(actor): Staff,
    State(state): State<AppState>,
    Json(req): Json<ClaimIdRequest>,
) -> AppResult<ApiResponse<ClaimResponse>> {
    let outcome = state.claim_service.confirm(&req.claim_id, &actor).await?;
    Ok(ApiResponse::from_outcome(outcome))
}

/// Attach the conversation the response detector should watch.
async fn attach_conversation(
    State(state): State<AppState>,
    Json(req): Json<AttachConversationRequest>,
) -> AppResult<ApiResponse<ClaimResponse>> {
    let opened_at = req.opened_at.unwrap_or_else(Utc::now);
    let outcome = state
        .claim_service
        .attach_conversation(&req.claim_id, &req.conversation_ref, opened_at)
        .await?;
    Ok(ApiResponse::from_outcome(outcome))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", post(list))
        .route("/show", post(show))
        .route("/confirm", post(confirm))
        .route("/attach-conversation", post(attach_conversation))
}
