//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use prizebot_common::AppError;
use prizebot_core::{ClaimService, GiveawayService};

use crate::extractors::Staff;

/// Header naming the staff member behind a request.
pub const ACTOR_HEADER: &str = "X-Actor-Id";

const DEFAULT_ACTOR: &str = "staff";

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub giveaway_service: GiveawayService,
    pub claim_service: ClaimService,
    pub admin_token: Arc<str>,
}

/// Authentication middleware.
///
/// Every request must carry `Authorization: Bearer <admin token>`.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| !state.admin_token.is_empty() && token == &*state.admin_token);

    if !authorized {
        return AppError::Unauthorized.into_response();
    }

    let actor = req
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_ACTOR)
        .to_string();
    req.extensions_mut().insert(Staff(actor));

    next.run(req).await
}
