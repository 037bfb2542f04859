//! API endpoints.

mod claims;
mod giveaways;

use axum::{Router, middleware::from_fn_with_state};

use crate::middleware::{AppState, auth_middleware};

/// Create the API router. Every route requires the admin bearer token.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/giveaways", giveaways::router())
        .nest("/claims", claims::router())
        .layer(from_fn_with_state(state, auth_middleware))
}
