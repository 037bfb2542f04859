//! HTTP API layer for prizebot.
//!
//! Thin staff-facing adapters over the giveaway and claim services:
//!
//! - **Endpoints**: `/giveaways/*` and `/claims/*`, JSON bodies over POST
//! - **Extractors**: the acting staff member
//! - **Middleware**: admin bearer-token authentication
//!
//! Expected alternate paths come back as structured rejections with a stable
//! `code`, never as server errors.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
