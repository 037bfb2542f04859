//! API response types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use prizebot_core::{Outcome, Rejection};
use serde::Serialize;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Payload of a successful call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Set instead of `data` when the call was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    #[serde(skip)]
    status: StatusCode,
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Stable machine-readable code, e.g. `cap_reached`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// Extra fields of a structured rejection, e.g. the eligibility reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a success response.
    pub const fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            status: StatusCode::OK,
        }
    }

    /// Create a response for an operation that did not apply.
    #[must_use]
    pub fn rejected(rejection: &Rejection) -> Self {
        let status = match rejection {
            Rejection::NotFound => StatusCode::NOT_FOUND,
            Rejection::NotEligible { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::CONFLICT,
        };
        Self {
            data: None,
            error: Some(ApiError {
                code: rejection.code().to_string(),
                message: rejection.to_string(),
                detail: serde_json::to_value(rejection).ok(),
            }),
            status,
        }
    }

    /// Map a service outcome, converting the successful value.
    pub fn from_outcome<U>(outcome: Outcome<U>) -> Self
    where
        T: From<U>,
    {
        match outcome {
            Outcome::Done(value) => Self::ok(value.into()),
            Outcome::Rejected(rejection) => Self::rejected(&rejection),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
