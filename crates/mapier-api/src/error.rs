//! Error-to-HTTP mapping.
//!
//! Every failure response has the same envelope:
//!
//! ```json
//! { "success": false, "error": { "code": "not_found", "message": "...", "details": ... } }
//! ```

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{error, warn};

use mapier_core::Error;

/// Machine-readable code for requests rejected by the rate limiter.
pub const RATE_LIMIT_CODE: &str = "rate_limit_exceeded";

/// Error body inside the failure envelope.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

/// Failure envelope.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorBody,
}

/// Errors returned by handlers.
#[derive(Debug)]
pub enum ApiError {
    /// A domain error from the core crates.
    Core(Error),
    /// The request could not be decoded.
    BadRequest(String),
    /// The rate limiter rejected the request.
    RateLimited,
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(err) => match err {
                Error::Validation(_) => StatusCode::BAD_REQUEST,
                Error::NotFound(_) => StatusCode::NOT_FOUND,
                Error::Conflict(_) => StatusCode::CONFLICT,
                Error::ProviderTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                Error::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::Core(err) => {
                let details = match err {
                    Error::Validation(fields) => serde_json::to_value(fields).ok(),
                    Error::AllProvidersFailed(failures) => serde_json::to_value(failures).ok(),
                    _ => None,
                };
                let message = match err {
                    // Driver messages can carry SQL; keep them in the logs.
                    Error::Database(_) => "Database error".to_string(),
                    other => other.to_string(),
                };
                ErrorBody {
                    code: err.code().to_string(),
                    message,
                    details,
                }
            }
            ApiError::BadRequest(msg) => ErrorBody {
                code: "validation_error".to_string(),
                message: msg.clone(),
                details: None,
            },
            ApiError::RateLimited => ErrorBody {
                code: RATE_LIMIT_CODE.to_string(),
                message: "Too many requests. Please wait before retrying.".to_string(),
                details: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();

        if status.is_server_error() {
            match &self {
                ApiError::Core(err) => error!(
                    subsystem = "api",
                    code = %body.code,
                    status = status.as_u16(),
                    error = %err,
                    "Request failed"
                ),
                _ => error!(subsystem = "api", status = status.as_u16(), "Request failed"),
            }
        } else {
            warn!(
                subsystem = "api",
                code = %body.code,
                status = status.as_u16(),
                message = %body.message,
                "Request rejected"
            );
        }

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: body,
            }),
        )
            .into_response()
    }
}
