//! Error taxonomy for the HTTP boundary.
//!
//! Authentication failures are deliberately uninformative ("invalid
//! credentials") so responses never reveal whether a username exists.
//! Administrative and validation errors are specific and actionable.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("account locked. try again later")]
    AccountLocked,

    #[error("cannot lock your own account")]
    SelfLockDenied,

    #[error("too many attempts. try again later")]
    RateLimited { retry_after_seconds: u64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AccountLocked | Self::SelfLockDenied => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Internal details stay in the logs, not in the response body.
        let message = match &self {
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        match self {
            Self::RateLimited {
                retry_after_seconds,
            } => {
                let mut response = (
                    status,
                    Json(json!({
                        "error": message,
                        "retry_after_seconds": retry_after_seconds,
                    })),
                )
                    .into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                    response.headers_mut().insert(RETRY_AFTER, value);
                }
                response
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::InvalidCredentials.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::AccountLocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::SelfLockDenied.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::RateLimited {
                retry_after_seconds: 60
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::NotFound("user").status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn rate_limited_sets_retry_after_header() {
        let response = ApiError::RateLimited {
            retry_after_seconds: 60,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).map(|v| v.to_str().ok()),
            Some(Some("60"))
        );
    }

    #[test]
    fn credential_errors_share_no_detail() {
        // Same message whether the username or the password was wrong.
        assert_eq!(ApiError::InvalidCredentials.to_string(), "invalid credentials");
    }
}
