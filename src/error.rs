use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error surfaced to API callers.
///
/// Each rejected action carries a distinct machine-readable code so clients
/// can present actionable feedback instead of a generic failure.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Battle is not running")]
    NotRunning,
    #[error("You are not a participant in this battle")]
    Forbidden,
    #[error("Rate limit exceeded. Slow down.")]
    RateLimited,
    #[error("Duplicate action rejected")]
    DuplicateAction,
    #[error("Action cooldown active. Please wait.")]
    CooldownActive,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable wire code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotRunning => "battle_not_running",
            AppError::Forbidden => "not_participant",
            AppError::RateLimited => "rate_limited",
            AppError::DuplicateAction => "duplicate_action",
            AppError::CooldownActive => "cooldown_active",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotRunning | AppError::DuplicateAction => StatusCode::CONFLICT,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited | AppError::CooldownActive => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "code": self.code(),
        }));

        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_codes_are_distinct() {
        let errors = [
            AppError::NotRunning,
            AppError::Forbidden,
            AppError::RateLimited,
            AppError::DuplicateAction,
            AppError::CooldownActive,
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::NotFound("x".to_string()).status(),
            StatusCode::NOT_FOUND
        );
    }
}
