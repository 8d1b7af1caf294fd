//! Shared API types
//!
//! Error responses and query-parameter validators shared by the dashboard
//! routes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use validator::ValidationError;

use crate::core::constants::{MAX_HISTORY_DAYS, MAX_TOP_RANK};
use crate::utils::time::parse_date;

/// Validator function for `days` window parameters
pub fn validate_days(days: u32) -> Result<(), ValidationError> {
    if days == 0 || days > MAX_HISTORY_DAYS {
        return Err(ValidationError::new("days_range")
            .with_message(format!("days must be between 1 and {}", MAX_HISTORY_DAYS).into()));
    }
    Ok(())
}

/// Validator function for top-N `rank` parameters
pub fn validate_rank(rank: u32) -> Result<(), ValidationError> {
    if rank == 0 || rank > MAX_TOP_RANK {
        return Err(ValidationError::new("rank_range")
            .with_message(format!("rank must be between 1 and {}", MAX_TOP_RANK).into()));
    }
    Ok(())
}

/// Validator function for `YYYY-MM-DD` date parameters
pub fn validate_date(date: &str) -> Result<(), ValidationError> {
    if parse_date(date).is_none() {
        return Err(ValidationError::new("date_format")
            .with_message(format!("Invalid date: {}. Use YYYY-MM-DD.", date).into()));
    }
    Ok(())
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn from_sqlite(e: crate::data::sqlite::SqliteError) -> Self {
        tracing::error!(error = %e, "SQLite error");
        Self::Internal {
            message: "Database operation failed".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

pub fn default_days() -> u32 {
    crate::core::constants::DEFAULT_HISTORY_DAYS
}

pub fn default_rank() -> u32 {
    crate::core::constants::DEFAULT_TOP_RANK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_bounds() {
        assert!(validate_days(1).is_ok());
        assert!(validate_days(MAX_HISTORY_DAYS).is_ok());
        assert!(validate_days(0).is_err());
        assert!(validate_days(MAX_HISTORY_DAYS + 1).is_err());
    }

    #[test]
    fn test_rank_bounds() {
        assert!(validate_rank(1).is_ok());
        assert!(validate_rank(MAX_TOP_RANK).is_ok());
        assert!(validate_rank(0).is_err());
        assert!(validate_rank(MAX_TOP_RANK + 1).is_err());
    }

    #[test]
    fn test_date_format() {
        assert!(validate_date("2024-01-10").is_ok());
        assert!(validate_date("2024-13-01").is_err());
        assert!(validate_date("yesterday").is_err());
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::not_found("BOT_NOT_FOUND", "No such bot").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["code"], "BOT_NOT_FOUND");
        assert_eq!(json["message"], "No such bot");
    }
}
