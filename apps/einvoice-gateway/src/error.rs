//! Error types for the e-invoice gateway

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use einvoice_report::ReportError;

use crate::storage::StorageError;
use crate::upstream::UpstreamError;

pub const ERROR_MESSAGE_HEADER: &str = "x-error-message";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Access token must be included in request!")]
    MissingToken,

    #[error("Access denied. Please sign in or register an account")]
    AccessDenied,

    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User not found")]
    UserNotFound,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("File not found")]
    FileNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Report(e) => {
                let status = match e {
                    ReportError::EmptyInput
                    | ReportError::MalformedMarkup(_)
                    | ReportError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
                    ReportError::UnknownRuleset(_) => StatusCode::BAD_GATEWAY,
                    ReportError::RenderIo(_) | ReportError::Serialization(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code())
            }
            ApiError::Upstream(UpstreamError::Status { status, .. }) => (
                StatusCode::from_u16(*status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::BAD_GATEWAY),
                "UPSTREAM_ERROR",
            ),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            ApiError::Storage(StorageError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "OBJECT_NOT_FOUND")
            }
            ApiError::Storage(StorageError::InvalidKey | StorageError::InvalidSignature) => {
                (StatusCode::FORBIDDEN, "INVALID_SIGNATURE")
            }
            ApiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            ApiError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            ApiError::MissingToken => (StatusCode::BAD_REQUEST, "MISSING_TOKEN"),
            ApiError::AccessDenied => (StatusCode::FORBIDDEN, "ACCESS_DENIED"),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            ApiError::UserNotFound => (StatusCode::UNAUTHORIZED, "USER_NOT_FOUND"),
            ApiError::UsernameTaken => (StatusCode::BAD_REQUEST, "USERNAME_TAKEN"),
            ApiError::FileNotFound => (StatusCode::BAD_REQUEST, "FILE_NOT_FOUND"),
            ApiError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    /// Message shown to clients; server-side details stay in the logs
    fn public_message(&self) -> String {
        match self {
            ApiError::Report(ReportError::RenderIo(_)) => "Failed to write report".to_string(),
            ApiError::Database(_) => "Database error".to_string(),
            ApiError::Internal(_) => "Internal error".to_string(),
            ApiError::Storage(StorageError::Io(_) | StorageError::Signing(_)) => {
                "Storage error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        } else {
            tracing::debug!(code, "{}", self);
        }

        let message = self.public_message();
        let header = HeaderValue::from_str(&message).ok();
        let body = ErrorResponse {
            success: false,
            error: message,
            code: code.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(value) = header {
            response.headers_mut().insert(ERROR_MESSAGE_HEADER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_error_statuses() {
        let cases = [
            (ApiError::from(ReportError::EmptyInput), StatusCode::BAD_REQUEST, "EMPTY_INPUT"),
            (
                ApiError::from(ReportError::MalformedMarkup("x".into())),
                StatusCode::BAD_REQUEST,
                "MALFORMED_MARKUP",
            ),
            (
                ApiError::from(ReportError::UnknownRuleset("X".into())),
                StatusCode::BAD_GATEWAY,
                "UNKNOWN_RULESET",
            ),
            (
                ApiError::from(ReportError::UnsupportedFormat("xls".into())),
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_FORMAT",
            ),
        ];
        for (error, status, code) in cases {
            assert_eq!(error.status_and_code(), (status, code));
        }
    }

    #[test]
    fn test_upstream_status_propagated() {
        let error = ApiError::from(UpstreamError::Status {
            status: 401,
            message: "bad token".into(),
        });
        assert_eq!(
            error.status_and_code(),
            (StatusCode::UNAUTHORIZED, "UPSTREAM_ERROR")
        );

        let odd = ApiError::from(UpstreamError::Status {
            status: 302,
            message: String::new(),
        });
        assert_eq!(odd.status_and_code().0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_header_and_body() {
        let response = ApiError::UsernameTaken.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(ERROR_MESSAGE_HEADER).unwrap(),
            "Username already exists"
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let response = ApiError::Internal("secret path /var/x".into()).into_response();
        assert_eq!(
            response.headers().get(ERROR_MESSAGE_HEADER).unwrap(),
            "Internal error"
        );
    }
}
