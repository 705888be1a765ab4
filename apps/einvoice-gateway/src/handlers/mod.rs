//! HTTP handlers and the pieces they share

pub mod accounts;
pub mod files;
pub mod validate;

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    async_trait,
    body::Body,
    extract::{multipart::Multipart, FromRequestParts},
    http::{header, request::Parts},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::ReaderStream;

use einvoice_report::{Dispatch, ReportError, ScratchFile, Transport};

use crate::auth::{strip_bearer, validate_session_token};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::User;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

pub async fn root() -> Json<&'static str> {
    Json("Service is online :)")
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "einvoice-gateway",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// The account behind the request's session token
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(strip_bearer)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingToken)?;

        let claims = validate_session_token(token, &state.config.jwt_secret).map_err(|e| {
            tracing::debug!("Rejected session token: {}", e);
            ApiError::AccessDenied
        })?;

        let user = state
            .users
            .find(&claims.sub)
            .await?
            .ok_or(ApiError::UserNotFound)?;
        Ok(AuthUser(user))
    }
}

/// A file part pulled out of a multipart body
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// First part named `name`; its content type is reduced to the bare mime type
pub async fn read_file_part(
    multipart: &mut Multipart,
    name: &str,
) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(e.body_text()))?
    {
        if field.name() != Some(name) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("invoice.xml")
            .to_string();
        let content_type = field.content_type().map(mime_essence);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(e.body_text()))?;

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(ApiError::InvalidRequest(format!("Missing '{}' file", name)))
}

/// `text/xml; charset=utf-8` -> `text/xml`
pub fn mime_essence(value: &str) -> String {
    value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Open scratch file that keeps its guard alive until the body is done
struct ScratchReader {
    file: tokio::fs::File,
    _scratch: ScratchFile,
}

impl AsyncRead for ScratchReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().file).poll_read(cx, buf)
    }
}

/// Turn a dispatched report into a response
///
/// File-backed reports are streamed from disk and the scratch file is
/// released when the body is dropped.
pub async fn respond(dispatch: Dispatch) -> Result<Response, ApiError> {
    let headers = dispatch.headers();

    let body = match dispatch.transport {
        Transport::Inline(body) => Body::from(body),
        Transport::File(scratch) => {
            let file = tokio::fs::File::open(scratch.path())
                .await
                .map_err(ReportError::from)?;
            Body::from_stream(ReaderStream::new(ScratchReader {
                file,
                _scratch: scratch,
            }))
        }
    };

    Ok((headers, body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    use einvoice_report::{dispatch, render, FixedClock, ScratchDir};

    #[tokio::test]
    async fn test_file_reports_stream_then_release_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(dir.path());
        let raw: einvoice_report::RawValidationResult = serde_json::from_value(serde_json::json!({
            "successful": true,
            "message": "ok",
            "report": { "firedAssertionErrorsCount": 0, "reports": {
                "AUNZ_UBL_1_0_10": { "successful": true, "summary": "ok",
                    "firedAssertionErrorCodes": [], "firedAssertionErrors": [] }
            }}
        }))
        .unwrap();
        let clock = FixedClock(chrono::NaiveDate::from_ymd_opt(2024, 3, 14).unwrap());
        let report = einvoice_report::normalize(
            &raw,
            &einvoice_report::Rulesets::parse("AUNZ_UBL_1_0_10"),
            &clock,
        )
        .unwrap();

        let artifact = render(&report, "pdf", "invoice.xml", &scratch).await.unwrap();
        let response = respond(dispatch(artifact)).await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.starts_with(b"%PDF-"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_mime_essence() {
        assert_eq!(mime_essence("text/xml; charset=utf-8"), "text/xml");
        assert_eq!(mime_essence("Application/XML"), "application/xml");
        assert_eq!(mime_essence(""), "");
    }
}
