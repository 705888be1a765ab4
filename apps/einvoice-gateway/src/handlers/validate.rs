//! Invoice validation routes
//!
//! Every route runs the same pipeline: syntax gate, remote validation,
//! normalization, rendering and dispatch. Routes differ only in how the
//! invoice arrives (raw body or multipart), where the rulesets come from
//! (defaults or the `rule` header) and whether a session is required.

use std::sync::Arc;

use axum::{
    extract::{multipart::Multipart, State},
    http::{header, HeaderMap},
    response::Response,
};
use tracing::info;

use einvoice_report::{
    dispatch, normalize, render_as, wellformed, ReportError, ReportFormat, Rulesets,
};

use super::{mime_essence, read_file_part, respond, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;
use crate::upstream::Submission;

/// Context name for invoices posted as a raw body
const RAW_INVOICE_NAME: &str = "invoice.xml";

const RAW_CONTENT_TYPES: [&str; 2] = ["application/xml", "text/plain"];
const UPLOAD_CONTENT_TYPES: [&str; 2] = ["application/xml", "text/xml"];

struct Invoice {
    file_name: String,
    xml: String,
}

async fn run(
    state: &AppState,
    invoice: &Invoice,
    rules: &Rulesets,
    format: ReportFormat,
) -> Result<Response, ApiError> {
    wellformed::check(&invoice.xml)?;

    info!(
        file = %invoice.file_name,
        rules = %rules.to_query(),
        format = %format,
        "Validating invoice"
    );
    let raw = state
        .validator
        .validate(
            &Submission {
                filename: &invoice.file_name,
                xml: &invoice.xml,
            },
            rules,
        )
        .await?;

    let report = normalize(&raw, rules, &*state.clock)?;
    let artifact = render_as(&report, format, &invoice.file_name, &state.scratch).await?;
    respond(dispatch(artifact)).await
}

/// `format` header; absent means JSON
fn format_header(headers: &HeaderMap) -> Result<ReportFormat, ApiError> {
    match headers.get("format") {
        None => Ok(ReportFormat::default()),
        Some(value) => {
            let token = value
                .to_str()
                .map_err(|_| ReportError::UnsupportedFormat("<binary>".into()))?;
            Ok(token.parse()?)
        }
    }
}

/// Required `rule` header
fn rule_header(headers: &HeaderMap) -> Result<Rulesets, ApiError> {
    headers
        .get("rule")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .map(Rulesets::parse)
        .ok_or_else(|| ApiError::InvalidRequest("Missing 'rule' header".to_string()))
}

fn raw_invoice(headers: &HeaderMap, body: String) -> Result<Invoice, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(mime_essence)
        .unwrap_or_default();
    if !RAW_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ApiError::InvalidRequest(
            "Content-Type must be application/xml or text/plain".to_string(),
        ));
    }

    Ok(Invoice {
        file_name: RAW_INVOICE_NAME.to_string(),
        xml: body,
    })
}

async fn uploaded_invoice(multipart: &mut Multipart) -> Result<Invoice, ApiError> {
    let upload = read_file_part(multipart, "invoice").await?;

    let declared = upload.content_type.as_deref().unwrap_or_default();
    if !UPLOAD_CONTENT_TYPES.contains(&declared) {
        return Err(ApiError::InvalidRequest(
            "Invoice must be uploaded as application/xml or text/xml".to_string(),
        ));
    }
    let xml = String::from_utf8(upload.bytes)
        .map_err(|_| ApiError::InvalidRequest("Invoice must be UTF-8 encoded".to_string()))?;

    Ok(Invoice {
        file_name: upload.file_name,
        xml,
    })
}

/// POST /validate
pub async fn validate_raw(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let invoice = raw_invoice(&headers, body)?;
    run(&state, &invoice, &state.config.default_rules, ReportFormat::Json).await
}

/// POST /validate/specific
pub async fn validate_raw_specific(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Response, ApiError> {
    let rules = rule_header(&headers)?;
    let invoice = raw_invoice(&headers, body)?;
    run(&state, &invoice, &rules, ReportFormat::Json).await
}

/// POST /validate/v2
pub async fn validate_upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let format = format_header(&headers)?;
    let invoice = uploaded_invoice(&mut multipart).await?;
    run(&state, &invoice, &state.config.default_rules, format).await
}

/// POST /validate/specific/v1
pub async fn validate_upload_specific(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let format = format_header(&headers)?;
    let rules = rule_header(&headers)?;
    let invoice = uploaded_invoice(&mut multipart).await?;
    run(&state, &invoice, &rules, format).await
}

/// POST /validate/v3
pub async fn validate_upload_authed(
    state: State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    tracing::debug!(user = %user.username, "Authenticated validation");
    validate_upload(state, headers, multipart).await
}

/// POST /validate/specific/v2
pub async fn validate_upload_specific_authed(
    state: State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    tracing::debug!(user = %user.username, "Authenticated validation");
    validate_upload_specific(state, headers, multipart).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_format_header_defaults_to_json() {
        assert_eq!(format_header(&HeaderMap::new()).unwrap(), ReportFormat::Json);

        let mut headers = HeaderMap::new();
        headers.insert("format", HeaderValue::from_static("pdf"));
        assert_eq!(format_header(&headers).unwrap(), ReportFormat::Pdf);

        headers.insert("format", HeaderValue::from_static("xlsx"));
        assert!(format_header(&headers).is_err());
    }

    #[test]
    fn test_rule_header_required() {
        assert!(rule_header(&HeaderMap::new()).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("rule", HeaderValue::from_static("AUNZ_UBL_1_0_10"));
        assert_eq!(
            rule_header(&headers).unwrap().ids(),
            &["AUNZ_UBL_1_0_10".to_string()]
        );
    }

    #[test]
    fn test_raw_content_type_gate() {
        let mut headers = HeaderMap::new();
        assert!(raw_invoice(&headers, "<a/>".into()).is_err());

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        let invoice = raw_invoice(&headers, "<a/>".into()).unwrap();
        assert_eq!(invoice.file_name, RAW_INVOICE_NAME);
    }
}
