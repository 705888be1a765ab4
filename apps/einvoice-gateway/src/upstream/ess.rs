//! HTTP client for the e-invoice validation service

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use einvoice_report::{RawValidationResult, Rulesets};

use super::{InvoiceValidator, Submission, UpstreamError};
use crate::config::EssConfig;

#[derive(Debug, Serialize)]
struct ValidatePayload<'a> {
    filename: &'a str,
    content: String,
    checksum: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Validator backed by the remote service, authenticating with OAuth2
/// client credentials on every call
pub struct EssClient {
    http: reqwest::Client,
    config: EssConfig,
}

impl EssClient {
    pub fn new(http: reqwest::Client, config: EssConfig) -> Self {
        Self { http, config }
    }

    async fn access_token(&self) -> Result<String, UpstreamError> {
        let auth_url = self
            .config
            .auth_url
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("auth URL"))?;
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("client id"))?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or(UpstreamError::NotConfigured("client secret"))?;

        let response = self
            .http
            .post(auth_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("scope", self.config.scope.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check_status(response).await?.json().await?;

        debug!("Obtained validation service token");
        Ok(token.access_token)
    }
}

/// Payload fields: base64 of the XML and the MD5 hex digest of that base64 text
fn encode_payload<'a>(submission: &Submission<'a>) -> ValidatePayload<'a> {
    let content = BASE64.encode(submission.xml.as_bytes());
    let checksum = hex::encode(Md5::digest(content.as_bytes()));
    ValidatePayload {
        filename: submission.filename,
        content,
        checksum,
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Validation service returned an error");
    Err(UpstreamError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl InvoiceValidator for EssClient {
    #[instrument(skip(self, submission, rules), fields(file = %submission.filename, rules = %rules.to_query()))]
    async fn validate(
        &self,
        submission: &Submission<'_>,
        rules: &Rulesets,
    ) -> Result<RawValidationResult, UpstreamError> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(&self.config.validate_url)
            .query(&[("rules", rules.to_query())])
            .bearer_auth(token)
            .header("Accept-Language", "en")
            .json(&encode_payload(submission))
            .send()
            .await?;

        let raw: RawValidationResult = check_status(response).await?.json().await?;
        debug!(
            successful = raw.successful,
            errors = raw.report.fired_assertion_errors_count,
            "Validation finished"
        );
        Ok(raw)
    }
}
