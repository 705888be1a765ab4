//! Clients for the services the gateway depends on
//!
//! - [`ess`]: the remote e-invoice validator
//! - [`render_accounts`]: account linking with the rendering service
//!
//! Both sit behind traits so handlers can be exercised against stubs.

pub mod ess;
pub mod render_accounts;

use async_trait::async_trait;
use thiserror::Error;

use einvoice_report::{RawValidationResult, Rulesets};

pub use ess::EssClient;
pub use render_accounts::HttpRenderAccounts;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Validation service is not configured: {0}")]
    NotConfigured(&'static str),

    #[error("Validation service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Validation service answered {status}: {message}")]
    Status { status: u16, message: String },
}

/// An invoice as handed to the validator
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    pub filename: &'a str,
    pub xml: &'a str,
}

#[async_trait]
pub trait InvoiceValidator: Send + Sync {
    async fn validate(
        &self,
        submission: &Submission<'_>,
        rules: &Rulesets,
    ) -> Result<RawValidationResult, UpstreamError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Register,
    Login,
}

impl LinkKind {
    pub fn path(&self) -> &'static str {
        match self {
            LinkKind::Register => "/user/register",
            LinkKind::Login => "/user/login",
        }
    }
}

/// What the rendering service needs to know about a user
#[derive(Debug, Clone)]
pub struct AccountProfile<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Links gateway users to the rendering service
///
/// Linking never fails the caller: an empty token means the service was
/// unreachable, refused the user or is not configured.
#[async_trait]
pub trait RenderAccounts: Send + Sync {
    async fn link(&self, kind: LinkKind, profile: &AccountProfile<'_>) -> String;
}
