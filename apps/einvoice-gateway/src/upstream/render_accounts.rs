//! Account linking with the rendering service

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use super::{AccountProfile, LinkKind, RenderAccounts};

#[derive(Debug, Deserialize)]
struct LinkResponse {
    token: String,
}

pub struct HttpRenderAccounts {
    http: reqwest::Client,
    base_url: Option<String>,
}

impl HttpRenderAccounts {
    pub fn new(http: reqwest::Client, base_url: Option<String>) -> Self {
        Self { http, base_url }
    }

    async fn post(
        &self,
        base_url: &str,
        kind: LinkKind,
        profile: &AccountProfile<'_>,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let email = format!("{}@example.com", profile.username);
        self.http
            .post(format!("{}{}", base_url, kind.path()))
            .form(&[
                ("email", email.as_str()),
                ("password", profile.password_hash),
                ("nameFirst", profile.first_name),
                ("nameLast", profile.last_name),
            ])
            .send()
            .await
    }

    async fn try_link(
        &self,
        base_url: &str,
        kind: LinkKind,
        profile: &AccountProfile<'_>,
    ) -> Result<String, String> {
        let mut response = self
            .post(base_url, kind, profile)
            .await
            .map_err(|e| e.to_string())?;

        // Already registered there: fall back to logging in
        if kind == LinkKind::Register && response.status() == reqwest::StatusCode::BAD_REQUEST {
            info!(user = %profile.username, "Rendering account exists, logging in instead");
            response = self
                .post(base_url, LinkKind::Login, profile)
                .await
                .map_err(|e| e.to_string())?;
        }

        if !response.status().is_success() {
            return Err(format!("status {}", response.status()));
        }
        let body: LinkResponse = response.json().await.map_err(|e| e.to_string())?;
        Ok(body.token)
    }
}

#[async_trait]
impl RenderAccounts for HttpRenderAccounts {
    #[instrument(skip(self, profile), fields(user = %profile.username))]
    async fn link(&self, kind: LinkKind, profile: &AccountProfile<'_>) -> String {
        let Some(base_url) = self.base_url.as_deref() else {
            return String::new();
        };

        match self.try_link(base_url, kind, profile).await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Rendering account link failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_service_yields_empty_token() {
        let accounts = HttpRenderAccounts::new(reqwest::Client::new(), None);
        let token = accounts
            .link(
                LinkKind::Register,
                &AccountProfile {
                    username: "alice",
                    password_hash: "hash",
                    first_name: "Alice",
                    last_name: "Liddell",
                },
            )
            .await;
        assert!(token.is_empty());
    }

    #[test]
    fn test_link_paths() {
        assert_eq!(LinkKind::Register.path(), "/user/register");
        assert_eq!(LinkKind::Login.path(), "/user/login");
    }
}
