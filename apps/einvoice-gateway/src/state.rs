//! Application state for the e-invoice gateway

use std::sync::Arc;

use anyhow::Result;

use einvoice_report::{Clock, ScratchDir, SystemClock};

use crate::config::GatewayConfig;
use crate::storage::{LocalObjectStore, ObjectStore, UrlSigner};
use crate::upstream::{EssClient, HttpRenderAccounts, InvoiceValidator, RenderAccounts};
use crate::users::UserStore;

pub struct AppState {
    pub config: GatewayConfig,
    pub users: UserStore,
    pub objects: Arc<dyn ObjectStore>,
    pub validator: Arc<dyn InvoiceValidator>,
    pub accounts: Arc<dyn RenderAccounts>,
    pub scratch: ScratchDir,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn new(config: GatewayConfig) -> Result<Self> {
        let users = UserStore::connect(&config.database_url).await?;

        tokio::fs::create_dir_all(&config.scratch_dir).await?;
        tokio::fs::create_dir_all(&config.object_dir).await?;
        tracing::info!("Scratch directory: {}", config.scratch_dir.display());
        tracing::info!("Object directory: {}", config.object_dir.display());

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout)
            .build()?;

        let objects = LocalObjectStore::new(
            &config.object_dir,
            config.public_url.clone(),
            UrlSigner::new(config.jwt_secret.clone()),
        );
        if config.render_api_url.is_none() {
            tracing::warn!("RENDER_API_URL not set, rendering accounts will not be linked");
        }

        Ok(Self {
            users,
            objects: Arc::new(objects),
            validator: Arc::new(EssClient::new(http.clone(), config.ess.clone())),
            accounts: Arc::new(HttpRenderAccounts::new(
                http,
                config.render_api_url.clone(),
            )),
            scratch: ScratchDir::new(&config.scratch_dir),
            clock: Arc::new(SystemClock),
            config,
        })
    }
}
