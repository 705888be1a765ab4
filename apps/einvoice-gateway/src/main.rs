//! E-invoice gateway
//!
//! Validates XML e-invoices against AUNZ PEPPOL / UBL rulesets through a
//! remote validation service and returns the report as JSON, HTML, PDF or
//! DOCX. Also provides:
//!
//! - Account registration and session tokens
//! - Invoice upload with presigned downloads
//! - Linking accounts with the rendering service

use std::sync::Arc;

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod auth;
mod config;
mod error;
mod handlers;
mod state;
mod storage;
mod upstream;
mod users;

use config::{Args, GatewayConfig};
use error::ERROR_MESSAGE_HEADER;
use handlers::{accounts, files, validate};
use state::AppState;

/// Build the router with all routes and middleware
pub fn app(state: Arc<AppState>) -> Router {
    // CORS configuration for browser clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(ERROR_MESSAGE_HEADER)]);

    Router::new()
        // Liveness
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Validation
        .route("/validate", post(validate::validate_raw))
        .route("/validate/specific", post(validate::validate_raw_specific))
        .route("/validate/v2", post(validate::validate_upload))
        .route(
            "/validate/specific/v1",
            post(validate::validate_upload_specific),
        )
        .route("/validate/v3", post(validate::validate_upload_authed))
        .route(
            "/validate/specific/v2",
            post(validate::validate_upload_specific_authed),
        )
        // Accounts
        .route("/auth/register/v1", post(accounts::register))
        .route("/auth/login/v1", post(accounts::login))
        .route("/auth/remove/v1", post(accounts::remove))
        .route("/auth/renderToken", get(accounts::render_token))
        // Stored invoices
        .route("/upload/v1", post(files::upload))
        .route("/download/v1", get(files::download))
        .route("/download/all", get(files::download_all))
        .route("/objects/:key", get(files::fetch_object))
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Periodically remove scratch reports orphaned by aborted requests
fn spawn_scratch_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.sweep_interval);
        loop {
            ticker.tick().await;
            match state.scratch.sweep(state.config.scratch_max_age).await {
                Ok(0) => {}
                Ok(removed) => info!("Swept {} stale scratch files", removed),
                Err(e) => tracing::warn!("Scratch sweep failed: {}", e),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::from_default_env()
                .add_directive(log_level.into())
                .add_directive(format!("einvoice_gateway={}", log_level).parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::try_from(args)?;
    let addr = config.addr;

    info!("Initializing e-invoice gateway...");
    let state = Arc::new(AppState::new(config).await?);
    spawn_scratch_sweeper(state.clone());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    info!("Default rulesets: {}", state.config.default_rules.to_query());

    axum::serve(listener, app(state)).await?;

    Ok(())
}
