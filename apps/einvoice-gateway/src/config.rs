//! Command-line and environment configuration

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use einvoice_report::Rulesets;

/// Command-line arguments for the e-invoice gateway
///
/// Every flag can also be supplied through the environment (or a `.env`
/// file loaded at startup).
#[derive(Parser, Debug)]
#[command(name = "einvoice-gateway")]
#[command(about = "E-invoice validation and report rendering gateway")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite connection string for users and uploaded files
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:einvoice.db?mode=rwc")]
    pub database_url: String,

    /// Directory for transient PDF/DOCX reports
    #[arg(long, env = "SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Directory holding uploaded invoices
    #[arg(long, env = "OBJECT_DIR", default_value = "objects")]
    pub object_dir: PathBuf,

    /// Base URL used in presigned download links
    #[arg(long, env = "PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Secret for session tokens and download signatures
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// OAuth2 token endpoint of the validation service
    #[arg(long, env = "ESS_AUTH_URL")]
    pub ess_auth_url: Option<String>,

    /// Validation endpoint
    #[arg(
        long,
        env = "ESS_VALIDATE_URL",
        default_value = "https://services.ebusiness-cloud.com/ess-schematron/v1/api/validate"
    )]
    pub ess_validate_url: String,

    #[arg(long, env = "ESS_CLIENT_ID")]
    pub ess_client_id: Option<String>,

    #[arg(long, env = "ESS_CLIENT_SECRET", hide_env_values = true)]
    pub ess_client_secret: Option<String>,

    #[arg(long, env = "ESS_SCOPE", default_value = "eat/read")]
    pub ess_scope: String,

    /// Base URL of the rendering service; account linking is skipped when unset
    #[arg(long, env = "RENDER_API_URL")]
    pub render_api_url: Option<String>,

    /// Timeout for upstream calls in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "30")]
    pub upstream_timeout_secs: u64,

    /// How often stale scratch files are swept, in seconds
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "300")]
    pub sweep_interval_secs: u64,

    /// Age after which an orphaned scratch file is removed, in seconds
    #[arg(long, env = "SCRATCH_MAX_AGE_SECS", default_value = "600")]
    pub scratch_max_age_secs: u64,

    /// Lifetime of presigned download links, in seconds
    #[arg(long, env = "DOWNLOAD_TTL_SECS", default_value = "3600")]
    pub download_ttl_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Settings for the upstream validation service
#[derive(Debug, Clone)]
pub struct EssConfig {
    pub auth_url: Option<String>,
    pub validate_url: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: String,
}

/// Validated gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub scratch_dir: PathBuf,
    pub object_dir: PathBuf,
    pub public_url: String,
    pub jwt_secret: String,
    pub ess: EssConfig,
    pub render_api_url: Option<String>,
    pub upstream_timeout: Duration,
    pub sweep_interval: Duration,
    pub scratch_max_age: Duration,
    pub download_ttl: Duration,
    pub default_rules: Rulesets,
}

impl TryFrom<Args> for GatewayConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

        if args.jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let public_url = args
            .public_url
            .unwrap_or_else(|| format!("http://{}", addr))
            .trim_end_matches('/')
            .to_string();

        let scratch_dir = args
            .scratch_dir
            .unwrap_or_else(|| std::env::temp_dir().join("einvoice-gateway"));

        Ok(Self {
            addr,
            database_url: args.database_url,
            scratch_dir,
            object_dir: args.object_dir,
            public_url,
            jwt_secret: args.jwt_secret,
            ess: EssConfig {
                auth_url: args.ess_auth_url,
                validate_url: args.ess_validate_url,
                client_id: args.ess_client_id,
                client_secret: args.ess_client_secret,
                scope: args.ess_scope,
            },
            render_api_url: args
                .render_api_url
                .map(|url| url.trim_end_matches('/').to_string()),
            upstream_timeout: Duration::from_secs(args.upstream_timeout_secs),
            sweep_interval: Duration::from_secs(args.sweep_interval_secs.max(1)),
            scratch_max_age: Duration::from_secs(args.scratch_max_age_secs),
            download_ttl: Duration::from_secs(args.download_ttl_secs),
            default_rules: Rulesets::default(),
        })
    }
}
