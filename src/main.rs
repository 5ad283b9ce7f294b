//! Sehhat Registry Daemon
//!
//! Serves the community records API over HTTP.
//!
//! ## Usage
//!
//! ```bash
//! # Start with defaults
//! sehhat-registry
//!
//! # Start with custom config
//! sehhat-registry --config /path/to/config.toml
//!
//! # Start with custom HTTP port
//! sehhat-registry --http-port 8095
//!
//! # Start with custom data directory
//! sehhat-registry --data-dir /data/registry
//!
//! # Seed an admin principal on first start
//! sehhat-registry --bootstrap-admin root
//! ```

use clap::Parser;
use sehhat_registry::services::events::spawn_logging_listener;
use sehhat_registry::{Config, HttpServer, RegistryDb, Services};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sehhat-registry")]
#[command(about = "Community records service for Umoor Sehhat")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(long, env = "SEHHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// HTTP API port
    #[arg(long, env = "SEHHAT_HTTP_PORT")]
    http_port: Option<u16>,

    /// Seed an admin principal with this id on first start
    #[arg(long, env = "SEHHAT_BOOTSTRAP_ADMIN")]
    bootstrap_admin: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("sehhat_registry=info".parse()?),
        )
        .init();

    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(admin) = args.bootstrap_admin {
        config.bootstrap_admin_id = admin;
    }

    info!(
        data_dir = %config.data_dir.display(),
        http_port = config.http_port,
        "Starting sehhat-registry"
    );

    // Ensure data directory exists
    tokio::fs::create_dir_all(&config.data_dir).await?;

    // Save default config if it doesn't exist
    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    // Open the registry database
    let db = Arc::new(RegistryDb::open(&config.db_path())?);

    // Build services over the shared database
    let services = Arc::new(Services::with_analytics_ttl(
        db.clone(),
        config.analytics_ttl_secs,
    ));

    // Audit log listener
    let _listener = spawn_logging_listener(services.events.clone());

    // Seed the bootstrap admin if configured
    if !config.bootstrap_admin_id.is_empty() {
        services.directory.bootstrap_admin(&config.bootstrap_admin_id)?;
    }

    // Start HTTP server
    let http_addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    let http_server = Arc::new(
        HttpServer::new(services.clone(), db.clone(), http_addr)
            .with_max_page_size(config.max_page_size),
    );

    info!("HTTP API available at http://{}", http_addr);
    info!("Endpoints:");
    info!("  GET  /health                        - Health check");
    info!("  POST /principals                    - Register a principal (admin)");
    info!("  POST /units                         - Create a unit (admin)");
    info!("  POST /content                       - Create content");
    info!("  GET  /content                       - List visible content");
    info!("  POST /surveys                       - Create a survey");
    info!("  POST /surveys/{{id}}/responses        - Submit a response");
    info!("  GET  /surveys/{{id}}/analytics        - Analytics snapshot");
    info!("  GET  /surveys/{{id}}/analytics.csv    - CSV export");
    info!("  POST /petitions                     - File a petition");

    info!("Press Ctrl+C to stop.");

    // Handle shutdown signal
    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutting down...");
    };

    // Run HTTP server with graceful shutdown
    tokio::select! {
        result = http_server.run() => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = shutdown => {}
    }

    // Print stats before exit
    if let Ok(stats) = db.stats() {
        info!(
            principals = stats.principal_count,
            content = stats.content_count,
            surveys = stats.survey_count,
            responses = stats.response_count,
            "Final registry stats"
        );
    }

    Ok(())
}
