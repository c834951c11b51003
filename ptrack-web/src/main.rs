//! ptrack-web - Preterm study tracker HTTP service
//!
//! Loads configuration, opens (and migrates) the SQLite database, then
//! serves the JSON API until Ctrl+C or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ptrack_common::config::{CliOverrides, TrackerConfig};
use ptrack_common::db::init_database;
use ptrack_web::mail::mailer_from_config;
use ptrack_web::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for ptrack-web
#[derive(Parser, Debug)]
#[command(name = "ptrack-web")]
#[command(about = "Preterm study data tracker")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "PTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// SQLite database file
    #[arg(long)]
    database: Option<PathBuf>,

    /// Absolute URL used for links in emails
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = TrackerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    config.apply_overrides(&CliOverrides {
        host: args.host,
        port: args.port,
        database: args.database,
        base_url: args.base_url,
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "ptrack_web={level},ptrack_common={level},tower_http={level}",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ptrack-web v{}", env!("CARGO_PKG_VERSION"));
    config.validate().context("Invalid configuration")?;

    let db_path = config.database.resolved_path();
    info!("Database path: {}", db_path.display());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let mailer = mailer_from_config(&config.mail).context("Failed to configure mail")?;
    info!("Mail transport: {:?}", config.mail.transport);

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(pool, config, Arc::from(mailer));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("ptrack-web listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
