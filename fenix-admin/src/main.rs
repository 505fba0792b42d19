//! fenix-admin - catalog administration service
//!
//! Serves the admin API for the manga catalog: sign-in, accounts,
//! authors/artists/genres, mangas, chapters and pages.

use anyhow::{Context, Result};
use clap::Parser;
use fenix_common::config::{load_toml_config, AdminConfig};
use fenix_common::db::init_database;
use fenix_common::MediaStore;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use fenix_admin::cli::ConfigArgs;
use fenix_admin::db::sessions;
use fenix_admin::{build_router, AppState};

/// Command-line arguments for fenix-admin
#[derive(Parser, Debug)]
#[command(name = "fenix-admin")]
#[command(about = "Administration service for the Fênix manga catalog")]
#[command(version)]
struct Args {
    #[command(flatten)]
    config: ConfigArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins; otherwise start at info and switch to the configured
    // level once the config file has been read
    let env_filter = EnvFilter::try_from_default_env().ok();
    let from_env = env_filter.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting Fênix admin (fenix-admin) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let file_config = load_toml_config(args.config.config.as_deref());
    let config = AdminConfig::resolve(&args.config.to_overrides(), file_config.as_ref())
        .context("Invalid configuration")?;

    if !from_env {
        let level = &config.log_level;
        let directives = format!(
            "fenix_admin={level},fenix_common={level},tower_http={level}",
            level = level
        );
        match EnvFilter::try_new(&directives) {
            Ok(new_filter) => {
                if let Err(e) = filter_handle.reload(new_filter) {
                    warn!("Could not apply log level '{}': {}", level, e);
                }
            }
            Err(e) => warn!("Ignoring invalid log level '{}': {}", level, e),
        }
    }

    info!("Database path: {}", config.database_path.display());
    let pool = match init_database(&config.database_path).await {
        Ok(pool) => {
            info!("✓ Database ready");
            pool
        }
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e.into());
        }
    };

    let media = MediaStore::from_config(&config.storage).context("Failed to set up media storage")?;

    let now = chrono::Utc::now().timestamp();
    match sessions::purge_expired(&pool, now).await {
        Ok(0) => {}
        Ok(purged) => info!("Purged {} expired session(s)", purged),
        Err(e) => warn!("Could not purge expired sessions: {}", e),
    }

    let state = AppState::new(pool, media, config.session_ttl, config.secure_cookies);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("fenix-admin listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/health", config.bind_addr);

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
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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
