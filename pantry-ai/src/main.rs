//! pantry-ai - Pantry image ingest and inventory service
//!
//! Accepts captured food images, stores them, asks a vision model what the
//! image shows, and serves the pantry item CRUD API.
//!
//! Default port: 5731

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pantry_common::config::{default_config_path, load_toml_config, VisionProvider};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter};

use pantry_ai::config::{ConfigOverrides, ServiceConfig, VisionSettings};
use pantry_ai::db::{self, SqliteItemRepository};
use pantry_ai::pipeline::{ClassificationClient, IngestPipeline, LocalImageStore};
use pantry_ai::{build_router, AppState};

/// Command-line arguments for pantry-ai
#[derive(Parser, Debug)]
#[command(name = "pantry-ai")]
#[command(about = "Pantry image ingest and inventory service")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: <config dir>/pantry/pantry-ai.toml)
    #[arg(short, long, env = "PANTRY_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "PANTRY_PORT")]
    port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "PANTRY_BIND_ADDRESS")]
    bind: Option<String>,

    /// Folder holding pantry.db and pantry_images/
    #[arg(short, long, env = "PANTRY_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Base URL under which stored images are reachable
    #[arg(long, env = "PANTRY_PUBLIC_BASE_URL")]
    public_base_url: Option<String>,

    /// Vision backend: openai or gemini
    #[arg(long, env = "PANTRY_VISION_PROVIDER")]
    provider: Option<VisionProvider>,

    /// Log level when RUST_LOG is unset
    #[arg(long, env = "PANTRY_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Tracing comes up before the config file is read so its warnings are
    // visible; the filter is swapped once the TOML log level is known.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let rust_log_set = env_filter.is_some();
    let bootstrap_level = args.log_level.clone().unwrap_or_else(|| "info".to_string());
    let (filter, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| level_filter(&bootstrap_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting pantry-ai v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path("pantry-ai"));
    let toml_config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let config = ServiceConfig::resolve(
        toml_config,
        ConfigOverrides {
            port: args.port,
            bind_address: args.bind,
            data_folder: args.data_folder,
            public_base_url: args.public_base_url,
            provider: args.provider,
            log_level: args.log_level,
        },
    );

    if !rust_log_set && config.log_level != bootstrap_level {
        filter_handle
            .reload(level_filter(&config.log_level))
            .context("Failed to apply configured log level")?;
        info!("Log level: {}", config.log_level);
    }

    info!("Data folder: {}", config.data_folder.display());

    // Image store
    let store = LocalImageStore::new(
        &config.data_folder,
        &config.public_base_url,
        config.storage_retry(),
    );
    let images_dir = store.images_dir();
    tokio::fs::create_dir_all(&images_dir)
        .await
        .with_context(|| format!("Failed to create {}", images_dir.display()))?;
    info!("Images served from {}", images_dir.display());

    // Item repository
    let db_path = config.database_path();
    let pool = db::init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database: {}", db_path.display());
    let items = SqliteItemRepository::new(pool);

    // Vision backend
    let vision = VisionSettings::resolve(&config.vision)
        .context("Vision backend is not configured")?;
    let classifier =
        ClassificationClient::from_settings(&vision).context("Failed to build vision client")?;

    let pipeline = IngestPipeline::new(Arc::new(store), classifier);
    let state = AppState::new(pipeline, Arc::new(items), images_dir);
    let app = build_router(state);

    let listen_address = config.listen_address();
    let listener = tokio::net::TcpListener::bind(&listen_address)
        .await
        .with_context(|| format!("Failed to bind to {}", listen_address))?;
    info!("pantry-ai listening on http://{}", listen_address);
    info!("Health check: http://{}/health", listen_address);
    info!("Public image base: {}", config.public_base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Filter applying `level` to this service's crates
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::new(format!(
        "pantry_ai={level},pantry_common={level},tower_http={level}"
    ))
}

/// Graceful shutdown signal handler
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
