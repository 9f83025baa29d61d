//! MellStar Backend - Main Entry Point
//!
//! Serves the Mini App HTTP API and runs the completion sweeper that
//! rotates subscribed slots once their grace period is over.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use mellstar_backend::api::{AppState, router};
use mellstar_backend::auth::SessionVerifier;
use mellstar_backend::config::{CatalogConfig, ServerSettings, TelegramConfig};
use mellstar_backend::engine::{EngineSettings, SlotEngine};
use mellstar_backend::scheduler::{CompletionSweeper, SweeperMessage};
use mellstar_backend::store::Store;

/// Backend for the MellStar Telegram Mini App.
#[derive(Parser, Debug)]
#[command(name = "mellstar_backend")]
#[command(about = "Serve the MellStar Mini App API and rotate advertising slots")]
#[command(version)]
struct Args {
    /// Path to the slot catalog seed file (JSON), used when the catalog is empty.
    #[arg(short, long, default_value = "catalog.json")]
    catalog: String,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Generate an example catalog file and exit.
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Handle example config generation
    if args.generate_config {
        return generate_example_config();
    }

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings = ServerSettings::from_env_with_defaults();

    let store = Store::load(&settings.state_path).with_context(|| {
        format!(
            "Failed to load state file {}",
            settings.state_path.display()
        )
    })?;
    let engine = Arc::new(SlotEngine::new(
        Arc::new(store),
        EngineSettings::from(&settings),
    ));

    seed_catalog(&engine, &args.catalog).await?;

    info!(
        "Engine ready (grace period: {}s, slots per user: {}, admins: {})",
        engine.settings().grace_period.num_seconds(),
        engine.settings().default_slot_count,
        settings.admin_ids.len()
    );

    // Create sweeper channel
    let (sweeper_tx, sweeper_rx) = mpsc::channel::<SweeperMessage>(32);

    let sweeper = CompletionSweeper::new(Arc::clone(&engine), Some(settings.state_path.clone()))
        .with_check_interval(Duration::from_secs(settings.sweep_interval_secs));

    // Catch up on subscriptions that fell due while the server was down
    let _ = sweeper_tx.send(SweeperMessage::TriggerSweep).await;

    // Spawn sweeper task
    let sweeper_handle = tokio::spawn(async move {
        sweeper.run(sweeper_rx).await;
    });

    let state = AppState::new(
        Arc::clone(&engine),
        SessionVerifier::new(tg_config.bot_token.clone(), settings.auth_max_age_secs),
        settings.admin_ids.clone(),
    );

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind_addr))?;
    info!("Listening on http://{}", settings.bind_addr);
    info!("Backend is running. Use Ctrl+C to stop.");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // Cleanup
    info!("Shutting down...");
    let _ = sweeper_tx.send(SweeperMessage::Shutdown).await;
    let _ = sweeper_handle.await;

    engine
        .store()
        .save(&settings.state_path)
        .await
        .context("Failed to save state on shutdown")?;
    info!("State saved to {}", settings.state_path.display());

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves when Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down...");
}

/// Loads the seed file into an empty catalog.
async fn seed_catalog(engine: &SlotEngine, path: &str) -> Result<()> {
    let existing = engine.store().catalog().await.len();
    if existing > 0 {
        info!("Catalog already holds {} slot(s), seed file not used", existing);
        return Ok(());
    }

    if !Path::new(path).exists() {
        warn!(
            "Catalog is empty and seed file {} does not exist; users will see placeholders",
            path
        );
        return Ok(());
    }

    let config = CatalogConfig::load_from_file(path)
        .with_context(|| format!("Failed to load catalog seed file {path}"))?;
    config
        .validate()
        .context("Catalog seed file validation failed")?;

    let count = config.len();
    let priority = config.priority_count();
    let now = Utc::now();
    for slot in config.slots {
        engine
            .create_slot(slot, now)
            .await
            .context("Failed to insert seed slot")?;
    }
    info!(
        "Seeded catalog from {} ({} slot(s), {} priority)",
        path, count, priority
    );
    Ok(())
}

/// Generates an example catalog file.
fn generate_example_config() -> Result<()> {
    let example = CatalogConfig::example();
    example.save_to_file("catalog.example.json")?;

    println!("✓ Example catalog written to: catalog.example.json");
    println!("\nTo run the backend:");
    println!("1. Copy catalog.example.json to catalog.json");
    println!("2. Edit the slots to point at your channels");
    println!("3. Create a .env file with BOT_TOKEN (and optionally ADMIN_IDS, PORT)");
    println!("4. Run: mellstar_backend");

    Ok(())
}
