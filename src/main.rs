use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

use podsync::config::Config;
use podsync::server::{router, AppState};
use podsync::storage::Database;
use podsync::sync::run_sync;

#[derive(Parser, Debug)]
#[command(name = "podsync", about = "Keeps a podcast site's episode table in sync with its RSS feed")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, value_name = "FILE", default_value = "podsync.toml")]
    config: PathBuf,

    /// Run a single sync and exit instead of serving HTTP
    #[arg(long)]
    sync_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    config.validate()?;
    info!(feed = %config.feed_url, db = %config.database_path, "Starting podsync");

    let db = Database::open(&config.database_path).await?;
    let client = reqwest::Client::new();

    if args.sync_once {
        let summary = run_sync(&db, &client, &config).await?;
        for error in &summary.errors {
            tracing::warn!("{}", error);
        }
        info!(
            added = summary.added,
            updated = summary.updated,
            total = summary.total,
            errors = summary.errors.len(),
            "Sync finished"
        );
        return Ok(());
    }

    let config = Arc::new(config);

    if config.sync_interval_minutes > 0 {
        spawn_scheduler(db.clone(), client.clone(), Arc::clone(&config));
        info!(minutes = config.sync_interval_minutes, "Scheduled sync enabled");
    }

    let state = AppState {
        db,
        client,
        config: Arc::clone(&config),
    };
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Run the sync on a fixed interval in the background.
///
/// Overlap with a manual trigger is not coordinated; both runs upsert by
/// guid and the sync log keeps one row per run either way.
fn spawn_scheduler(db: Database, client: reqwest::Client, config: Arc<Config>) {
    tokio::spawn(async move {
        let period = Duration::from_secs(config.sync_interval_minutes * 60);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; consume it so the initial
        // sync happens one full period after startup.
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = run_sync(&db, &client, &config).await {
                tracing::error!(error = %e, "Scheduled sync failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
