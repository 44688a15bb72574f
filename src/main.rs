//! pingwatch - host reachability monitor.
//!
//! Pings one host on a fixed interval, keeps every result in SQLite and
//! serves the history over a small JSON API.

mod config;
mod db;
mod export;
mod probe;
mod scheduler;
mod web;

use config::AppConfig;
use db::Store;
use probe::ProbeExecutor;
use scheduler::SessionManager;
use web::Server;

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pingwatch=info".parse()?))
        .init();

    // Load configuration
    let cfg = AppConfig::load();
    tracing::info!("Starting pingwatch on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    if let Err(e) = cfg.ensure_db_dir() {
        tracing::error!("Could not create database directory for {}: {}", cfg.db_path, e);
    }

    let store = Store::new(&cfg.db_path);
    tracing::info!(
        "Database at {} holds {} results",
        store.path().display(),
        store.count()
    );
    let sessions = Arc::new(SessionManager::new(
        store,
        ProbeExecutor::new(cfg.probe_timeout),
    ));

    // Report every result as it is produced
    let mut events = sessions.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(record) => tracing::info!("{}: {}", record.target(), record),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("Result reporter skipped {} results", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    if let Some(target) = cfg.target.as_deref() {
        match sessions.start_session(target, cfg.interval_seconds).await {
            Ok(_) => tracing::info!("Polling {} every {}s", target, cfg.interval_seconds),
            Err(e) => tracing::error!("Not starting session for {:?}: {}", target, e),
        }
    }

    let server = Server::new(cfg, sessions.clone());
    server.start(shutdown_signal()).await?;

    sessions.stop_session().await;
    tracing::info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
