//! Telescope Scheduler - reservation service for shared observation time

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use telescope_scheduler::{
    audit::AuditRecorder, config::Args, db::Store, lock::LockClient, server,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("telescope_scheduler={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Telescope Scheduler");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Database: {}", args.database_path.display());
    info!("Coordinator: {}", args.coordinator_url);
    info!(
        "Lock timeouts: acquire {}ms, release {}ms",
        args.lock_timeout_ms, args.unlock_timeout_ms
    );
    info!("Resource class: {}", args.resource_class);
    info!("Audit trail: {}", args.audit_log_path.display());
    info!("======================================");

    // Open the store
    let store = match Store::open(&args.database_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    // Open the audit trail. The trail is required for a running instance;
    // individual record failures later are logged and swallowed.
    let audit = match AuditRecorder::open(args.audit_log_path.clone()) {
        Ok(recorder) => recorder,
        Err(e) => {
            error!(
                "Failed to open audit trail at {}: {}",
                args.audit_log_path.display(),
                e
            );
            std::process::exit(1);
        }
    };

    // Lock client for the coordinator
    let lock = Arc::new(LockClient::new(
        args.coordinator_url.clone(),
        args.lock_timeout(),
        args.unlock_timeout(),
    ));

    let state = Arc::new(server::AppState::new(args, store, lock, audit));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
