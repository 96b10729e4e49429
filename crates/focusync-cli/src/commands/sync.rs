//! Sync subcommand for pushing the queue and pulling remote state.
//!
//! The CLI is one-shot: it drains once and exits, so automatic retry timers
//! are disabled. Failed operations stay queued for the next run.

use clap::Subcommand;
use focusync_core::storage::{data_dir, RECORDS_FILE};
use focusync_core::sync::{
    ConnectivityMonitor, DeadLetterLog, HttpGateway, JsonFileLocalStore, OperationQueue,
    SyncCoordinator, SyncHistory, SyncOutcome, SyncSettings,
};
use focusync_core::{Config, GatewayError};
use std::sync::Arc;
use tracing::debug;

/// Sync actions against the configured remote store.
#[derive(Subcommand)]
pub enum SyncAction {
    /// Push pending operations
    Run,
    /// Push pending operations, then pull and merge every entity type
    Full,
    /// Show queue and remote status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Run the sync command.
pub fn run(action: SyncAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SyncAction::Run => run_sync(false),
        SyncAction::Full => run_sync(true),
        SyncAction::Status { json } => show_status(json),
    }
}

fn build_coordinator(config: &Config) -> Result<Arc<SyncCoordinator>, Box<dyn std::error::Error>> {
    if !config.remote.is_configured() {
        return Err(GatewayError::NotConfigured(
            "set remote.base_url with `focusync-cli config set remote.base_url <url>`".into(),
        )
        .into());
    }
    let gateway = HttpGateway::new(
        &config.remote.base_url,
        config.remote.api_key(),
        config.remote.timeout(),
    )?;
    let local = JsonFileLocalStore::open(data_dir()?.join(RECORDS_FILE))?;
    let settings = SyncSettings {
        auto_retry: false,
        ..SyncSettings::from(&config.sync)
    };
    Ok(SyncCoordinator::new(
        Arc::new(gateway),
        Arc::new(local),
        OperationQueue::open_default()?,
        DeadLetterLog::open_default()?,
        SyncHistory::open_default()?,
        Arc::new(ConnectivityMonitor::assume_online()),
        settings,
    ))
}

fn run_sync(full: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    debug!(full, base_url = %config.remote.base_url, "starting sync");
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let coordinator = build_coordinator(&config)?;
        let outcome = if full {
            coordinator.perform_full_sync().await?
        } else {
            coordinator.process_pending_queue().await?
        };
        match outcome {
            SyncOutcome::Completed { synced, failed } => {
                println!("synced: {synced}");
                if failed > 0 {
                    println!("failed: {failed}");
                }
            }
            SyncOutcome::Offline => println!("offline, nothing synced"),
            SyncOutcome::AlreadyRunning => println!("sync already running"),
        }
        println!("state: {}", coordinator.state());
        println!("pending: {}", coordinator.pending_count().await);
        let dropped = coordinator.failed_operations_count().await;
        if dropped > 0 {
            println!("dropped operations: {dropped} (see `focusync-cli failed list`)");
        }
        Ok(())
    })
}

fn show_status(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let queue = OperationQueue::open_default()?;
    let failed = DeadLetterLog::open_default()?;
    let last_successful_sync = SyncHistory::open_default()?.last();
    let needs_sync = !queue.is_empty() || last_successful_sync.is_none();

    if json {
        let status = serde_json::json!({
            "remote_configured": config.remote.is_configured(),
            "base_url": config.remote.base_url,
            "pending_count": queue.len(),
            "failed_operations_count": failed.len(),
            "last_successful_sync": last_successful_sync,
            "needs_sync": needs_sync,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if config.remote.is_configured() {
        println!("remote: {}", config.remote.base_url);
    } else {
        println!("remote: not configured");
    }
    println!("pending: {}", queue.len());
    println!("failed: {}", failed.len());
    match last_successful_sync {
        Some(at) => println!("last sync: {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last sync: never"),
    }
    println!("needs sync: {}", if needs_sync { "yes" } else { "no" });
    Ok(())
}
