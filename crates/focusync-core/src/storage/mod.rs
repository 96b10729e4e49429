mod config;
pub mod list_store;

pub use config::{Config, RemoteConfig, SyncConfig};
pub use list_store::{
    JsonFileStore, ListStore, MemoryStore, FAILED_FILE, HISTORY_FILE, QUEUE_FILE,
};

use std::path::PathBuf;

/// File holding the local entity records used by the CLI.
pub const RECORDS_FILE: &str = "local_records.json";

/// Returns `~/.config/focusync[-dev]/` based on FOCUSYNC_ENV.
///
/// Set FOCUSYNC_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("FOCUSYNC_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("focusync-dev")
    } else {
        base_dir.join("focusync")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
