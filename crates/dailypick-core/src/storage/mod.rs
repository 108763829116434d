mod config;
pub mod database;
pub mod kv;

pub use config::{
    Config, QuotaConfig, SelectionConfig, StorageConfig, StreakConfig, TimezoneConfig,
};
pub use database::SqliteBackend;
pub use kv::{Decoded, KvBackend, MemoryBackend, Store, UnavailableBackend};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/dailypick[-dev]/` based on DAILYPICK_ENV.
///
/// Set DAILYPICK_ENV=dev to use development data directory.
/// DAILYPICK_DATA_DIR overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the data directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("DAILYPICK_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("DAILYPICK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("dailypick-dev")
            } else {
                base_dir.join("dailypick")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
