mod config;
pub mod database;

pub use config::{Config, FocusConfig, GameConfig, RewardKind, RewardsConfig, RunConfig};
pub use database::{Database, Stats};

use std::path::PathBuf;

use crate::error::Result;

/// Returns the directory holding config, database and snapshots.
///
/// `FOCUSFLOW_DATA_DIR` wins when set. Otherwise `~/.config/focusflow/`,
/// or `~/.config/focusflow-dev/` with `FOCUSFLOW_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("FOCUSFLOW_DATA_DIR") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("FOCUSFLOW_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("focusflow-dev")
            } else {
                base_dir.join("focusflow")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
