//! Where cellblock keeps its config file and logs
//!
//! Resolution order: `--data-dir`, then `CELLBLOCK_DATA_DIR`, then
//! `~/.cellblock`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const DATA_DIR_ENV: &str = "CELLBLOCK_DATA_DIR";

const DATA_DIR_NAME: &str = ".cellblock";
const LOG_FILE_NAME: &str = "cellblock.log";
const CONFIG_FILE_NAME: &str = "config.toml";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Pin the data directory for the rest of the process and return it.
///
/// The first call wins; later calls keep the pinned directory.
pub fn init_data_dir(custom_path: Option<PathBuf>) -> &'static Path {
    let requested = custom_path.unwrap_or_else(unpinned_data_dir);
    let pinned = DATA_DIR.get_or_init(|| requested.clone());
    if *pinned != requested {
        tracing::debug!(
            requested = %requested.display(),
            pinned = %pinned.display(),
            "Data directory already pinned"
        );
    }
    pinned
}

fn env_data_dir() -> Option<PathBuf> {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn unpinned_data_dir() -> PathBuf {
    env_data_dir().unwrap_or_else(|| match dirs::home_dir() {
        Some(home) => home.join(DATA_DIR_NAME),
        None => PathBuf::from(DATA_DIR_NAME),
    })
}

pub fn data_dir() -> PathBuf {
    match DATA_DIR.get() {
        Some(pinned) => pinned.clone(),
        None => unpinned_data_dir(),
    }
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

pub fn log_file_path() -> PathBuf {
    logs_dir().join(LOG_FILE_NAME)
}

pub fn config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE_NAME)
}
