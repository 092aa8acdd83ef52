//! Standard locations for twindeck files

use std::path::PathBuf;

const APP_DIR: &str = "twindeck";
const CONFIG_FILE: &str = "config.yaml";

/// `~/.config/twindeck` (or the platform equivalent)
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// `~/.config/twindeck/config.yaml`
pub fn default_config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE)
}
