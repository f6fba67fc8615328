/// Configuration utilities - loading and access helpers
///
/// - Loading configuration from disk (TOML), falling back to defaults
/// - Environment overrides for secrets and endpoints
/// - Thread-safe global access for the binary
use super::schemas::Config;
use crate::logger::{self, LogTag};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use std::path::Path;

/// Global configuration instance, set once at startup by the binary.
/// Core components take their config sections explicitly and never read this.
pub static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "data/config.toml";

/// Environment variables that override file values
pub const ENV_BIRDEYE_API_KEY: &str = "BIRDEYE_API_KEY";
pub const ENV_SOLANA_RPC_URL: &str = "SOLANA_RPC_URL";

/// Read a configuration file without touching the global instance
///
/// A missing file yields defaults; an unreadable or invalid file is an error.
pub fn read_config_file<P: AsRef<Path>>(path: P) -> Result<Config, String> {
    let path = path.as_ref();
    let mut config = if path.exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        toml::from_str::<Config>(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?
    } else {
        logger::warning(
            LogTag::Config,
            &format!("Config file '{}' not found, using default values", path.display()),
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Apply environment overrides through a lookup function (injectable for tests)
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(key) = lookup(ENV_BIRDEYE_API_KEY).filter(|k| !k.trim().is_empty()) {
        config.providers.birdeye_api_key = Some(key.trim().to_string());
    }
    if let Some(url) = lookup(ENV_SOLANA_RPC_URL).filter(|u| !u.trim().is_empty()) {
        config.providers.solana_rpc_url = url.trim().to_string();
    }
}

/// Load configuration from a specific path and initialize the global CONFIG
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<(), String> {
    let config = read_config_file(path)?;
    CONFIG
        .set(RwLock::new(config))
        .map_err(|_| "Config already initialized".to_string())?;
    Ok(())
}

/// Load configuration from the default path
pub fn load_config() -> Result<(), String> {
    load_config_from_path(CONFIG_FILE_PATH)
}

/// Clone of the global configuration (defaults if never loaded)
pub fn get_config_clone() -> Config {
    CONFIG
        .get()
        .map(|cfg| cfg.read().clone())
        .unwrap_or_default()
}
