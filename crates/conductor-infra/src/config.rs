//! Configuration loader for Conductor.
//!
//! Reads `conductor.toml` and deserializes it into [`ConductorConfig`]. Falls
//! back to defaults when the file is missing or malformed.

use std::path::{Path, PathBuf};

use conductor_types::config::ConductorConfig;

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "conductor.toml";

/// Load configuration from `path`.
///
/// - If the file does not exist, returns [`ConductorConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - Otherwise returns the parsed config.
pub async fn load_config(path: &Path) -> ConductorConfig {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config found at {}, using defaults", path.display());
            return ConductorConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", path.display());
            return ConductorConfig::default();
        }
    };

    match toml::from_str::<ConductorConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("Failed to parse {}: {err}, using defaults", path.display());
            ConductorConfig::default()
        }
    }
}

/// Resolve which config file to read.
///
/// Priority:
/// 1. An explicit path (`--config` / `CONDUCTOR_CONFIG`)
/// 2. `./conductor.toml` if it exists
/// 3. `{user config dir}/conductor/conductor.toml`
///
/// The returned path may not exist; [`load_config`] handles that.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return local;
    }
    dirs::config_dir()
        .map(|dir| dir.join("conductor").join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}
