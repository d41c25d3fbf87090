//! CLI configuration utilities

use anyhow::{Context, Result};
use meditrack_client::{ClientConfig, StateDir};
use std::path::Path;
use tracing::info;

/// Load client configuration
///
/// An explicit path must exist. Otherwise the state directory's
/// `config.json` is used when present, and defaults plus environment
/// variables when it is not.
pub fn load_client_config(explicit: Option<&Path>, state_dir: &StateDir) -> Result<ClientConfig> {
    if let Some(path) = explicit {
        info!("Loading configuration from: {}", path.display());
        return ClientConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()));
    }

    let default_path = state_dir.config_path();
    if default_path.exists() {
        info!("Loading configuration from: {}", default_path.display());
        Ok(ClientConfig::from_file(&default_path)?)
    } else {
        Ok(ClientConfig::from_env()?)
    }
}

/// State directory for this run
///
/// A `state_dir` set in the configuration wins over the discovered one unless
/// the directory was given explicitly on the command line. The setting is
/// taken out of `config` so it is not written back by `config init`.
pub fn effective_state_dir(
    explicit: bool,
    config: &mut ClientConfig,
    discovered: StateDir,
) -> StateDir {
    match config.state_dir.take() {
        Some(dir) if !explicit => StateDir::with_override(dir),
        _ => discovered,
    }
}

/// Save client configuration to a JSON file
pub fn save_client_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
