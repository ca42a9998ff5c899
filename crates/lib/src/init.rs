//! Initialize the configuration directory: create ~/.assist with a default config and an empty tenants file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::tenants::TenantsFile;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with every default spelled out if missing.
/// - Writes the tenants file (`{"tenants": []}`) at the resolved tenants path if missing.
///
/// Existing files are never overwritten. Returns the config directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    let config = if config_path.exists() {
        let (config, _) = config::load_config(Some(config_path.to_path_buf()))?;
        config
    } else {
        let config = Config::default();
        let s = serde_json::to_string_pretty(&config).context("serializing default config")?;
        std::fs::write(config_path, s)
            .with_context(|| format!("writing {}", config_path.display()))?;
        log::info!("wrote default config to {}", config_path.display());
        config
    };

    let tenants_path = config::resolve_tenants_path(&config, config_path);
    if !tenants_path.exists() {
        if let Some(parent) = tenants_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let s = serde_json::to_string_pretty(&TenantsFile::default())
            .context("serializing tenants file")?;
        std::fs::write(&tenants_path, s)
            .with_context(|| format!("writing {}", tenants_path.display()))?;
        log::info!("wrote empty tenants file to {}", tenants_path.display());
    }

    Ok(config_dir)
}
