use std::fs;
use std::path::{Path, PathBuf};

use crate::io::vault_io::{VaultError, tagflow_dir};
use crate::model::config::VaultConfig;

/// Path of a vault's config file.
pub fn config_path(root: &Path) -> PathBuf {
    tagflow_dir(root).join("config.toml")
}

/// Read and parse the vault config.
pub fn read_config(root: &Path) -> Result<VaultConfig, VaultError> {
    let path = config_path(root);
    let text = fs::read_to_string(&path).map_err(|e| VaultError::ReadError {
        path: path.clone(),
        source: e,
    })?;
    Ok(toml::from_str(&text)?)
}

/// Write a config file verbatim (used by `tagflow init`).
pub fn write_config_text(root: &Path, text: &str) -> Result<(), VaultError> {
    let path = config_path(root);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, text).map_err(|e| VaultError::WriteError { path, source: e })
}
