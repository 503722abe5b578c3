use serde::{Deserialize, Serialize};

/// Configuration from .tagflow/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub vault: VaultSection,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    /// Registry document, relative to the vault root
    #[serde(default = "default_data_file")]
    pub data_file: String,
    /// File extensions treated as notes
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Directory names skipped when enumerating notes
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

impl Default for VaultSection {
    fn default() -> Self {
        VaultSection {
            data_file: default_data_file(),
            extensions: default_extensions(),
            ignore: default_ignore(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Periodic resync interval for `tagflow watch`
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Never list the host note inside its own lists
    #[serde(default)]
    pub exclude_host: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            interval_secs: default_interval_secs(),
            exclude_host: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_data_file() -> String {
    "tagFlowData.json".to_string()
}

fn default_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

fn default_ignore() -> Vec<String> {
    [".git", ".obsidian", ".tagflow", ".trash"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_interval_secs() -> u64 {
    60 * 60
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl VaultConfig {
    /// Whether a vault-relative path names a note under this config.
    pub fn is_note_path(&self, rel_path: &str) -> bool {
        if rel_path == self.vault.data_file {
            return false;
        }
        if rel_path
            .split('/')
            .any(|part| self.vault.ignore.iter().any(|ig| ig == part))
        {
            return false;
        }
        match rel_path.rsplit_once('.') {
            Some((_, ext)) => self.vault.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: VaultConfig = toml::from_str("").unwrap();
        assert_eq!(config.vault.data_file, "tagFlowData.json");
        assert_eq!(config.vault.extensions, vec!["md"]);
        assert_eq!(config.sync.interval_secs, 3600);
        assert!(!config.sync.exclude_host);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: VaultConfig = toml::from_str(
            r#"
[sync]
exclude_host = true
"#,
        )
        .unwrap();
        assert!(config.sync.exclude_host);
        assert_eq!(config.sync.interval_secs, 3600);
        assert!(config.vault.ignore.contains(&".obsidian".to_string()));
    }

    #[test]
    fn note_path_filtering() {
        let config = VaultConfig::default();
        assert!(config.is_note_path("Proj.md"));
        assert!(config.is_note_path("daily/2024-01-01.md"));
        assert!(!config.is_note_path("tagFlowData.json"));
        assert!(!config.is_note_path(".obsidian/workspace.md"));
        assert!(!config.is_note_path("image.png"));
        assert!(!config.is_note_path("README"));
    }
}
