use std::path::Path;

use crate::cli::commands::InitArgs;
use crate::io::config_io;
use crate::io::vault_io::{self, FsVault, NoteStore};

const CONFIG_TEMPLATE: &str = r##"[vault]
# Registry of list declarations, relative to the vault root.
data_file = "tagFlowData.json"

# File extensions treated as notes.
extensions = ["md"]

# Directory names skipped when scanning for notes.
ignore = [".git", ".obsidian", ".tagflow", ".trash"]

[sync]
# `tagflow watch` resyncs the active note this often.
interval_secs = 3600

# Leave a note out of its own lists even when it carries the tag.
exclude_host = false

[log]
# trace | debug | info | warn | error (overridden by -v and TAGFLOW_LOG)
level = "warn"
"##;

pub fn cmd_init(args: InitArgs, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_io::config_path(dir);
    if config_path.is_file() && !args.force {
        return Err(format!(
            "tagflow vault already exists ({}); use --force to overwrite the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = dir.parent()
        && let Ok(parent_root) = vault_io::discover_vault(parent)
    {
        eprintln!("Note: parent vault found at {}/", parent_root.display());
        eprintln!("Creating a nested vault in {}/", dir.display());
    }

    config_io::write_config_text(dir, CONFIG_TEMPLATE)?;

    let vault = FsVault::open(dir)?;
    let notes = vault.list_notes()?.len();
    println!(
        "Initialized tagflow vault in {} ({} notes)",
        dir.display(),
        notes
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::VaultConfig;
    use tempfile::TempDir;

    #[test]
    fn test_template_matches_defaults() {
        let parsed: VaultConfig = toml::from_str(CONFIG_TEMPLATE).unwrap();
        let defaults = VaultConfig::default();
        assert_eq!(parsed.vault.data_file, defaults.vault.data_file);
        assert_eq!(parsed.vault.extensions, defaults.vault.extensions);
        assert_eq!(parsed.vault.ignore, defaults.vault.ignore);
        assert_eq!(parsed.sync.interval_secs, defaults.sync.interval_secs);
        assert_eq!(parsed.sync.exclude_host, defaults.sync.exclude_host);
        assert_eq!(parsed.log.level, defaults.log.level);
    }

    #[test]
    fn test_init_refuses_existing_without_force() {
        let tmp = TempDir::new().unwrap();
        cmd_init(InitArgs { force: false }, tmp.path()).unwrap();
        assert!(cmd_init(InitArgs { force: false }, tmp.path()).is_err());
        assert!(cmd_init(InitArgs { force: true }, tmp.path()).is_ok());
    }
}
