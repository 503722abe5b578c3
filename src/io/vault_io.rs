use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::config_io;
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::model::config::VaultConfig;

/// Name of the per-vault state directory.
pub const TAGFLOW_DIR: &str = ".tagflow";

/// Error type for vault I/O operations
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("not a tagflow vault: no .tagflow/config.toml found (run `tagflow init`)")]
    NotAVault,
    #[error("note not found: {0}")]
    NoteNotFound(String),
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config.toml: {0}")]
    ConfigParseError(#[from] toml::de::Error),
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Note storage as seen by the sync engine.
///
/// Notes are addressed by vault-relative paths using `/` separators.
pub trait NoteStore {
    fn read(&self, path: &str) -> Result<String, VaultError>;
    fn write(&mut self, path: &str, text: &str) -> Result<(), VaultError>;
    /// All notes, sorted by path.
    fn list_notes(&self) -> Result<Vec<String>, VaultError>;
    fn exists(&self, path: &str) -> bool;
}

/// Display name of a note: file name without directory or extension.
pub fn display_name(path: &str) -> &str {
    let file = path.rsplit('/').next().unwrap_or(path);
    match file.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file,
    }
}

/// The `.tagflow/` directory of a vault root.
pub fn tagflow_dir(root: &Path) -> PathBuf {
    root.join(TAGFLOW_DIR)
}

/// Discover the vault by walking up from the given directory, looking for
/// a `.tagflow/config.toml`.
pub fn discover_vault(start: &Path) -> Result<PathBuf, VaultError> {
    let mut current = start.to_path_buf();
    loop {
        if config_io::config_path(&current).is_file() {
            return Ok(current);
        }
        if !current.pop() {
            return Err(VaultError::NotAVault);
        }
    }
}

// ---------------------------------------------------------------------------
// File system vault
// ---------------------------------------------------------------------------

/// A vault backed by a directory of markdown files.
#[derive(Debug, Clone)]
pub struct FsVault {
    pub root: PathBuf,
    pub config: VaultConfig,
}

impl FsVault {
    /// Open the vault rooted at `root`, reading its config.
    pub fn open(root: &Path) -> Result<Self, VaultError> {
        let config = config_io::read_config(root)?;
        Ok(FsVault {
            root: root.to_path_buf(),
            config,
        })
    }

    pub fn tagflow_dir(&self) -> PathBuf {
        tagflow_dir(&self.root)
    }

    /// Absolute path of the registry document.
    pub fn data_file(&self) -> PathBuf {
        self.root.join(&self.config.vault.data_file)
    }

    pub fn abs_path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Vault-relative form of an absolute path, if it lies inside the vault.
    pub fn rel_path(&self, abs: &Path) -> Option<String> {
        let rel = abs.strip_prefix(&self.root).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("/"))
        }
    }

    /// Resolve a note argument given on the command line (relative to the
    /// cwd, absolute, or already vault-relative) to a vault-relative path.
    pub fn resolve_note(&self, arg: &str) -> Result<String, VaultError> {
        let as_given = Path::new(arg);
        let candidates = [
            std::env::current_dir().ok().map(|cwd| cwd.join(as_given)),
            Some(self.root.join(as_given)),
        ];
        for candidate in candidates.into_iter().flatten() {
            if candidate.is_file()
                && let Ok(abs) = fs::canonicalize(&candidate)
                && let Some(rel) = self.rel_path(&abs)
                && self.config.is_note_path(&rel)
            {
                return Ok(rel);
            }
        }
        Err(VaultError::NoteNotFound(arg.to_string()))
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<(), VaultError> {
        let entries = fs::read_dir(dir).map_err(|e| VaultError::ReadError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                if self.config.vault.ignore.iter().any(|ig| *ig == name) {
                    continue;
                }
                self.walk(&path, out)?;
            } else if let Some(rel) = self.rel_path(&path)
                && self.config.is_note_path(&rel)
            {
                out.push(rel);
            }
        }
        Ok(())
    }
}

impl NoteStore for FsVault {
    fn read(&self, path: &str) -> Result<String, VaultError> {
        let abs = self.abs_path(path);
        fs::read_to_string(&abs).map_err(|e| VaultError::ReadError {
            path: abs,
            source: e,
        })
    }

    fn write(&mut self, path: &str, text: &str) -> Result<(), VaultError> {
        let abs = self.abs_path(path);
        if let Err(e) = recovery::atomic_write(&abs, text.as_bytes()) {
            recovery::log_recovery(
                &self.tagflow_dir(),
                RecoveryEntry {
                    timestamp: chrono::Utc::now(),
                    category: RecoveryCategory::Write,
                    description: "note write failed".to_string(),
                    fields: vec![
                        ("Target".to_string(), path.to_string()),
                        ("Error".to_string(), e.to_string()),
                    ],
                    body: text.to_string(),
                },
            );
            return Err(VaultError::WriteError {
                path: abs,
                source: e,
            });
        }
        Ok(())
    }

    fn list_notes(&self) -> Result<Vec<String>, VaultError> {
        let mut notes = Vec::new();
        self.walk(&self.root, &mut notes)?;
        notes.sort();
        Ok(notes)
    }

    fn exists(&self, path: &str) -> bool {
        self.abs_path(path).is_file()
    }
}

// ---------------------------------------------------------------------------
// In-memory vault
// ---------------------------------------------------------------------------

/// A vault held entirely in memory. Counts writes so callers can check
/// that unchanged lists are not rewritten.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    notes: BTreeMap<String, String>,
    writes: usize,
    read_only: bool,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_notes<I, P, T>(notes: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: Into<String>,
    {
        MemoryVault {
            notes: notes
                .into_iter()
                .map(|(p, t)| (p.into(), t.into()))
                .collect(),
            ..Default::default()
        }
    }

    /// Set a note's text directly, without counting a write.
    pub fn insert(&mut self, path: &str, text: &str) {
        self.notes.insert(path.to_string(), text.to_string());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.notes.remove(path)
    }

    pub fn rename(&mut self, from: &str, to: &str) {
        if let Some(text) = self.notes.remove(from) {
            self.notes.insert(to.to_string(), text);
        }
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.notes.get(path).map(|s| s.as_str())
    }

    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Make every subsequent write fail.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

impl NoteStore for MemoryVault {
    fn read(&self, path: &str) -> Result<String, VaultError> {
        self.notes
            .get(path)
            .cloned()
            .ok_or_else(|| VaultError::NoteNotFound(path.to_string()))
    }

    fn write(&mut self, path: &str, text: &str) -> Result<(), VaultError> {
        if self.read_only {
            return Err(VaultError::WriteError {
                path: PathBuf::from(path),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.notes.insert(path.to_string(), text.to_string());
        self.writes += 1;
        Ok(())
    }

    fn list_notes(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.notes.keys().cloned().collect())
    }

    fn exists(&self, path: &str) -> bool {
        self.notes.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_vault(dir: &Path) {
        fs::create_dir_all(dir.join(".tagflow")).unwrap();
        fs::write(dir.join(".tagflow/config.toml"), "").unwrap();
        fs::create_dir_all(dir.join("daily")).unwrap();
        fs::create_dir_all(dir.join(".obsidian")).unwrap();
        fs::write(dir.join("Proj.md"), "# Proj\n").unwrap();
        fs::write(dir.join("X.md"), "#alpha\n").unwrap();
        fs::write(dir.join("daily/2024-01-01.md"), "#alpha\n").unwrap();
        fs::write(dir.join(".obsidian/hidden.md"), "#alpha\n").unwrap();
        fs::write(dir.join("image.png"), "png").unwrap();
        fs::write(dir.join("tagFlowData.json"), "{\"lists\":[]}").unwrap();
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("X.md"), "X");
        assert_eq!(display_name("daily/2024-01-01.md"), "2024-01-01");
        assert_eq!(display_name("a.b/c.d.md"), "c.d");
        assert_eq!(display_name("README"), "README");
        assert_eq!(display_name(".hidden"), ".hidden");
    }

    #[test]
    fn test_discover_vault() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());

        let root = discover_vault(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());

        let root = discover_vault(&tmp.path().join("daily")).unwrap();
        assert_eq!(root, tmp.path());
    }

    #[test]
    fn test_discover_vault_not_found() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_vault(tmp.path()),
            Err(VaultError::NotAVault)
        ));
    }

    #[test]
    fn test_list_notes_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());
        let vault = FsVault::open(tmp.path()).unwrap();
        assert_eq!(
            vault.list_notes().unwrap(),
            vec!["Proj.md", "X.md", "daily/2024-01-01.md"]
        );
    }

    #[test]
    fn test_read_write_note() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());
        let mut vault = FsVault::open(tmp.path()).unwrap();
        vault.write("Proj.md", "# Proj\nnew\n").unwrap();
        assert_eq!(vault.read("Proj.md").unwrap(), "# Proj\nnew\n");
        assert!(vault.exists("Proj.md"));
        assert!(!vault.exists("Nope.md"));
    }

    #[test]
    fn test_read_missing_note() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());
        let vault = FsVault::open(tmp.path()).unwrap();
        assert!(matches!(
            vault.read("Nope.md"),
            Err(VaultError::ReadError { .. })
        ));
    }

    #[test]
    fn test_resolve_note() {
        let tmp = TempDir::new().unwrap();
        create_test_vault(tmp.path());
        let root = fs::canonicalize(tmp.path()).unwrap();
        let vault = FsVault::open(&root).unwrap();
        assert_eq!(vault.resolve_note("daily/2024-01-01.md").unwrap(), "daily/2024-01-01.md");
        let abs = root.join("X.md");
        assert_eq!(vault.resolve_note(abs.to_str().unwrap()).unwrap(), "X.md");
        assert!(vault.resolve_note("image.png").is_err());
        assert!(vault.resolve_note("Missing.md").is_err());
    }

    #[test]
    fn test_memory_vault_counts_writes() {
        let mut vault = MemoryVault::with_notes([("A.md", "a")]);
        assert_eq!(vault.write_count(), 0);
        vault.write("A.md", "b").unwrap();
        assert_eq!(vault.get("A.md"), Some("b"));
        assert_eq!(vault.write_count(), 1);
        vault.set_read_only(true);
        assert!(vault.write("A.md", "c").is_err());
        assert_eq!(vault.get("A.md"), Some("b"));
    }
}
