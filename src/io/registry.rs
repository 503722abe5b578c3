use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::io::recovery::atomic_write;
use crate::model::list::ListDeclaration;

/// The ordered set of list declarations for a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRegistry {
    pub lists: Vec<ListDeclaration>,
}

/// On-disk shape of the registry document.
#[derive(Debug, Serialize, Deserialize)]
struct RegistryDoc {
    #[serde(default)]
    lists: Vec<ListDeclaration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    updated: Option<DateTime<Utc>>,
}

impl ListRegistry {
    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn add(&mut self, decl: ListDeclaration) {
        self.lists.push(decl);
    }

    /// Remove a declaration matching tag, host note and id.
    /// Returns true if one was removed.
    pub fn remove(&mut self, decl: &ListDeclaration) -> bool {
        match self.lists.iter().position(|d| d == decl) {
            Some(idx) => {
                self.lists.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Point every declaration hosted by `old_path` at `new_path`.
    /// Returns the number of declarations updated.
    pub fn rename_host(&mut self, old_path: &str, new_path: &str) -> usize {
        let mut count = 0;
        for decl in self.lists.iter_mut().filter(|d| d.note_path == old_path) {
            decl.note_path = new_path.to_string();
            count += 1;
        }
        count
    }

    /// Drop every declaration hosted by `path`. Returns the number removed.
    pub fn remove_host(&mut self, path: &str) -> usize {
        let before = self.lists.len();
        self.lists.retain(|d| d.note_path != path);
        before - self.lists.len()
    }

    /// Declarations hosted by `path`, in registry order.
    pub fn hosted_by<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ListDeclaration> {
        self.lists.iter().filter(move |d| d.note_path == path)
    }
}

/// Read the registry document. A missing file yields an empty registry; a
/// corrupt one is backed up as `.bak` and also yields an empty registry.
pub fn read_registry_from(path: &Path) -> ListRegistry {
    if !path.exists() {
        return ListRegistry::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<RegistryDoc>(&content) {
            Ok(doc) => ListRegistry { lists: doc.lists },
            Err(e) => {
                let bak = path.with_extension("json.bak");
                let _ = fs::copy(path, &bak);
                log::warn!(
                    "event=registry_load status=corrupt path={} backup={} error={}",
                    path.display(),
                    bak.display(),
                    e
                );
                ListRegistry::default()
            }
        },
        Err(e) => {
            log::warn!(
                "event=registry_load status=error path={} error={}",
                path.display(),
                e
            );
            ListRegistry::default()
        }
    }
}

/// Write the whole registry document, stamped with the current time.
pub fn write_registry_to(path: &Path, reg: &ListRegistry) -> Result<(), std::io::Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let doc = RegistryDoc {
        lists: reg.lists.clone(),
        updated: Some(Utc::now()),
    };
    let content = serde_json::to_string_pretty(&doc)?;
    atomic_write(path, content.as_bytes())
}

/// Where the engine persists its registry after a mutation.
pub trait RegistryStore {
    fn save(&mut self, reg: &ListRegistry) -> Result<(), std::io::Error>;
}

/// The registry document on disk.
#[derive(Debug, Clone)]
pub struct RegistryFile {
    pub path: PathBuf,
}

impl RegistryFile {
    pub fn new(path: PathBuf) -> Self {
        RegistryFile { path }
    }

    pub fn load(&self) -> ListRegistry {
        read_registry_from(&self.path)
    }
}

impl RegistryStore for RegistryFile {
    fn save(&mut self, reg: &ListRegistry) -> Result<(), std::io::Error> {
        write_registry_to(&self.path, reg)?;
        log::debug!(
            "event=registry_save status=ok path={} lists={}",
            self.path.display(),
            reg.len()
        );
        Ok(())
    }
}

/// Keeps the last saved registry in memory and counts saves.
#[derive(Debug, Clone, Default)]
pub struct MemoryRegistry {
    pub saved: Option<ListRegistry>,
    pub saves: usize,
}

impl RegistryStore for MemoryRegistry {
    fn save(&mut self, reg: &ListRegistry) -> Result<(), std::io::Error> {
        self.saved = Some(reg.clone());
        self.saves += 1;
        Ok(())
    }
}
