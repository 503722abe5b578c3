use crate::io::registry::{ListRegistry, RegistryStore};
use crate::io::vault_io::{NoteStore, VaultError};
use crate::ops::sync::{SyncOptions, SyncReport, sync_note};
use crate::ops::tag_index::TagIndex;

/// Error type for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("could not save list registry: {0}")]
    Persist(#[source] std::io::Error),
    #[error("invalid tag: {0:?}")]
    InvalidTag(String),
    #[error("no note carries {0}; nothing to list")]
    NoMatches(String),
}

/// Something that happened to the vault or to the user's focus.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Created(String),
    Modified { path: String, text: String },
    Renamed { from: String, to: String },
    Deleted(String),
    /// Periodic resync.
    Tick,
    /// The note in view changed (None: nothing in view).
    ViewChanged(Option<String>),
    LayoutChanged { graph_open: bool },
    /// The registry document was rewritten outside this process.
    RegistryChanged(ListRegistry),
}

/// I/O requested by a state transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effect {
    /// Sync the active note.
    pub sync: bool,
    /// Save the registry.
    pub persist: bool,
}

impl Effect {
    pub fn none() -> Self {
        Effect::default()
    }

    fn sync() -> Self {
        Effect {
            sync: true,
            persist: false,
        }
    }

    fn persist_if(cond: bool) -> Self {
        Effect {
            sync: false,
            persist: cond,
        }
    }
}

/// Application state: the tag index, the list registry and what the user is
/// looking at. Built once at startup and passed to every handler.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    pub index: TagIndex,
    pub registry: ListRegistry,
    pub options: SyncOptions,
    active: Option<String>,
    list_created: bool,
    /// Vault-relative path of the registry document, never indexed.
    data_file: Option<String>,
}

impl Engine {
    /// Index every note and take ownership of the loaded registry.
    pub fn load(
        notes: &dyn NoteStore,
        registry: ListRegistry,
        options: SyncOptions,
    ) -> Result<Self, VaultError> {
        let index = TagIndex::build(notes)?;
        log::info!(
            "event=engine_load notes={} lists={}",
            index.len(),
            registry.len()
        );
        Ok(Engine {
            index,
            registry,
            options,
            ..Default::default()
        })
    }

    pub fn with_data_file(mut self, rel: impl Into<String>) -> Self {
        self.data_file = Some(rel.into());
        self
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The next tag-set change on any note triggers a sync even if no tags
    /// changed, so a fresh list gets filled in.
    pub fn mark_list_created(&mut self) {
        self.list_created = true;
    }

    fn is_data_file(&self, path: &str) -> bool {
        self.data_file.as_deref() == Some(path)
    }

    /// Apply `event` to in-memory state and report what I/O it calls for.
    pub fn transition(&mut self, event: Event) -> Effect {
        match event {
            Event::Created(path) => {
                if !self.is_data_file(&path) {
                    self.index.insert_empty(&path);
                }
                Effect::none()
            }
            Event::Modified { path, text } => {
                if self.is_data_file(&path) {
                    return Effect::none();
                }
                let changed = self.index.update(&path, &text);
                if changed || self.list_created {
                    self.list_created = false;
                    Effect::sync()
                } else {
                    Effect::none()
                }
            }
            Event::Renamed { from, to } => {
                self.index.rename(&from, &to);
                let moved = self.registry.rename_host(&from, &to);
                if self.active.as_deref() == Some(from.as_str()) {
                    self.active = Some(to.clone());
                }
                log::info!(
                    "event=note_rename from={} to={} lists={}",
                    from,
                    to,
                    moved
                );
                Effect::persist_if(moved > 0)
            }
            Event::Deleted(path) => {
                self.index.remove(&path);
                let dropped = self.registry.remove_host(&path);
                if self.active.as_deref() == Some(path.as_str()) {
                    self.active = None;
                }
                log::info!("event=note_delete note={} lists={}", path, dropped);
                Effect::persist_if(dropped > 0)
            }
            Event::Tick => Effect::sync(),
            Event::ViewChanged(path) => {
                self.active = path;
                Effect::sync()
            }
            Event::LayoutChanged { graph_open } => Effect {
                sync: graph_open,
                persist: false,
            },
            Event::RegistryChanged(registry) => {
                if registry == self.registry {
                    return Effect::none();
                }
                log::info!(
                    "event=registry_reload lists_before={} lists_after={}",
                    self.registry.len(),
                    registry.len()
                );
                self.registry = registry;
                Effect::sync()
            }
        }
    }

    /// Perform the I/O an effect asks for.
    ///
    /// Retirements made during the sync are persisted even when the sync
    /// itself failed to write the note.
    pub fn apply(
        &mut self,
        effect: Effect,
        notes: &mut dyn NoteStore,
        lists: &mut dyn RegistryStore,
    ) -> Result<Option<SyncReport>, EngineError> {
        let mut persist = effect.persist;
        let mut outcome = Ok(None);

        if effect.sync {
            let before = self.registry.len();
            outcome = self.sync_active(notes).map_err(EngineError::from);
            persist |= self.registry.len() != before;
        }

        if persist {
            lists.save(&self.registry).map_err(EngineError::Persist)?;
        }
        outcome
    }

    /// `transition` followed by `apply`.
    pub fn handle(
        &mut self,
        event: Event,
        notes: &mut dyn NoteStore,
        lists: &mut dyn RegistryStore,
    ) -> Result<Option<SyncReport>, EngineError> {
        let effect = self.transition(event);
        self.apply(effect, notes, lists)
    }

    /// Sync the active note. No-op when the registry is empty or nothing
    /// is in view.
    pub fn sync_active(
        &mut self,
        notes: &mut dyn NoteStore,
    ) -> Result<Option<SyncReport>, VaultError> {
        if self.registry.is_empty() {
            return Ok(None);
        }
        let Some(note) = self.active.clone() else {
            return Ok(None);
        };
        self.sync_note(notes, &note).map(Some)
    }

    /// Sync the lists hosted by any note, active or not.
    pub fn sync_note(
        &mut self,
        notes: &mut dyn NoteStore,
        note: &str,
    ) -> Result<SyncReport, VaultError> {
        sync_note(notes, &self.index, &mut self.registry, note, self.options)
    }
}
