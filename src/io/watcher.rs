use std::sync::mpsc;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::io::vault_io::FsVault;

/// File changes relevant to the sync engine, as vault-relative paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(String),
    Modified(String),
    Removed(String),
    Renamed { from: String, to: String },
    /// The registry document was rewritten (possibly by another process).
    DataFileChanged,
}

/// A file system watcher over a vault.
pub struct VaultWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<WatchEvent>,
}

impl VaultWatcher {
    /// Start watching the vault root recursively.
    pub fn start(vault: &FsVault) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let classifier = vault.clone();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let event = match result {
                    Ok(e) => e,
                    Err(e) => {
                        log::warn!("event=watch status=error error={}", e);
                        return;
                    }
                };
                for change in classify(&classifier, event) {
                    let _ = tx.send(change);
                }
            },
            Config::default(),
        )?;

        watcher.watch(&vault.root, RecursiveMode::Recursive)?;
        Ok(VaultWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Wait up to `timeout` for the next change.
    pub fn next_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Non-blocking drain of everything queued.
    pub fn poll(&self) -> Vec<WatchEvent> {
        let mut events = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            events.push(evt);
        }
        events
    }
}

/// Map a raw notify event to vault changes, dropping anything that is not a
/// note or the registry document.
fn classify(vault: &FsVault, event: Event) -> Vec<WatchEvent> {
    let data_file = vault.data_file();
    let note = |p: &std::path::PathBuf| {
        vault
            .rel_path(p)
            .filter(|rel| vault.config.is_note_path(rel))
    };

    if event.paths.iter().any(|p| *p == data_file) {
        return match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => vec![WatchEvent::DataFileChanged],
            _ => Vec::new(),
        };
    }

    match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter_map(note)
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            match (note(&event.paths[0]), note(&event.paths[1])) {
                (Some(from), Some(to)) => vec![WatchEvent::Renamed { from, to }],
                (Some(from), None) => vec![WatchEvent::Removed(from)],
                (None, Some(to)) => vec![WatchEvent::Modified(to)],
                (None, None) => Vec::new(),
            }
        }
        // Atomic saves land as a rename onto the note, so content arriving
        // by rename is a modification. One-sided halves accompany a Both
        // event; a bare `To` or `Any` still means a note may have changed.
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|p| p.is_file())
            .filter_map(note)
            .map(WatchEvent::Modified)
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter_map(note)
            .map(WatchEvent::Modified)
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .filter_map(note)
            .map(WatchEvent::Removed)
            .collect(),
        _ => Vec::new(),
    }
}
