use indexmap::{IndexMap, IndexSet};

use crate::io::vault_io::{NoteStore, VaultError};
use crate::model::tag::{TagSet, strip_marker};
use crate::parse::extract_tags;

/// Cache of note path → tag set.
///
/// Entries are derived from note text and never patched incrementally: a
/// changed note is re-extracted in full. Enumeration order is insertion
/// order, which is the sorted note order after `build` and puts newly
/// created or renamed notes last.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    entries: IndexMap<String, TagSet>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every note in the store. Unreadable notes are logged and
    /// indexed with no tags.
    pub fn build(store: &dyn NoteStore) -> Result<Self, VaultError> {
        let mut index = TagIndex::new();
        for path in store.list_notes()? {
            let tags = match store.read(&path) {
                Ok(text) => extract_tags(&text),
                Err(e) => {
                    log::warn!("event=index_read status=error note={} error={}", path, e);
                    TagSet::new()
                }
            };
            index.entries.insert(path, tags);
        }
        log::info!("event=index_build status=ok notes={}", index.len());
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&TagSet> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// A new note starts with no tags.
    pub fn insert_empty(&mut self, path: &str) {
        self.entries.insert(path.to_string(), TagSet::new());
    }

    /// Replace a note's tags from its current text. Returns true when the
    /// tag set differs from the cached one (a missing entry counts as empty).
    pub fn update(&mut self, path: &str, text: &str) -> bool {
        let tags = extract_tags(text);
        let changed = match self.entries.get(path) {
            Some(old) => *old != tags,
            None => !tags.is_empty(),
        };
        self.entries.insert(path.to_string(), tags);
        changed
    }

    /// Move an entry to a new path, keeping its tags. The moved entry
    /// enumerates last.
    pub fn rename(&mut self, from: &str, to: &str) {
        let tags = self.entries.shift_remove(from).unwrap_or_default();
        self.entries.shift_remove(to);
        self.entries.insert(to.to_string(), tags);
    }

    pub fn remove(&mut self, path: &str) -> Option<TagSet> {
        self.entries.shift_remove(path)
    }

    /// Notes carrying `tag`, in enumeration order.
    pub fn notes_with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(_, tags)| tags.contains(tag))
            .map(|(path, _)| path.as_str())
    }

    /// Every tag across every note, marker stripped, in first-seen order.
    pub fn all_tags(&self) -> Vec<String> {
        let mut seen: IndexSet<&str> = IndexSet::new();
        for tags in self.entries.values() {
            for tag in tags {
                seen.insert(strip_marker(tag));
            }
        }
        seen.into_iter().map(str::to_string).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagSet)> {
        self.entries.iter().map(|(p, t)| (p.as_str(), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::vault_io::MemoryVault;
    use pretty_assertions::assert_eq;

    fn vault() -> MemoryVault {
        MemoryVault::with_notes([
            ("B.md", "#beta #alpha"),
            ("A.md", "#alpha"),
            ("C.md", "---\ntags: [gamma]\n---\n"),
            ("D.md", "nothing"),
        ])
    }

    #[test]
    fn build_indexes_all_notes_in_path_order() {
        let index = TagIndex::build(&vault()).unwrap();
        let paths: Vec<&str> = index.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["A.md", "B.md", "C.md", "D.md"]);
        assert!(index.get("D.md").unwrap().is_empty());
    }

    #[test]
    fn notes_with_tag() {
        let index = TagIndex::build(&vault()).unwrap();
        let alpha: Vec<&str> = index.notes_with_tag("#alpha").collect();
        assert_eq!(alpha, vec!["A.md", "B.md"]);
        assert_eq!(index.notes_with_tag("#nope").count(), 0);
    }

    #[test]
    fn all_tags_strips_marker_and_dedupes() {
        let index = TagIndex::build(&vault()).unwrap();
        assert_eq!(index.all_tags(), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn update_reports_changes() {
        let mut index = TagIndex::build(&vault()).unwrap();
        assert!(!index.update("A.md", "still #alpha"));
        assert!(index.update("A.md", "#alpha #new"));
        assert!(index.update("A.md", "#new"));
        assert!(index.update("E.md", "#fresh"));
        assert!(!index.update("F.md", "untagged"));
    }

    #[test]
    fn created_note_starts_empty() {
        let mut index = TagIndex::new();
        index.insert_empty("N.md");
        assert!(index.get("N.md").unwrap().is_empty());
        assert!(index.update("N.md", "#t"));
    }

    #[test]
    fn rename_moves_entry_to_end() {
        let mut index = TagIndex::build(&vault()).unwrap();
        index.rename("A.md", "Z.md");
        assert!(!index.contains("A.md"));
        assert!(index.get("Z.md").unwrap().contains("#alpha"));
        let alpha: Vec<&str> = index.notes_with_tag("#alpha").collect();
        assert_eq!(alpha, vec!["B.md", "Z.md"]);
    }

    #[test]
    fn remove_drops_entry() {
        let mut index = TagIndex::build(&vault()).unwrap();
        assert!(index.remove("A.md").is_some());
        assert_eq!(index.len(), 3);
        assert_eq!(index.notes_with_tag("#alpha").collect::<Vec<_>>(), vec!["B.md"]);
    }
}
