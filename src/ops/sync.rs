use crate::io::registry::ListRegistry;
use crate::io::vault_io::{NoteStore, VaultError, display_name};
use crate::model::list::ListDeclaration;
use crate::ops::tag_index::TagIndex;
use crate::parse::{current_body, locate, remove_region, write_region};

/// Knobs for a sync pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Leave the host note out of its own lists.
    pub exclude_host: bool,
}

/// A declaration dropped because no note carries its tag any more.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retired {
    pub decl: ListDeclaration,
    /// The region text removed from the note (empty if it was already gone).
    pub removed: String,
}

/// What a sync pass did to one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub note: String,
    /// Lists whose region was rewritten.
    pub written: Vec<ListDeclaration>,
    /// Lists already up to date.
    pub unchanged: usize,
    /// Lists whose start anchor is no longer in the note.
    pub missing_anchor: usize,
    pub retired: Vec<Retired>,
}

impl SyncReport {
    pub fn writes(&self) -> usize {
        self.written.len() + self.retired.iter().filter(|r| !r.removed.is_empty()).count()
    }
}

/// One link line per note carrying `tag`, in index order.
pub fn render_links(index: &TagIndex, tag: &str, host: &str, opts: SyncOptions) -> String {
    index
        .notes_with_tag(tag)
        .filter(|path| !(opts.exclude_host && *path == host))
        .map(|path| format!("- [[{}]]", display_name(path)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bring every list hosted by `note` in line with the tag index.
///
/// The note is re-read for each declaration and only written when the
/// rendered region differs byte-for-byte. A list whose tag has no notes left
/// is retired: its region is removed and it leaves the registry.
///
/// Read failures skip the declaration. A write failure stops the pass and is
/// returned; retirements completed before it remain applied to `registry`.
pub fn sync_note(
    store: &mut dyn NoteStore,
    index: &TagIndex,
    registry: &mut ListRegistry,
    note: &str,
    opts: SyncOptions,
) -> Result<SyncReport, VaultError> {
    let mut report = SyncReport {
        note: note.to_string(),
        ..Default::default()
    };
    let decls: Vec<ListDeclaration> = registry.hosted_by(note).cloned().collect();

    for decl in decls {
        let text = match store.read(note) {
            Ok(t) => t,
            Err(e) => {
                log::warn!(
                    "event=sync_read status=error note={} tag={} error={}",
                    note,
                    decl.tag,
                    e
                );
                continue;
            }
        };

        let links = render_links(index, &decl.tag, note, opts);
        let bounds = locate(&text, &decl);

        if bounds.is_complete() && current_body(&text, &decl, bounds) == Some(links.as_str()) {
            report.unchanged += 1;
            continue;
        }

        if links.is_empty() {
            let removed = match (bounds.start, bounds.end) {
                (Some(s), Some(e)) => text[s..e + decl.end_anchor().len()].to_string(),
                (Some(s), None) => text[s..].lines().next().unwrap_or_default().to_string(),
                _ => String::new(),
            };
            if let Some(new_text) = remove_region(&text, &decl, bounds) {
                store.write(note, &new_text)?;
            }
            registry.remove(&decl);
            log::info!(
                "event=sync_retire note={} tag={} id={}",
                note,
                decl.tag,
                decl.id
            );
            report.retired.push(Retired { decl, removed });
            continue;
        }

        match write_region(&text, &decl, bounds, &links) {
            Some(new_text) => {
                store.write(note, &new_text)?;
                log::info!(
                    "event=sync_write note={} tag={} id={} links={}",
                    note,
                    decl.tag,
                    decl.id,
                    links.lines().count()
                );
                report.written.push(decl);
            }
            None => {
                log::warn!(
                    "event=sync_skip reason=missing_anchor note={} tag={} id={}",
                    note,
                    decl.tag,
                    decl.id
                );
                report.missing_anchor += 1;
            }
        }
    }

    Ok(report)
}
