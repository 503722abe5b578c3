use crate::io::registry::{ListRegistry, RegistryStore};
use crate::io::vault_io::{NoteStore, display_name};
use crate::model::list::ListDeclaration;
use crate::model::tag::normalize_tag;
use crate::ops::engine::{Engine, EngineError};
use crate::ops::sync::SyncReport;
use crate::parse::{empty_region, insert_at_line, locate, remove_region};

/// Result of creating a list.
#[derive(Debug, Clone)]
pub struct Created {
    pub decl: ListDeclaration,
    pub report: SyncReport,
}

/// Attach a list for `tag` to `note`.
///
/// The empty anchor pair goes before 1-based `at_line` (end of note when
/// None), the declaration is registered and saved, and the note is synced
/// straight away. A tag no note carries is refused, since the first sync
/// would retire the list again.
pub fn create_list(
    engine: &mut Engine,
    notes: &mut dyn NoteStore,
    lists: &mut dyn RegistryStore,
    note: &str,
    tag: &str,
    at_line: Option<usize>,
) -> Result<Created, EngineError> {
    let tag = normalize_tag(tag).ok_or_else(|| EngineError::InvalidTag(tag.to_string()))?;
    if engine.index.notes_with_tag(&tag).next().is_none() {
        return Err(EngineError::NoMatches(tag));
    }

    let decl = ListDeclaration::new(tag, note, next_id(&engine.registry, note));
    let text = notes.read(note)?;
    notes.write(note, &insert_at_line(&text, at_line, &empty_region(&decl)))?;

    engine.registry.add(decl.clone());
    lists.save(&engine.registry).map_err(EngineError::Persist)?;
    engine.mark_list_created();
    log::info!(
        "event=list_create note={} tag={} id={}",
        note,
        decl.tag,
        decl.id
    );

    let before = engine.registry.len();
    let report = engine.sync_note(notes, note)?;
    if engine.registry.len() != before {
        lists.save(&engine.registry).map_err(EngineError::Persist)?;
    }
    Ok(Created { decl, report })
}

/// Attach a list whose tag is the note's own title.
pub fn create_list_from_title(
    engine: &mut Engine,
    notes: &mut dyn NoteStore,
    lists: &mut dyn RegistryStore,
    note: &str,
    at_line: Option<usize>,
) -> Result<Created, EngineError> {
    let title = display_name(note).to_string();
    create_list(engine, notes, lists, note, &title, at_line)
}

/// Remove a list: strip its region from the host note and drop the
/// declaration. Returns true if the note was rewritten.
///
/// An unreadable host note does not block removing the declaration.
pub fn delete_list(
    registry: &mut ListRegistry,
    notes: &mut dyn NoteStore,
    lists: &mut dyn RegistryStore,
    decl: &ListDeclaration,
) -> Result<bool, EngineError> {
    let mut written = false;
    match notes.read(&decl.note_path) {
        Ok(text) => {
            if let Some(new_text) = remove_region(&text, decl, locate(&text, decl))
                && new_text != text
            {
                notes.write(&decl.note_path, &new_text)?;
                written = true;
            }
        }
        Err(e) => log::warn!(
            "event=list_delete status=unreadable note={} error={}",
            decl.note_path,
            e
        ),
    }

    if registry.remove(decl) {
        lists.save(registry).map_err(EngineError::Persist)?;
    }
    log::info!(
        "event=list_delete note={} tag={} id={} written={}",
        decl.note_path,
        decl.tag,
        decl.id,
        written
    );
    Ok(written)
}

/// Lists hosted by `note`, in registry order.
pub fn lists_in(registry: &ListRegistry, note: &str) -> Vec<ListDeclaration> {
    registry.hosted_by(note).cloned().collect()
}

/// Epoch milliseconds, bumped past any id already used in this note.
fn next_id(registry: &ListRegistry, note: &str) -> i64 {
    let mut id = chrono::Utc::now().timestamp_millis();
    while registry.hosted_by(note).any(|d| d.id == id) {
        id += 1;
    }
    id
}
