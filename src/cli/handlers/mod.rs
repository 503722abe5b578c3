mod init;
pub use init::cmd_init;

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::lock::VaultLock;
use crate::io::recovery::{self, RecoveryCategory, RecoveryEntry};
use crate::io::registry::{RegistryFile, RegistryStore};
use crate::io::vault_io::{self, FsVault, NoteStore, VaultError};
use crate::io::watcher::{VaultWatcher, WatchEvent};
use crate::logging;
use crate::model::list::ListDeclaration;
use crate::model::tag::normalize_tag;
use crate::ops::engine::{Effect, Engine, Event};
use crate::ops::lists;
use crate::ops::sync::{SyncOptions, SyncReport};
use crate::ops::tag_index::TagIndex;
use crate::tui::picker::{Picker, run_picker};

/// What every command gets: the opened vault and output mode.
struct Ctx {
    vault: FsVault,
    json: bool,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let start = match cli.vault_dir.as_deref() {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::fs::canonicalize(std::env::current_dir()?)?,
    };
    let env_level = std::env::var(logging::LOG_ENV).ok();

    // Init runs before vault discovery
    if let Commands::Init(args) = cli.command {
        let level = logging::resolve_level(env_level.as_deref(), cli.verbose, None);
        let _log = logging::init_stderr(level)?;
        return cmd_init(args, &start);
    }

    let root = vault_io::discover_vault(&start)?;
    let vault = FsVault::open(&root)?;
    let level = logging::resolve_level(
        env_level.as_deref(),
        cli.verbose,
        Some(&vault.config.log.level),
    );
    let _log = match cli.command {
        Commands::Watch(_) => logging::init_with_files(level, &vault.tagflow_dir().join("logs"))?,
        _ => logging::init_stderr(level)?,
    };

    let ctx = Ctx {
        vault,
        json: cli.json,
    };
    match cli.command {
        Commands::Init(_) => Ok(()),
        Commands::Tags => cmd_tags(&ctx),
        Commands::Lists(args) => cmd_lists(&ctx, args),
        Commands::New(args) => cmd_new(&ctx, args),
        Commands::Delete(args) => cmd_delete(&ctx, args),
        Commands::Sync(args) => cmd_sync(&ctx, args),
        Commands::Index => cmd_index(&ctx),
        Commands::Watch(args) => cmd_watch(&ctx, args),
        Commands::Recovery(args) => cmd_recovery(&ctx, args),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn registry_file(vault: &FsVault) -> RegistryFile {
    RegistryFile::new(vault.data_file())
}

fn load_engine(vault: &FsVault, file: &RegistryFile) -> Result<Engine, VaultError> {
    let options = SyncOptions {
        exclude_host: vault.config.sync.exclude_host,
    };
    Ok(Engine::load(vault, file.load(), options)?.with_data_file(vault.config.vault.data_file.clone()))
}

fn acquire_lock(vault: &FsVault) -> Result<VaultLock, Box<dyn std::error::Error>> {
    Ok(VaultLock::for_vault(vault)?)
}

/// Keep the text of retired regions in the recovery log.
fn record_retirements(vault: &FsVault, report: &SyncReport) {
    for retired in report.retired.iter().filter(|r| !r.removed.is_empty()) {
        recovery::log_recovery(
            &vault.tagflow_dir(),
            RecoveryEntry {
                timestamp: chrono::Utc::now(),
                category: RecoveryCategory::Retire,
                description: format!("list {} retired, no notes carry the tag", retired.decl.label()),
                fields: vec![
                    ("Note".to_string(), retired.decl.note_path.clone()),
                    ("Tag".to_string(), retired.decl.tag.clone()),
                    ("Id".to_string(), retired.decl.id.to_string()),
                ],
                body: retired.removed.clone(),
            },
        );
    }
}

fn require_terminal(what: &str) -> Result<(), Box<dyn std::error::Error>> {
    if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
        Ok(())
    } else {
        Err(format!("no terminal for the picker; {}", what).into())
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_tags(ctx: &Ctx) -> Result<(), Box<dyn std::error::Error>> {
    let index = TagIndex::build(&ctx.vault)?;
    let tags = index.all_tags();
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&tags)?);
    } else {
        for tag in tags {
            println!("{}", tag);
        }
    }
    Ok(())
}

fn cmd_lists(ctx: &Ctx, args: ListsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let registry = registry_file(&ctx.vault).load();
    let decls: Vec<ListDeclaration> = match args.note {
        Some(note) => {
            let rel = ctx.vault.resolve_note(&note)?;
            lists::lists_in(&registry, &rel)
        }
        None => registry.lists,
    };

    if ctx.json {
        let out: Vec<ListJson> = decls.iter().map(list_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if decls.is_empty() {
        println!("no lists");
    } else {
        let width = decls
            .iter()
            .map(|d| d.note_path.chars().count())
            .max()
            .unwrap_or(0);
        for d in &decls {
            println!("{:<width$}  {}", d.note_path, d.label(), width = width);
        }
    }
    Ok(())
}

fn cmd_index(ctx: &Ctx) -> Result<(), Box<dyn std::error::Error>> {
    let index = TagIndex::build(&ctx.vault)?;
    if ctx.json {
        let out: Vec<IndexEntryJson> = index
            .iter()
            .map(|(note, tags)| IndexEntryJson {
                note: note.to_string(),
                tags: tags.iter().cloned().collect(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for (note, tags) in index.iter() {
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            println!("{}: {}", note, tags.join(" "));
        }
    }
    Ok(())
}

fn cmd_recovery(ctx: &Ctx, args: RecoveryArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dir = ctx.vault.tagflow_dir();
    if args.path {
        println!("{}", recovery::recovery_log_path(&dir).display());
        return Ok(());
    }

    let entries = recovery::read_recovery_entries(&dir, Some(args.limit.unwrap_or(10)));
    if ctx.json {
        let out: Vec<RecoveryEntryJson> = entries.iter().map(recovery_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("recovery log is empty");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{} {}: {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.category,
            entry.description
        );
        for (key, value) in &entry.fields {
            println!("  {}: {}", key, value);
        }
        for line in entry.body.lines() {
            println!("  | {}", line);
        }
        println!();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Write commands
// ---------------------------------------------------------------------------

fn cmd_new(ctx: &Ctx, args: NewArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut vault = ctx.vault.clone();
    let note = vault.resolve_note(&args.note)?;
    let _lock = acquire_lock(&vault)?;
    let mut file = registry_file(&vault);
    let mut engine = load_engine(&vault, &file)?;

    let created = if args.from_title {
        lists::create_list_from_title(&mut engine, &mut vault, &mut file, &note, args.line)?
    } else {
        let tag = match args.tag {
            Some(tag) => tag,
            None => {
                require_terminal("pass --tag or --from-title")?;
                let picker = Picker::new("Pick a tag", engine.index.all_tags(), |t| t.clone());
                match run_picker(picker)? {
                    Some(tag) => tag,
                    None => {
                        eprintln!("cancelled");
                        return Ok(());
                    }
                }
            }
        };
        lists::create_list(&mut engine, &mut vault, &mut file, &note, &tag, args.line)?
    };
    record_retirements(&vault, &created.report);

    if ctx.json {
        let out = CreatedJson {
            list: list_to_json(&created.decl),
            sync: sync_to_json(&created.report),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("created {} in {}", created.decl.label(), note);
        println!("{}", format_sync(&created.report));
    }
    Ok(())
}

fn cmd_delete(ctx: &Ctx, args: DeleteArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut vault = ctx.vault.clone();
    let note = vault.resolve_note(&args.note)?;
    let _lock = acquire_lock(&vault)?;
    let mut file = registry_file(&vault);
    let mut registry = file.load();
    let candidates = lists::lists_in(&registry, &note);

    let decl = match (args.tag, args.id) {
        (Some(tag), Some(id)) => {
            let tag = normalize_tag(&tag).ok_or_else(|| format!("invalid tag: {:?}", tag))?;
            candidates
                .into_iter()
                .find(|d| d.tag == tag && d.id == id)
                .ok_or_else(|| format!("no list {} (ID: {}) in {}", tag, id, note))?
        }
        _ => {
            if candidates.is_empty() {
                return Err(format!("no lists in {}", note).into());
            }
            require_terminal("pass --tag and --id")?;
            let picker = Picker::new("Delete a list", candidates, ListDeclaration::label);
            match run_picker(picker)? {
                Some(decl) => decl,
                None => {
                    eprintln!("cancelled");
                    return Ok(());
                }
            }
        }
    };

    let note_written = lists::delete_list(&mut registry, &mut vault, &mut file, &decl)?;
    if ctx.json {
        let out = DeletedJson {
            list: list_to_json(&decl),
            note_written,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("deleted {} from {}", decl.label(), note);
    }
    Ok(())
}

fn cmd_sync(ctx: &Ctx, args: SyncArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut vault = ctx.vault.clone();
    let notes: Vec<String> = if args.notes.is_empty() {
        let registry = registry_file(&vault).load();
        let mut hosts: Vec<String> = Vec::new();
        for decl in &registry.lists {
            if !hosts.contains(&decl.note_path) {
                hosts.push(decl.note_path.clone());
            }
        }
        hosts
    } else {
        args.notes
            .iter()
            .map(|n| vault.resolve_note(n))
            .collect::<Result<_, _>>()?
    };

    let _lock = acquire_lock(&vault)?;
    let mut file = registry_file(&vault);
    let mut engine = load_engine(&vault, &file)?;
    let before = engine.registry.len();

    let mut reports = Vec::new();
    let mut failure = None;
    for note in &notes {
        match engine.sync_note(&mut vault, note) {
            Ok(report) => {
                record_retirements(&vault, &report);
                reports.push(report);
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if engine.registry.len() != before {
        file.save(&engine.registry)?;
    }
    if let Some(e) = failure {
        return Err(e.into());
    }

    if ctx.json {
        let out: Vec<SyncJson> = reports.iter().map(sync_to_json).collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if reports.is_empty() {
        println!("no lists to sync");
    } else {
        for report in &reports {
            println!("{}", format_sync(report));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Watch
// ---------------------------------------------------------------------------

fn cmd_watch(ctx: &Ctx, args: WatchArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut vault = ctx.vault.clone();
    let mut file = registry_file(&vault);
    let pinned = match args.note {
        Some(note) => Some(vault.resolve_note(&note)?),
        None => None,
    };

    let mut engine = {
        let _lock = acquire_lock(&vault)?;
        load_engine(&vault, &file)?
    };
    let watcher = VaultWatcher::start(&vault)?;
    let interval = Duration::from_secs(vault.config.sync.interval_secs.max(1));
    let mut next_tick = Instant::now() + interval;

    eprintln!(
        "watching {} ({} notes, {} lists); Ctrl-C to stop",
        vault.root.display(),
        engine.index.len(),
        engine.registry.len()
    );
    if let Some(note) = &pinned {
        run_event(&mut engine, Event::ViewChanged(Some(note.clone())), &mut vault, &mut file);
    }

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        let mut changes = Vec::new();
        match watcher.next_timeout(wait) {
            Some(change) => {
                changes.push(change);
                changes.extend(watcher.poll());
            }
            None => {
                next_tick = Instant::now() + interval;
                run_event(&mut engine, Event::Tick, &mut vault, &mut file);
                continue;
            }
        }

        for change in changes {
            for event in to_events(&vault, &file, change, pinned.is_some(), engine.active()) {
                run_event(&mut engine, event, &mut vault, &mut file);
            }
        }
    }
}

/// Translate a file change into engine events. Without a pinned note the
/// most recently modified note becomes the active one.
///
/// A removal only counts once the note is really gone: editors that save by
/// moving the note aside and writing a new file report a removal for a note
/// that is back on disk by the time it is handled.
fn to_events(
    vault: &FsVault,
    file: &RegistryFile,
    change: WatchEvent,
    pinned: bool,
    active: Option<&str>,
) -> Vec<Event> {
    match change {
        WatchEvent::Created(path) => vec![Event::Created(path)],
        WatchEvent::Modified(path) => modified_events(vault, path, pinned, active),
        WatchEvent::Removed(path) if vault.exists(&path) => {
            log::debug!("event=watch_remove status=still_present note={}", path);
            modified_events(vault, path, pinned, active)
        }
        WatchEvent::Removed(path) => vec![Event::Deleted(path)],
        WatchEvent::Renamed { from, to } => vec![Event::Renamed { from, to }],
        WatchEvent::DataFileChanged => vec![Event::RegistryChanged(file.load())],
    }
}

fn modified_events(vault: &FsVault, path: String, pinned: bool, active: Option<&str>) -> Vec<Event> {
    let text = match vault.read(&path) {
        Ok(t) => t,
        Err(e) => {
            log::debug!("event=watch_read status=skip note={} error={}", path, e);
            return Vec::new();
        }
    };
    let follow = !pinned && active != Some(path.as_str());
    let mut events = vec![Event::Modified {
        path: path.clone(),
        text,
    }];
    if follow {
        events.push(Event::ViewChanged(Some(path)));
    }
    events
}

/// Handle one event, holding the vault lock only while doing I/O. Errors are
/// logged; the next event retries naturally.
fn run_event(engine: &mut Engine, event: Event, vault: &mut FsVault, file: &mut RegistryFile) {
    let effect = engine.transition(event);
    if effect == Effect::none() {
        return;
    }
    let _lock = match acquire_lock(vault) {
        Ok(lock) => lock,
        Err(e) => {
            log::warn!("event=watch_lock status=busy error={}", e);
            return;
        }
    };
    match engine.apply(effect, vault, file) {
        Ok(Some(report)) => {
            record_retirements(vault, &report);
            if report.writes() > 0 {
                log::info!("event=watch_sync {}", format_sync(&report));
            }
        }
        Ok(None) => {}
        Err(e) => log::error!("event=watch_apply status=error error={}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::registry::{ListRegistry, MemoryRegistry};
    use crate::io::vault_io::MemoryVault;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_vault(root: &std::path::Path) -> (FsVault, RegistryFile) {
        fs::create_dir_all(root.join(".tagflow")).unwrap();
        fs::write(root.join(".tagflow/config.toml"), "").unwrap();
        fs::write(root.join("Proj.md"), "# Proj\n").unwrap();
        let vault = FsVault::open(root).unwrap();
        let file = registry_file(&vault);
        (vault, file)
    }

    #[test]
    fn test_removed_but_present_note_is_modified() {
        let tmp = TempDir::new().unwrap();
        let (vault, file) = create_test_vault(tmp.path());

        // Backup-rename save: Proj.md -> Proj.md~, then a fresh Proj.md
        fs::rename(tmp.path().join("Proj.md"), tmp.path().join("Proj.md~")).unwrap();
        fs::write(tmp.path().join("Proj.md"), "# Proj\nedited\n").unwrap();

        let events = to_events(
            &vault,
            &file,
            WatchEvent::Removed("Proj.md".into()),
            true,
            Some("Proj.md"),
        );
        assert_eq!(
            events,
            vec![Event::Modified {
                path: "Proj.md".into(),
                text: "# Proj\nedited\n".into(),
            }]
        );
    }

    #[test]
    fn test_removed_note_is_deleted() {
        let tmp = TempDir::new().unwrap();
        let (vault, file) = create_test_vault(tmp.path());
        fs::remove_file(tmp.path().join("Proj.md")).unwrap();

        let events = to_events(&vault, &file, WatchEvent::Removed("Proj.md".into()), false, None);
        assert_eq!(events, vec![Event::Deleted("Proj.md".into())]);
    }

    #[test]
    fn test_backup_save_keeps_hosted_lists() {
        let tmp = TempDir::new().unwrap();
        let (vault, file) = create_test_vault(tmp.path());
        fs::rename(tmp.path().join("Proj.md"), tmp.path().join("Proj.md~")).unwrap();
        fs::write(tmp.path().join("Proj.md"), "# Proj\n").unwrap();

        let decl = ListDeclaration::new("#alpha", "Proj.md", 1);
        let mut registry = ListRegistry::default();
        registry.add(decl.clone());
        let mut notes = MemoryVault::with_notes([
            ("Proj.md", "<!--tag-list #alpha 1-->\n<!--end-tag-list #alpha 1-->\n"),
            ("X.md", "#alpha\n"),
        ]);
        let mut engine = Engine::load(&notes, registry, SyncOptions::default()).unwrap();
        let mut lists = MemoryRegistry::default();

        for event in to_events(&vault, &file, WatchEvent::Removed("Proj.md".into()), false, None) {
            engine.handle(event, &mut notes, &mut lists).unwrap();
        }
        assert_eq!(engine.registry.lists, vec![decl]);
        assert_eq!(lists.saved, None);
    }
}
