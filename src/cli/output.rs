use std::collections::BTreeMap;

use serde::Serialize;

use crate::io::recovery::RecoveryEntry;
use crate::model::list::ListDeclaration;
use crate::ops::sync::SyncReport;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ListJson {
    pub tag: String,
    pub note: String,
    pub id: i64,
    pub label: String,
}

#[derive(Serialize)]
pub struct IndexEntryJson {
    pub note: String,
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct SyncJson {
    pub note: String,
    pub written: Vec<ListJson>,
    pub unchanged: usize,
    pub missing_anchor: usize,
    pub retired: Vec<ListJson>,
}

#[derive(Serialize)]
pub struct CreatedJson {
    pub list: ListJson,
    pub sync: SyncJson,
}

#[derive(Serialize)]
pub struct DeletedJson {
    pub list: ListJson,
    pub note_written: bool,
}

#[derive(Serialize)]
pub struct RecoveryEntryJson {
    pub timestamp: String,
    pub category: String,
    pub description: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn list_to_json(decl: &ListDeclaration) -> ListJson {
    ListJson {
        tag: decl.tag.clone(),
        note: decl.note_path.clone(),
        id: decl.id,
        label: decl.label(),
    }
}

pub fn sync_to_json(report: &SyncReport) -> SyncJson {
    SyncJson {
        note: report.note.clone(),
        written: report.written.iter().map(list_to_json).collect(),
        unchanged: report.unchanged,
        missing_anchor: report.missing_anchor,
        retired: report.retired.iter().map(|r| list_to_json(&r.decl)).collect(),
    }
}

pub fn recovery_to_json(entry: &RecoveryEntry) -> RecoveryEntryJson {
    RecoveryEntryJson {
        timestamp: entry
            .timestamp
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        category: entry.category.to_string(),
        description: entry.description.clone(),
        fields: entry.fields.iter().cloned().collect(),
        body: entry.body.clone(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

/// One line summarizing a sync pass.
pub fn format_sync(report: &SyncReport) -> String {
    let mut parts = Vec::new();
    if !report.written.is_empty() {
        parts.push(format!("{} updated", report.written.len()));
    }
    if report.unchanged > 0 {
        parts.push(format!("{} unchanged", report.unchanged));
    }
    if !report.retired.is_empty() {
        parts.push(format!("{} retired", report.retired.len()));
    }
    if report.missing_anchor > 0 {
        parts.push(format!("{} missing anchor", report.missing_anchor));
    }
    if parts.is_empty() {
        format!("{}: no lists", report.note)
    } else {
        format!("{}: {}", report.note, parts.join(", "))
    }
}
