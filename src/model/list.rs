use serde::{Deserialize, Serialize};

use crate::model::tag::strip_marker;

/// A durable "list for tag X lives in note N" record.
///
/// `id` is the creation time in epoch milliseconds and only serves to tell
/// two lists for the same tag in the same note apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListDeclaration {
    pub tag: String,
    #[serde(rename = "notePath")]
    pub note_path: String,
    pub id: i64,
}

impl ListDeclaration {
    pub fn new(tag: impl Into<String>, note_path: impl Into<String>, id: i64) -> Self {
        ListDeclaration {
            tag: tag.into(),
            note_path: note_path.into(),
            id,
        }
    }

    /// `<!--tag-list #tag id-->`
    pub fn start_anchor(&self) -> String {
        format!("<!--tag-list {} {}-->", self.tag, self.id)
    }

    /// `<!--end-tag-list #tag id-->`
    pub fn end_anchor(&self) -> String {
        format!("<!--end-tag-list {} {}-->", self.tag, self.id)
    }

    /// Label shown in the delete picker.
    pub fn label(&self) -> String {
        format!("{} (ID: {})", self.tag, self.id)
    }

    /// Tag name without its marker.
    pub fn tag_name(&self) -> &str {
        strip_marker(&self.tag)
    }
}
