use indexmap::IndexSet;

/// Marker character every stored tag starts with.
pub const TAG_MARKER: char = '#';

/// The tags carried by one note, in first-seen order, without duplicates.
pub type TagSet = IndexSet<String>;

/// Normalize user input (`alpha` or `#alpha`) into a stored tag (`#alpha`).
/// Surrounding whitespace is trimmed. Returns None for an empty tag.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let name = strip_marker(raw.trim()).trim();
    if name.is_empty() {
        None
    } else {
        Some(format!("{}{}", TAG_MARKER, name))
    }
}

/// Drop one leading marker, if present.
pub fn strip_marker(tag: &str) -> &str {
    tag.strip_prefix(TAG_MARKER).unwrap_or(tag)
}
