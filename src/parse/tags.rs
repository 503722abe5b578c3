use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::model::tag::{TagSet, normalize_tag};

static START_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--tag-list ([^>]+?) (\d+)-->").expect("start anchor pattern"));

static END_ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--end-tag-list [^>]+? \d+-->").expect("end anchor pattern"));

static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#[A-Za-z0-9_-]+").expect("inline tag pattern"));

static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A---\r?\n((?s:.*?))\r?\n---(?:\r?\n|\z)").expect("frontmatter pattern")
});

/// Extract the effective tag set of a note.
///
/// Generated list regions are removed first so a list never tags its own
/// host note. Inline `#tokens` come first, then front-matter `tags`, with
/// duplicates dropped.
pub fn extract_tags(text: &str) -> TagSet {
    let cleaned = strip_generated(text);
    let mut tags: TagSet = INLINE_TAG_RE
        .find_iter(&cleaned)
        .map(|m| m.as_str().to_string())
        .collect();
    for tag in frontmatter_tags(&cleaned) {
        tags.insert(tag);
    }
    tags
}

/// Remove every generated region (start anchor through its own end anchor).
///
/// A start anchor whose end anchor never got written is removed on its own,
/// as is any stray end anchor: anchor text embeds the tag and must not be
/// read back as an inline tag.
pub fn strip_generated(text: &str) -> Cow<'_, str> {
    if !text.contains("tag-list ") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while let Some(caps) = START_ANCHOR_RE.captures_at(text, pos) {
        let whole = caps.get(0).map_or(pos..pos, |m| m.range());
        out.push_str(&text[pos..whole.start]);
        let end_anchor = format!("<!--end-tag-list {} {}-->", &caps[1], &caps[2]);
        pos = match text[whole.end..].find(&end_anchor) {
            Some(rel) => whole.end + rel + end_anchor.len(),
            None => whole.end,
        };
    }
    out.push_str(&text[pos..]);

    if END_ANCHOR_RE.is_match(&out) {
        out = END_ANCHOR_RE.replace_all(&out, "").into_owned();
    }
    Cow::Owned(out)
}

/// Raw front-matter body, if the text opens with a `---` block.
pub fn frontmatter_block(text: &str) -> Option<&str> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    FRONTMATTER_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Tags declared in the front-matter `tags` field.
///
/// Accepts a comma-separated string or a list of scalars. Anything else,
/// including YAML that fails to parse, contributes nothing.
pub fn frontmatter_tags(text: &str) -> Vec<String> {
    let Some(block) = frontmatter_block(text) else {
        return Vec::new();
    };

    let doc: serde_yaml::Value = match serde_yaml::from_str(block) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("event=frontmatter_parse status=error error={}", e);
            return Vec::new();
        }
    };

    match doc.get("tags") {
        Some(serde_yaml::Value::String(s)) => s.split(',').filter_map(normalize_tag).collect(),
        Some(serde_yaml::Value::Sequence(items)) => items
            .iter()
            .filter_map(scalar_to_string)
            .filter_map(|s| normalize_tag(&s))
            .collect(),
        Some(serde_yaml::Value::Null) | None => Vec::new(),
        Some(_) => {
            log::debug!("event=frontmatter_tags status=skipped reason=unsupported_shape");
            Vec::new()
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(text: &str) -> Vec<String> {
        extract_tags(text).into_iter().collect()
    }

    #[test]
    fn inline_tags() {
        assert_eq!(
            tags("Working on #alpha and #beta_2 today, also #re-do."),
            vec!["#alpha", "#beta_2", "#re-do"]
        );
    }

    #[test]
    fn inline_tags_deduplicated() {
        assert_eq!(tags("#a #b #a"), vec!["#a", "#b"]);
    }

    #[test]
    fn inline_tag_is_case_preserving() {
        assert_eq!(tags("#Alpha #alpha"), vec!["#Alpha", "#alpha"]);
    }

    #[test]
    fn no_tags() {
        assert!(extract_tags("plain text, no markers").is_empty());
        assert!(extract_tags("").is_empty());
    }

    #[test]
    fn region_contents_are_excluded() {
        let text = "\
Intro #outside
<!--tag-list #alpha 1700000000000-->
- [[X]] #inside
<!--end-tag-list #alpha 1700000000000-->
Outro #after
";
        assert_eq!(tags(text), vec!["#outside", "#after"]);
    }

    #[test]
    fn anchor_tag_itself_is_not_a_tag() {
        let text = "<!--tag-list #alpha 1-->\n<!--end-tag-list #alpha 1-->\n";
        assert!(extract_tags(text).is_empty());
    }

    #[test]
    fn region_for_tag_with_space_is_excluded() {
        // Tags taken from a note title can contain spaces; the tag runs up
        // to the last space before the id.
        let text = "\
<!--tag-list #My Note 1700000000000-->
- [[X]] #inside
<!--end-tag-list #My Note 1700000000000-->
#after
";
        assert_eq!(tags(text), vec!["#after"]);
    }

    #[test]
    fn stray_anchors_with_space_are_not_tags() {
        let text = "<!--tag-list #My Note 1-->\n<!--end-tag-list #Other Tag 2-->\n";
        assert!(extract_tags(text).is_empty());
    }

    #[test]
    fn unterminated_start_anchor_is_ignored() {
        let text = "<!--tag-list #alpha 1-->\n- [[X]] #kept\n";
        assert_eq!(tags(text), vec!["#kept"]);
    }

    #[test]
    fn multiple_regions_stripped_independently() {
        let text = "\
<!--tag-list #a 1-->
#one
<!--end-tag-list #a 1-->
#between
<!--tag-list #b 2-->
#two
<!--end-tag-list #b 2-->
";
        assert_eq!(tags(text), vec!["#between"]);
    }

    #[test]
    fn region_is_matched_by_its_own_end_anchor() {
        // The #a region must not end at the #b end anchor.
        let text = "\
<!--tag-list #a 1-->
#hidden
<!--end-tag-list #b 2-->
#still-hidden
<!--end-tag-list #a 1-->
#visible
";
        assert_eq!(tags(text), vec!["#visible"]);
    }

    #[test]
    fn frontmatter_string_tags() {
        let text = "---\ntags: \"b, c , ,d\"\n---\nBody #a\n";
        assert_eq!(tags(text), vec!["#a", "#b", "#c", "#d"]);
    }

    #[test]
    fn frontmatter_list_tags() {
        let text = "---\ntags: [alpha, beta, 2024, \" \"]\n---\n";
        assert_eq!(tags(text), vec!["#alpha", "#beta", "#2024"]);
    }

    #[test]
    fn frontmatter_block_list_tags() {
        let text = "---\ntitle: Proj\ntags:\n  - alpha\n  - beta\n---\n# Proj\n";
        assert_eq!(tags(text), vec!["#alpha", "#beta"]);
    }

    #[test]
    fn frontmatter_and_inline_are_additive() {
        let text = "---\ntags: \"b\"\n---\nSome #a text\n";
        let set = extract_tags(text);
        assert_eq!(set.len(), 2);
        assert!(set.contains("#a"));
        assert!(set.contains("#b"));
    }

    #[test]
    fn frontmatter_unsupported_shape_contributes_nothing() {
        let text = "---\ntags:\n  nested: true\n---\n#a\n";
        assert_eq!(tags(text), vec!["#a"]);
    }

    #[test]
    fn malformed_frontmatter_falls_back_to_inline() {
        let text = "---\ntags: [unclosed\n  : : :\n---\n#a\n";
        assert_eq!(tags(text), vec!["#a"]);
    }

    #[test]
    fn frontmatter_must_open_the_note() {
        let text = "Intro\n---\ntags: x\n---\n";
        assert!(extract_tags(text).is_empty());
    }

    #[test]
    fn frontmatter_without_tags_field() {
        let text = "---\ntitle: hello\n---\nbody\n";
        assert!(extract_tags(text).is_empty());
    }

    #[test]
    fn frontmatter_crlf() {
        let text = "---\r\ntags: x, y\r\n---\r\nbody\r\n";
        assert_eq!(tags(text), vec!["#x", "#y"]);
    }

    #[test]
    fn frontmatter_tag_with_marker_is_not_doubled() {
        let text = "---\ntags: [\"#x\"]\n---\n";
        assert_eq!(tags(text), vec!["#x"]);
    }

    #[test]
    fn strip_generated_borrows_when_untouched() {
        assert!(matches!(strip_generated("no anchors"), Cow::Borrowed(_)));
    }

    #[test]
    fn strip_generated_keeps_surrounding_text() {
        let text = "before\n<!--tag-list #a 1-->\nx\n<!--end-tag-list #a 1-->\nafter";
        assert_eq!(strip_generated(text), "before\n\nafter");
    }
}
