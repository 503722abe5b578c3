use crate::model::list::ListDeclaration;

/// Byte offsets of a declaration's anchors inside a note.
///
/// `end` is only reported when it follows the start anchor; an end anchor
/// sitting before its start anchor is treated as missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionBounds {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl RegionBounds {
    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }
}

/// Locate the anchor pair for `decl` by literal search.
pub fn locate(text: &str, decl: &ListDeclaration) -> RegionBounds {
    let start_anchor = decl.start_anchor();
    let end_anchor = decl.end_anchor();

    let start = text.find(&start_anchor);
    let end = match start {
        Some(s) => {
            let after = s + start_anchor.len();
            text[after..].find(&end_anchor).map(|rel| after + rel)
        }
        None => None,
    };
    RegionBounds { start, end }
}

/// The list body currently between the anchors.
///
/// The single newline that `write_region` places after the start anchor and
/// before the end anchor is not part of the body, so a freshly written region
/// reads back exactly the body it was written with.
pub fn current_body<'a>(
    text: &'a str,
    decl: &ListDeclaration,
    bounds: RegionBounds,
) -> Option<&'a str> {
    let (start, end) = (bounds.start?, bounds.end?);
    let inner = &text[start + decl.start_anchor().len()..end];
    let inner = inner.strip_prefix('\n').unwrap_or(inner);
    Some(inner.strip_suffix('\n').unwrap_or(inner))
}

/// Render `body` into the region, returning the new note text.
///
/// - both anchors: replace everything between them
/// - start anchor only: rebuild the pair in place of the lone start anchor
/// - empty body: same as `remove_region`
///
/// Returns None when the start anchor is missing, since there is nowhere to
/// put the list.
pub fn write_region(
    text: &str,
    decl: &ListDeclaration,
    bounds: RegionBounds,
    body: &str,
) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return remove_region(text, decl, bounds);
    }

    let start = bounds.start?;
    let start_anchor = decl.start_anchor();
    let end_anchor = decl.end_anchor();
    let tail_from = match bounds.end {
        Some(end) => end + end_anchor.len(),
        None => start + start_anchor.len(),
    };

    let mut out = String::with_capacity(text.len() + body.len() + end_anchor.len() + 2);
    out.push_str(&text[..start]);
    out.push_str(&start_anchor);
    out.push('\n');
    out.push_str(body);
    out.push('\n');
    out.push_str(&end_anchor);
    out.push_str(&text[tail_from..]);
    Some(out)
}

/// Remove the region for `decl`, anchors included.
///
/// Without an end anchor only the start anchor's line is removed. Returns
/// None when the start anchor is missing.
pub fn remove_region(text: &str, decl: &ListDeclaration, bounds: RegionBounds) -> Option<String> {
    let start = bounds.start?;
    let tail_from = match bounds.end {
        Some(end) => end + decl.end_anchor().len(),
        None => text[start..]
            .find('\n')
            .map_or(text.len(), |rel| start + rel + 1),
    };

    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..start]);
    out.push_str(&text[tail_from..]);
    Some(out)
}

/// The empty anchor pair inserted when a list is created.
pub fn empty_region(decl: &ListDeclaration) -> String {
    format!("{}\n{}\n", decl.start_anchor(), decl.end_anchor())
}

/// Insert `snippet` before 1-based `line`, or append it when `line` is None
/// or past the end. Appending to text without a trailing newline adds one.
pub fn insert_at_line(text: &str, line: Option<usize>, snippet: &str) -> String {
    let offset = match line {
        Some(n) if n > 1 => {
            let mut seen = 1;
            let mut at = None;
            for (i, b) in text.bytes().enumerate() {
                if b == b'\n' {
                    seen += 1;
                    if seen == n {
                        at = Some(i + 1);
                        break;
                    }
                }
            }
            at
        }
        Some(_) => Some(0),
        None => None,
    };

    let mut out = String::with_capacity(text.len() + snippet.len() + 1);
    match offset {
        Some(at) => {
            out.push_str(&text[..at]);
            out.push_str(snippet);
            out.push_str(&text[at..]);
        }
        _ => {
            out.push_str(text);
            if !text.is_empty() && !text.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(snippet);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decl() -> ListDeclaration {
        ListDeclaration::new("#alpha", "Proj.md", 1700000000000)
    }

    const EMPTY_REGION: &str = "\
# Proj

<!--tag-list #alpha 1700000000000-->
<!--end-tag-list #alpha 1700000000000-->
Footer
";

    #[test]
    fn locate_both_anchors() {
        let b = locate(EMPTY_REGION, &decl());
        assert_eq!(b.start, Some(8));
        assert!(b.is_complete());
        assert_eq!(
            &EMPTY_REGION[b.end.unwrap()..b.end.unwrap() + 5],
            "<!--e"
        );
    }

    #[test]
    fn locate_missing() {
        let b = locate("no anchors here", &decl());
        assert_eq!(b, RegionBounds { start: None, end: None });
    }

    #[test]
    fn locate_ignores_other_ids() {
        let text = "<!--tag-list #alpha 1-->\n<!--end-tag-list #alpha 1-->\n";
        let b = locate(text, &decl());
        assert_eq!(b.start, None);
    }

    #[test]
    fn locate_end_before_start_is_missing() {
        let text = "<!--end-tag-list #alpha 1700000000000-->\n<!--tag-list #alpha 1700000000000-->\n";
        let b = locate(text, &decl());
        assert!(b.start.is_some());
        assert_eq!(b.end, None);
    }

    #[test]
    fn empty_region_has_empty_body() {
        let b = locate(EMPTY_REGION, &decl());
        assert_eq!(current_body(EMPTY_REGION, &decl(), b), Some(""));
    }

    #[test]
    fn write_then_read_back_with_both_anchors() {
        let d = decl();
        let body = "- [[X]]\n- [[Y]]";
        let out = write_region(EMPTY_REGION, &d, locate(EMPTY_REGION, &d), body).unwrap();
        assert_eq!(
            out,
            "\
# Proj

<!--tag-list #alpha 1700000000000-->
- [[X]]
- [[Y]]
<!--end-tag-list #alpha 1700000000000-->
Footer
"
        );
        assert_eq!(current_body(&out, &d, locate(&out, &d)), Some(body));
    }

    #[test]
    fn rewrite_replaces_old_body() {
        let d = decl();
        let first = write_region(EMPTY_REGION, &d, locate(EMPTY_REGION, &d), "- [[X]]").unwrap();
        let second = write_region(&first, &d, locate(&first, &d), "- [[Y]]").unwrap();
        assert_eq!(current_body(&second, &d, locate(&second, &d)), Some("- [[Y]]"));
        assert!(!second.contains("[[X]]"));
        assert!(second.ends_with("Footer\n"));
    }

    #[test]
    fn write_repairs_missing_end_anchor() {
        let d = decl();
        let text = "Top\n<!--tag-list #alpha 1700000000000-->\nBottom\n";
        let out = write_region(text, &d, locate(text, &d), "- [[X]]").unwrap();
        assert_eq!(
            out,
            "Top\n<!--tag-list #alpha 1700000000000-->\n- [[X]]\n<!--end-tag-list #alpha 1700000000000-->\nBottom\n"
        );
        assert_eq!(current_body(&out, &d, locate(&out, &d)), Some("- [[X]]"));
    }

    #[test]
    fn write_without_start_anchor_is_none() {
        let d = decl();
        assert_eq!(write_region("nothing", &d, locate("nothing", &d), "- [[X]]"), None);
    }

    #[test]
    fn write_empty_body_removes_region() {
        let d = decl();
        let out = write_region(EMPTY_REGION, &d, locate(EMPTY_REGION, &d), "").unwrap();
        assert_eq!(out, "# Proj\n\n\nFooter\n");
    }

    #[test]
    fn remove_full_region() {
        let d = decl();
        let text = "a\n<!--tag-list #alpha 1700000000000-->\n- [[X]]\n<!--end-tag-list #alpha 1700000000000-->\nb\n";
        let out = remove_region(text, &d, locate(text, &d)).unwrap();
        assert_eq!(out, "a\n\nb\n");
    }

    #[test]
    fn remove_start_only_drops_its_line() {
        let d = decl();
        let text = "a\n<!--tag-list #alpha 1700000000000--> trailing\n- [[X]]\n";
        let out = remove_region(text, &d, locate(text, &d)).unwrap();
        assert_eq!(out, "a\n- [[X]]\n");
    }

    #[test]
    fn remove_start_only_on_last_line() {
        let d = decl();
        let text = "a\n<!--tag-list #alpha 1700000000000-->";
        let out = remove_region(text, &d, locate(text, &d)).unwrap();
        assert_eq!(out, "a\n");
    }

    #[test]
    fn remove_missing_is_none() {
        let d = decl();
        assert_eq!(remove_region("x", &d, locate("x", &d)), None);
    }

    #[test]
    fn regions_do_not_interfere() {
        let a = ListDeclaration::new("#a", "N.md", 1);
        let b = ListDeclaration::new("#b", "N.md", 2);
        let text = format!("{}mid\n{}", empty_region(&a), empty_region(&b));
        let out = write_region(&text, &a, locate(&text, &a), "- [[X]]").unwrap();
        let out = write_region(&out, &b, locate(&out, &b), "- [[Y]]").unwrap();
        assert_eq!(current_body(&out, &a, locate(&out, &a)), Some("- [[X]]"));
        assert_eq!(current_body(&out, &b, locate(&out, &b)), Some("- [[Y]]"));
        assert!(out.contains("\nmid\n"));
    }

    #[test]
    fn empty_region_snippet() {
        let d = ListDeclaration::new("#t", "N.md", 5);
        assert_eq!(empty_region(&d), "<!--tag-list #t 5-->\n<!--end-tag-list #t 5-->\n");
        insta::assert_snapshot!(d.end_anchor(), @"<!--end-tag-list #t 5-->");
    }

    #[test]
    fn insert_appends_by_default() {
        assert_eq!(insert_at_line("a\nb", None, "X\n"), "a\nb\nX\n");
        assert_eq!(insert_at_line("a\n", None, "X\n"), "a\nX\n");
        assert_eq!(insert_at_line("", None, "X\n"), "X\n");
    }

    #[test]
    fn insert_before_line() {
        assert_eq!(insert_at_line("a\nb\nc\n", Some(2), "X\n"), "a\nX\nb\nc\n");
        assert_eq!(insert_at_line("a\nb\n", Some(1), "X\n"), "X\na\nb\n");
    }

    #[test]
    fn insert_past_end_appends() {
        assert_eq!(insert_at_line("a\nb\n", Some(3), "X\n"), "a\nb\nX\n");
        assert_eq!(insert_at_line("a\nb\n", Some(10), "X\n"), "a\nb\nX\n");
    }
}
