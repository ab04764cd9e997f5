//! Filesystem-safe naming for output segments.

use std::sync::LazyLock;

use regex::Regex;

/// Characters never allowed in an output segment.
pub const RESERVED_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|', '\''];

static LINE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n\t]+").expect("line break regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Matches a leading `3.` / `3.2.` style numbering.
static NUMBERING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.)+").expect("numbering regex"));

/// Normalize a vendor title into something every filesystem accepts.
pub fn sanitize(title: &str) -> String {
    let flattened = LINE_BREAK_RE.replace_all(title, " ");
    let replaced: String = flattened
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let collapsed = WHITESPACE_RE.replace_all(&replaced, " ");
    collapsed.trim().trim_end_matches('.').to_string()
}

/// Whether a title already carries its own hierarchical numbering.
pub fn has_existing_numbering(text: &str) -> bool {
    NUMBERING_RE.is_match(text)
}

/// Output segment name for a node: the sanitized title, prefixed with the
/// discovery index unless the title is numbered already.
pub fn name_for(title: &str, index: u32) -> String {
    let safe = sanitize(title);
    if has_existing_numbering(&safe) {
        safe
    } else {
        format!("{index}-{safe}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_reserved_characters() {
        assert_eq!(sanitize(r#"a\b/c*d?e:f"g<h>i|j"#), "a_b_c_d_e_f_g_h_i_j");
    }

    #[test]
    fn sanitize_collapses_breaks_and_spaces() {
        assert_eq!(sanitize("  Element\r\n\tLibrary   Guide "), "Element Library Guide");
    }

    #[test]
    fn sanitize_strips_trailing_periods() {
        assert_eq!(sanitize("Introduction..."), "Introduction");
        assert_eq!(sanitize("v1.2 notes. "), "v1.2 notes");
    }

    #[test]
    fn sanitize_never_leaves_reserved_characters() {
        let nasty = "What's <new>? \"Quoted\" a/b\\c *|:";
        let out = sanitize(nasty);
        assert!(!out.contains(RESERVED_CHARS), "got {out}");
    }

    #[test]
    fn name_for_prefixes_index() {
        assert_eq!(name_for("What's New?", 4), "4-What_s New_");
        assert_eq!(name_for("Overview", 1), "1-Overview");
    }

    #[test]
    fn name_for_keeps_existing_numbering() {
        assert_eq!(name_for("3.2 Overview", 7), "3.2 Overview");
        assert_eq!(name_for("12. Contact", 2), "12. Contact");
    }

    #[test]
    fn numbering_requires_dotted_groups() {
        assert!(has_existing_numbering("1.4.2 Loads"));
        assert!(!has_existing_numbering("2024 Release"));
        assert!(!has_existing_numbering("Chapter 3."));
    }
}
