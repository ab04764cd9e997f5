//! Post-conversion cleanup pipeline for Markdown output.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! The pipeline restores protected fragments, then normalizes blank lines,
//! code fences, leftover layout tags, line breaks and whitespace.

use std::sync::LazyLock;

use regex::Regex;

use crate::Placeholders;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str, placeholders: &Placeholders) -> String {
    let mut result = placeholders.restore(md);

    result = clean_blank_lines(&result);
    result = fix_code_block_languages(&result);
    result = strip_leftover_html(&result);
    result = backslash_line_breaks(&result);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

// ---------------------------------------------------------------------------
// Pass 1: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2.
fn clean_blank_lines(md: &str) -> String {
    static MULTI_BLANK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{4,}").expect("valid regex"));

    MULTI_BLANK_RE.replace_all(md, "\n\n\n").to_string()
}

// ---------------------------------------------------------------------------
// Pass 2: Fix code block language hints
// ---------------------------------------------------------------------------

/// Strip class-style prefixes (`language-`, `lang-`, `highlight-`) from fences.
fn fix_code_block_languages(md: &str) -> String {
    static LANG_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^```(?:language-|lang-|highlight-)(\w+)").expect("valid regex")
    });

    LANG_PREFIX_RE.replace_all(md, "```$1").to_string()
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML layout tags
// ---------------------------------------------------------------------------

/// Remove layout tags that survived the conversion, keeping their text.
/// Code blocks are left untouched.
fn strip_leftover_html(md: &str) -> String {
    let mut result = String::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            result.push_str(line);
            result.push('\n');
            continue;
        }

        if in_code_block {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        result.push_str(&strip_html_tags(line));
        result.push('\n');
    }

    if result.ends_with('\n') {
        result.pop();
    }

    result
}

/// Strip layout tags from a single line, preserving inner text.
fn strip_html_tags(line: &str) -> String {
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r"</?(?:div|span|section|article|aside|header|footer|figure|figcaption|details|summary|font|center)(?:\s[^>]*)?>",
        )
        .expect("valid regex")
    });

    HTML_TAG_RE.replace_all(line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Hard line breaks
// ---------------------------------------------------------------------------

/// Rewrite two-space hard breaks as a trailing backslash so they survive
/// trailing-whitespace trimming.
fn backslash_line_breaks(md: &str) -> String {
    let mut result = String::new();
    let mut in_code_block = false;

    for line in md.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
        }

        if !in_code_block && line.ends_with("  ") && !line.trim().is_empty() {
            result.push_str(line.trim_end());
            result.push('\\');
        } else {
            result.push_str(line);
        }
        result.push('\n');
    }

    if result.ends_with('\n') && !md.ends_with('\n') {
        result.pop();
    }

    result
}

// ---------------------------------------------------------------------------
// Pass 5: Normalize whitespace
// ---------------------------------------------------------------------------

/// Clean up trailing whitespace on lines and normalize line endings.
fn normalize_whitespace(md: &str) -> String {
    md.lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Pass 6: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the file ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
