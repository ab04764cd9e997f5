//! HTML-to-Markdown content conversion for vendor documentation pages.
//!
//! Converts a single source document to Markdown using the `htmd` crate:
//! the vendor's content region is extracted, chrome is stripped, hyperlinks
//! are unwrapped, images are relocated next to the output (or recognized as
//! lost formulas), and a series of cleanup passes normalizes the result.

mod cleanup;

use std::fs;
use std::path::{Path, PathBuf};

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

use docbuilder_shared::{DocBuilderError, Result};

/// Noise stripped from every document regardless of profile.
const BASE_NOISE: [&str; 4] = ["script", "style", ".navheader", ".navfooter"];

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where a vendor's generated HTML keeps its body, and what to throw away.
#[derive(Debug, Clone)]
pub struct ContentProfile {
    /// Candidate content containers, tried in order before falling back to `<body>`.
    pub content_selectors: Vec<String>,
    /// Extra chrome removed from the content region.
    pub noise_selectors: Vec<String>,
    /// Prepend the document's first `<h1>` when the content region has none.
    pub lift_title: bool,
}

impl ContentProfile {
    /// No vendor knowledge: `<body>` only.
    pub fn generic() -> Self {
        Self {
            content_selectors: Vec::new(),
            noise_selectors: Vec::new(),
            lift_title: false,
        }
    }

    /// Sphinx-generated pages (ANSA).
    pub fn sphinx() -> Self {
        Self {
            content_selectors: vec![r#"div[role="main"]"#.into(), ".body".into()],
            noise_selectors: vec![
                "div.sphinxsidebar".into(),
                "footer".into(),
                "a.headerlink".into(),
            ],
            lift_title: false,
        }
    }

    /// DITA-generated pages (Abaqus).
    pub fn dita() -> Self {
        Self {
            content_selectors: vec!["div.conbody".into(), "div.body".into()],
            noise_selectors: Vec::new(),
            lift_title: true,
        }
    }

    /// DocBook-generated pages (Ansys).
    pub fn docbook() -> Self {
        Self {
            content_selectors: vec!["div.section".into(), "div.chapter".into(), "div.sect1".into()],
            noise_selectors: Vec::new(),
            lift_title: false,
        }
    }

    /// Append extra noise selectors (e.g. from user config).
    pub fn with_noise(mut self, extra: &[String]) -> Self {
        self.noise_selectors.extend(extra.iter().cloned());
        self
    }
}

impl Default for ContentProfile {
    fn default() -> Self {
        Self::generic()
    }
}

/// Heuristic for images that stand in for formulas.
///
/// Vendor HTML often renders equations as images whose alt text holds the
/// source expression. An alt text containing any of the operators is taken
/// to be such an expression and emitted as inline `$...$`. This has known
/// false positives and negatives and is not verified against ground truth.
#[derive(Debug, Clone)]
pub struct FormulaHeuristic {
    operators: Vec<String>,
}

impl FormulaHeuristic {
    pub fn new(operators: Vec<String>) -> Self {
        Self { operators }
    }

    /// Never treat an image as a formula.
    pub fn disabled() -> Self {
        Self::new(Vec::new())
    }

    /// Whether `text` looks like a formula.
    pub fn matches(&self, text: &str) -> bool {
        !text.is_empty()
            && self
                .operators
                .iter()
                .any(|op| !op.is_empty() && text.contains(op.as_str()))
    }
}

impl Default for FormulaHeuristic {
    fn default() -> Self {
        Self::new(vec!["=".into(), "\\".into(), "+".into()])
    }
}

/// Options for the HTML-to-Markdown conversion.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub profile: ContentProfile,
    pub formula: FormulaHeuristic,
}

/// Result of converting one document.
#[derive(Debug, Clone, Default)]
pub struct ConvertResult {
    /// Final Markdown; empty when the document had no content.
    pub markdown: String,
    /// Title lifted from the document, if the profile asked for one.
    pub title: Option<String>,
    /// Number of images rewritten as inline formulas.
    pub formulas: usize,
    /// Asset files referenced by the output (copied now or already present).
    pub assets: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Read a source document from disk and convert it.
///
/// Relative image references resolve against the document's directory and
/// are copied into `assets_dir` when one is given.
#[instrument(skip(opts), fields(source = %source.display()))]
pub fn convert_file(
    source: &Path,
    assets_dir: Option<&Path>,
    opts: &ConvertOptions,
) -> Result<ConvertResult> {
    let bytes = fs::read(source).map_err(|e| DocBuilderError::io(source, e))?;
    let html = String::from_utf8_lossy(&bytes);
    convert_html(&html, source.parent(), assets_dir, opts)
}

/// Convert an HTML document to Markdown.
///
/// 1. Locates the content region via the profile's selectors
/// 2. Strips noise elements and unwraps hyperlinks
/// 3. Rewrites images (formula placeholder or relocated asset)
/// 4. Protects tables as pre-rendered Markdown
/// 5. Converts HTML → Markdown via `htmd` and runs the cleanup pipeline
pub fn convert_html(
    html: &str,
    base_dir: Option<&Path>,
    assets_dir: Option<&Path>,
    opts: &ConvertOptions,
) -> Result<ConvertResult> {
    let doc = Html::parse_document(html);
    let region = select_content_region(&doc, &opts.profile);
    let region_html = region
        .map(|el| el.inner_html())
        .unwrap_or_else(|| html.to_string());

    let title = if opts.profile.lift_title {
        lifted_title(&doc, region)
    } else {
        None
    };

    let mut noise: Vec<&str> = BASE_NOISE.to_vec();
    noise.extend(opts.profile.noise_selectors.iter().map(String::as_str));
    let content_html = strip_noise(&region_html, &noise);
    let content_html = unwrap_links(&content_html);

    let mut placeholders = Placeholders::default();
    let images = rewrite_images(
        &content_html,
        base_dir,
        assets_dir,
        &opts.formula,
        &mut placeholders,
    );
    let content_html = preprocess_tables(&images.html, &mut placeholders);

    let converter = htmd::HtmlToMarkdown::builder()
        .skip_tags(vec!["script", "style", "nav", "iframe", "noscript", "svg"])
        .build();

    let raw_markdown = converter
        .convert(&content_html)
        .map_err(|e| DocBuilderError::Conversion(format!("htmd conversion failed: {e}")))?;

    debug!(raw_len = raw_markdown.len(), "htmd conversion complete");

    let body = cleanup::run_pipeline(&raw_markdown, &placeholders);
    let markdown = match &title {
        Some(t) if !body.trim().is_empty() => format!("# {t}\n\n{body}"),
        Some(t) => format!("# {t}\n"),
        None if body.trim().is_empty() => String::new(),
        None => body,
    };

    debug!(
        final_len = markdown.len(),
        formulas = images.formulas,
        assets = images.assets.len(),
        "conversion complete"
    );

    Ok(ConvertResult {
        markdown,
        title,
        formulas: images.formulas,
        assets: images.assets,
    })
}

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// Fragments that must reach the final Markdown byte-for-byte.
///
/// They are swapped for plain alphanumeric tokens before `htmd` runs (so
/// nothing gets escaped or re-wrapped) and restored during cleanup.
#[derive(Debug, Default)]
pub(crate) struct Placeholders {
    values: Vec<String>,
}

impl Placeholders {
    /// Store `value` and return the token that stands in for it.
    pub(crate) fn insert(&mut self, value: String) -> String {
        let token = Self::token(self.values.len());
        self.values.push(value);
        token
    }

    pub(crate) fn restore(&self, text: &str) -> String {
        let mut out = text.to_string();
        // Reverse order so `slot1end` is never mistaken for a prefix of `slot11end`.
        for (i, value) in self.values.iter().enumerate().rev() {
            out = out.replace(&Self::token(i), value);
        }
        out
    }

    fn token(i: usize) -> String {
        format!("docbuilderslot{i}end")
    }
}

// ---------------------------------------------------------------------------
// Content region
// ---------------------------------------------------------------------------

/// Pick the first matching content container, falling back to `<body>`.
fn select_content_region<'a>(doc: &'a Html, profile: &ContentProfile) -> Option<ElementRef<'a>> {
    for sel_str in &profile.content_selectors {
        match Selector::parse(sel_str) {
            Ok(selector) => {
                if let Some(el) = doc.select(&selector).next() {
                    return Some(el);
                }
            }
            Err(e) => warn!(selector = %sel_str, error = ?e, "invalid content selector"),
        }
    }

    let body_sel = Selector::parse("body").ok()?;
    doc.select(&body_sel).next()
}

/// The document's first `<h1>`, unless the content region already has one.
fn lifted_title(doc: &Html, region: Option<ElementRef<'_>>) -> Option<String> {
    let h1_sel = Selector::parse("h1").ok()?;
    if region.is_some_and(|el| el.select(&h1_sel).next().is_some()) {
        return None;
    }
    doc.select(&h1_sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
}

// ---------------------------------------------------------------------------
// HTML rewriting passes
// ---------------------------------------------------------------------------

/// Remove every element matching any of `selectors`.
fn strip_noise(html: &str, selectors: &[&str]) -> String {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().inner_html();

    for sel_str in selectors {
        let Ok(selector) = Selector::parse(sel_str) else {
            warn!(selector = %sel_str, "invalid noise selector, ignoring");
            continue;
        };
        for el in fragment.select(&selector) {
            result = result.replacen(&el.html(), "", 1);
        }
    }

    result
}

/// Replace each `<a>` with its contents: link text stays, the target goes.
fn unwrap_links(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().inner_html();

    let Ok(a_sel) = Selector::parse("a") else {
        return result;
    };
    for el in fragment.select(&a_sel) {
        result = result.replacen(&el.html(), &el.inner_html(), 1);
    }

    result
}

/// Output of the image pass.
struct ImageRewrite {
    html: String,
    formulas: usize,
    assets: Vec<PathBuf>,
}

/// Turn formula images into placeholders and relocate local images.
fn rewrite_images(
    html: &str,
    base_dir: Option<&Path>,
    assets_dir: Option<&Path>,
    formula: &FormulaHeuristic,
    placeholders: &mut Placeholders,
) -> ImageRewrite {
    let fragment = Html::parse_fragment(html);
    let mut result = fragment.root_element().inner_html();
    let mut formulas = 0;
    let mut assets = Vec::new();

    let Ok(img_sel) = Selector::parse("img, svg") else {
        return ImageRewrite {
            html: result,
            formulas,
            assets,
        };
    };

    for el in fragment.select(&img_sel) {
        let alt = accessible_text(&el);

        if formula.matches(&alt) {
            let token = placeholders.insert(format!("${alt}$"));
            result = result.replacen(&el.html(), &format!(" {token} "), 1);
            formulas += 1;
            continue;
        }

        let (Some(assets_dir), Some(src)) = (assets_dir, el.value().attr("src")) else {
            continue;
        };
        if !is_local_reference(src) {
            continue;
        }

        let rel = strip_query(src);
        let resolved = match base_dir {
            Some(dir) => dir.join(rel),
            None => PathBuf::from(rel),
        };
        if !resolved.is_file() {
            debug!(src, path = %resolved.display(), "image not found, leaving reference");
            continue;
        }

        match relocate_asset(&resolved, assets_dir) {
            Ok(dest) => {
                let file_name = dest
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let dir_name = assets_dir
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "assets".into());
                let tag = format!(
                    r#"<img src="{}" alt="{}">"#,
                    escape_attr(&format!("{dir_name}/{file_name}")),
                    escape_attr(&alt),
                );
                result = result.replacen(&el.html(), &tag, 1);
                assets.push(dest);
            }
            Err(e) => warn!(src, error = %e, "failed to relocate image"),
        }
    }

    ImageRewrite {
        html: result,
        formulas,
        assets,
    }
}

/// `alt` for images, `<title>` child for inline SVG.
fn accessible_text(el: &ElementRef<'_>) -> String {
    if let Some(alt) = el.value().attr("alt").filter(|a| !a.trim().is_empty()) {
        return alt.trim().to_string();
    }
    el.children()
        .filter_map(ElementRef::wrap)
        .find(|child| child.value().name() == "title")
        .map(|t| t.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

/// A relative reference into the source tree (not a URL, not inline data).
fn is_local_reference(src: &str) -> bool {
    let src = src.trim();
    !src.is_empty()
        && !src.starts_with("data:")
        && !src.starts_with("//")
        && !Path::new(src).is_absolute()
        && Url::parse(src).is_err()
}

/// Drop `?query` and `#fragment` from a relative reference.
fn strip_query(src: &str) -> &str {
    let end = src.find(['?', '#']).unwrap_or(src.len());
    &src[..end]
}

/// Copy `source` into `assets_dir` unless a file of that name is already there.
fn relocate_asset(source: &Path, assets_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .ok_or_else(|| DocBuilderError::validation(format!("no file name: {}", source.display())))?;

    fs::create_dir_all(assets_dir).map_err(|e| DocBuilderError::io(assets_dir, e))?;

    let dest = assets_dir.join(file_name);
    if !dest.exists() {
        fs::copy(source, &dest).map_err(|e| DocBuilderError::io(&dest, e))?;
        debug!(from = %source.display(), to = %dest.display(), "copied asset");
    }

    Ok(dest)
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ---------------------------------------------------------------------------
// Table pre-processing
// ---------------------------------------------------------------------------

/// Render `<table>` elements as Markdown pipe tables before `htmd` runs.
///
/// `htmd` 0.1 doesn't support table conversion, so each table becomes a
/// placeholder paragraph that is swapped back during cleanup.
fn preprocess_tables(html: &str, placeholders: &mut Placeholders) -> String {
    let fragment = Html::parse_fragment(html);
    let Ok(table_sel) = Selector::parse("table") else {
        return html.to_string();
    };

    if fragment.select(&table_sel).next().is_none() {
        return html.to_string();
    }

    let mut result = fragment.root_element().inner_html();

    // Outer tables first; a nested table disappears with its parent.
    for table_el in fragment.select(&table_sel) {
        let outer = table_el.html();
        if !result.contains(&outer) {
            continue;
        }
        let md_table = html_table_to_markdown(&table_el);
        let token = placeholders.insert(md_table);
        result = result.replacen(&outer, &format!("<p>{token}</p>"), 1);
    }

    result
}

/// Convert a single HTML table element to a markdown table string.
fn html_table_to_markdown(table: &ElementRef<'_>) -> String {
    let (Ok(tr_sel), Ok(th_sel), Ok(td_sel)) = (
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
    ) else {
        return String::new();
    };

    let cell_text = |cell: ElementRef<'_>| {
        cell.text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .replace('|', "\\|")
    };

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut has_header = false;

    for tr in table.select(&tr_sel) {
        let ths: Vec<String> = tr.select(&th_sel).map(cell_text).collect();
        if !ths.is_empty() {
            has_header = true;
            rows.push(ths);
            continue;
        }

        let tds: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
        if !tds.is_empty() {
            rows.push(tds);
        }
    }

    let col_count = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    if col_count == 0 {
        return String::new();
    }

    for row in &mut rows {
        row.resize(col_count, String::new());
    }

    let mut md = String::from("\n\n");

    let header = &rows[0];
    md.push_str("| ");
    md.push_str(&header.join(" | "));
    md.push_str(" |\n");

    md.push_str("| ");
    md.push_str(&vec!["---"; col_count].join(" | "));
    md.push_str(" |\n");

    let data_start = if has_header { 1 } else { 0 };
    for row in &rows[data_start..] {
        md.push_str("| ");
        md.push_str(&row.join(" | "));
        md.push_str(" |\n");
    }

    md.push('\n');
    md
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_path(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name)
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "docbuilder-markdown-test-{}",
            uuid::Uuid::now_v7()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn docbook() -> ConvertOptions {
        ConvertOptions {
            profile: ContentProfile::docbook(),
            formula: FormulaHeuristic::default(),
        }
    }

    // --- Core conversion tests ---

    #[test]
    fn convert_simple_html() {
        let html = "<html><body><div class=\"section\"><h1>Hello World</h1><p>Some text.</p></div></body></html>";
        let result = convert_html(html, None, None, &docbook()).unwrap();

        assert!(result.markdown.contains("# Hello World"));
        assert!(result.markdown.contains("Some text."));
        assert!(result.markdown.ends_with('\n'));
    }

    #[test]
    fn convert_prefers_profile_region() {
        let html = r#"<html><body>
            <div class="navheader"><p>Prev | Next</p></div>
            <p>Outside chrome</p>
            <div class="chapter"><h2>Loads</h2><p>Body text.</p></div>
        </body></html>"#;

        let result = convert_html(html, None, None, &docbook()).unwrap();
        assert!(result.markdown.contains("## Loads"));
        assert!(result.markdown.contains("Body text."));
        assert!(!result.markdown.contains("Outside chrome"));
    }

    #[test]
    fn convert_falls_back_to_body() {
        let html = "<html><body><h1>Direct Body</h1><p>Content in body.</p></body></html>";
        let result = convert_html(html, None, None, &docbook()).unwrap();
        assert!(result.markdown.contains("Direct Body"));
        assert!(result.markdown.contains("Content in body."));
    }

    #[test]
    fn convert_strips_noise() {
        let html = r#"<html><body><div class="section">
            <div class="navheader">Top navigation</div>
            <script>track()</script>
            <style>p { color: red }</style>
            <p>Important text.</p>
            <div class="navfooter">Bottom navigation</div>
        </div></body></html>"#;

        let result = convert_html(html, None, None, &docbook()).unwrap();
        assert!(result.markdown.contains("Important text."));
        assert!(!result.markdown.contains("navigation"));
        assert!(!result.markdown.contains("track()"));
        assert!(!result.markdown.contains("color: red"));
    }

    #[test]
    fn convert_drops_link_targets() {
        let html = r#"<html><body><p>See <a href="other.html#sec">the element library</a> for details.</p></body></html>"#;
        let result = convert_html(html, None, None, &ConvertOptions::default()).unwrap();

        assert!(result.markdown.contains("the element library"));
        assert!(!result.markdown.contains("other.html"));
        assert!(!result.markdown.contains("]("));
    }

    #[test]
    fn convert_uses_backslash_line_breaks() {
        let html = "<html><body><p>first<br>second</p></body></html>";
        let result = convert_html(html, None, None, &ConvertOptions::default()).unwrap();
        assert!(result.markdown.contains("first\\\nsecond"), "got {:?}", result.markdown);
    }

    #[test]
    fn convert_preserves_tables() {
        let html = r#"<html><body>
            <table>
                <thead><tr><th>Name</th><th>Value</th></tr></thead>
                <tbody>
                    <tr><td>E</td><td>210 GPa</td></tr>
                    <tr><td>nu</td><td>0.3</td></tr>
                </tbody>
            </table>
        </body></html>"#;

        let result = convert_html(html, None, None, &ConvertOptions::default()).unwrap();
        assert!(result.markdown.contains("| Name | Value |"));
        assert!(result.markdown.contains("| --- | --- |"));
        assert!(result.markdown.contains("| E | 210 GPa |"));
    }

    #[test]
    fn convert_empty_body_is_empty() {
        let html = "<html><body><div class=\"section\">  </div></body></html>";
        let result = convert_html(html, None, None, &docbook()).unwrap();
        assert_eq!(result.markdown, "");
    }

    #[test]
    fn convert_lifts_title_for_dita() {
        let html = r#"<html><body><h1 class="title">Contact  pairs</h1>
            <div class="body conbody"><p>Surfaces interact.</p></div></body></html>"#;
        let opts = ConvertOptions {
            profile: ContentProfile::dita(),
            formula: FormulaHeuristic::default(),
        };

        let result = convert_html(html, None, None, &opts).unwrap();
        assert_eq!(result.title.as_deref(), Some("Contact pairs"));
        assert!(result.markdown.starts_with("# Contact pairs\n\n"));
        assert!(result.markdown.contains("Surfaces interact."));
    }

    // --- Images and formulas ---

    #[test]
    fn formula_image_becomes_inline_math() {
        let tmp = temp_dir();
        let html = r#"<html><body><p>The relation <img src="eq1.png" alt="x=y+1"> holds.</p></body></html>"#;

        let result =
            convert_html(html, Some(&tmp), Some(&tmp.join("assets")), &ConvertOptions::default())
                .unwrap();

        assert!(result.markdown.contains("$x=y+1$"), "got {:?}", result.markdown);
        assert_eq!(result.formulas, 1);
        assert!(result.assets.is_empty());
        assert!(!tmp.join("assets").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn formula_from_svg_title() {
        let html = r#"<html><body><p><svg width="10"><title>a\cdot b</title><path d="M0 0"/></svg></p></body></html>"#;
        let result = convert_html(html, None, None, &ConvertOptions::default()).unwrap();
        assert!(result.markdown.contains(r"$a\cdot b$"), "got {:?}", result.markdown);
    }

    #[test]
    fn formula_heuristic_is_configurable() {
        let html = r#"<html><body><p><img src="eq.png" alt="a+b"></p></body></html>"#;
        let opts = ConvertOptions {
            profile: ContentProfile::generic(),
            formula: FormulaHeuristic::disabled(),
        };
        let result = convert_html(html, None, None, &opts).unwrap();
        assert_eq!(result.formulas, 0);
        assert!(!result.markdown.contains('$'));
        assert!(result.markdown.contains("(eq.png)"));
    }

    #[test]
    fn local_image_is_relocated() {
        let src = temp_dir();
        fs::create_dir_all(src.join("graphics")).unwrap();
        fs::write(src.join("graphics/mesh.png"), b"png-bytes").unwrap();
        let out = temp_dir();
        let assets = out.join("assets");

        let html = r#"<html><body><p><img src="graphics/mesh.png?v=2" alt="Mesh"></p>
            <p><img src="https://example.com/remote.png" alt="Remote"></p>
            <p><img src="data:image/png;base64,AAAA" alt="Inline"></p></body></html>"#;

        let result =
            convert_html(html, Some(&src), Some(&assets), &ConvertOptions::default()).unwrap();

        assert!(result.markdown.contains("![Mesh](assets/mesh.png)"), "got {:?}", result.markdown);
        assert!(result.markdown.contains("https://example.com/remote.png"));
        assert_eq!(fs::read(assets.join("mesh.png")).unwrap(), b"png-bytes");
        assert_eq!(result.assets, vec![assets.join("mesh.png")]);

        let _ = fs::remove_dir_all(&src);
        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn existing_asset_is_not_overwritten() {
        let src = temp_dir();
        fs::write(src.join("fig.png"), b"new").unwrap();
        let assets = src.join("out-assets");
        fs::create_dir_all(&assets).unwrap();
        fs::write(assets.join("fig.png"), b"old").unwrap();

        let html = r#"<html><body><img src="fig.png" alt="Figure"></body></html>"#;
        convert_html(html, Some(&src), Some(&assets), &ConvertOptions::default()).unwrap();

        assert_eq!(fs::read(assets.join("fig.png")).unwrap(), b"old");
        let _ = fs::remove_dir_all(&src);
    }

    #[test]
    fn missing_image_left_untouched() {
        let src = temp_dir();
        let assets = src.join("assets");
        let html = r#"<html><body><img src="nope.png" alt="Missing"></body></html>"#;

        let result =
            convert_html(html, Some(&src), Some(&assets), &ConvertOptions::default()).unwrap();
        assert!(result.markdown.contains("![Missing](nope.png)"));
        assert!(!assets.exists());

        let _ = fs::remove_dir_all(&src);
    }

    #[test]
    fn local_reference_detection() {
        assert!(is_local_reference("images/a.png"));
        assert!(is_local_reference("../shared/a.gif"));
        assert!(!is_local_reference("http://example.com/a.png"));
        assert!(!is_local_reference("data:image/png;base64,AA"));
        assert!(!is_local_reference("//cdn.example.com/a.png"));
        assert!(!is_local_reference("/abs/a.png"));
        assert!(!is_local_reference(""));
    }

    #[test]
    fn placeholders_restore_in_any_order() {
        let mut p = Placeholders::default();
        let tokens: Vec<String> = (0..12).map(|i| p.insert(format!("<{i}>"))).collect();
        let text = format!("{} {} {}", tokens[1], tokens[11], tokens[0]);
        assert_eq!(p.restore(&text), "<1> <11> <0>");
    }

    // --- Fixture-based tests ---

    #[test]
    fn convert_fixture_page_from_disk() {
        let page = fixture_path("html-toc/help/struct/loads.html");
        let out = temp_dir();
        let assets = out.join("assets");

        let result = convert_file(&page, Some(&assets), &docbook()).unwrap();

        assert!(result.markdown.contains("# Applying Loads"));
        assert!(result.markdown.contains("$F=k\\cdot u$"));
        assert!(result.markdown.contains("![Load diagram](assets/load.png)"));
        assert!(!result.markdown.contains("Previous"));
        assert!(assets.join("load.png").exists());

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn convert_missing_file_is_io_error() {
        let err = convert_file(
            Path::new("/definitely/not/here.html"),
            None,
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DocBuilderError::Io { .. }));
    }

    #[test]
    fn conversion_is_deterministic() {
        let page = fixture_path("html-toc/help/struct/loads.html");
        let out = temp_dir();
        let assets = out.join("assets");

        let first = convert_file(&page, Some(&assets), &docbook()).unwrap();
        let second = convert_file(&page, Some(&assets), &docbook()).unwrap();
        assert_eq!(first.markdown, second.markdown);

        let _ = fs::remove_dir_all(&out);
    }
}
