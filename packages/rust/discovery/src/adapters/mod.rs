//! Structure adapter trait and the three built-in vendor adapters.
//!
//! Each adapter knows one vendor's table-of-contents convention and turns it
//! into the unified [`DocNode`] tree. Sibling indices are assigned once, in
//! iteration order, counting only the entries that become nodes.

mod directory;
mod html_toc;
mod xml_manifest;

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use docbuilder_markdown::{ConvertOptions, ContentProfile, FormulaHeuristic, convert_file};
use docbuilder_shared::paths::sanitize;
use docbuilder_shared::{AppConfig, ConverterConfig, DocBuilderError, DocNode, Result, SourceKind};

pub use directory::DirectoryAdapter;
pub use html_toc::HtmlTocAdapter;
pub use xml_manifest::XmlManifestAdapter;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// What the engine should do with a node's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Converted Markdown, ready to be written.
    Markdown(String),
    /// Nothing worth writing.
    Empty,
    /// The source was copied as-is to this path; no Markdown file is written.
    Copied(PathBuf),
}

/// Trait for vendor-specific structure discovery.
pub trait StructureAdapter: Send + Sync {
    /// Build the node tree for `source_root`.
    ///
    /// Never fails as a whole: a broken branch is logged and contributes
    /// nothing, its siblings are unaffected.
    fn discover(&self, source_root: &Path) -> Vec<DocNode>;

    /// Conversion settings for this vendor's HTML.
    fn convert_options(&self) -> &ConvertOptions;

    /// Produce a node's content.
    ///
    /// `dest_dir` is the directory the node's output lands in; `assets_dir`
    /// receives relocated images.
    fn read_content(&self, node: &DocNode, dest_dir: &Path, assets_dir: &Path) -> Result<Content> {
        let Some(source) = node.source_path.as_deref() else {
            return Ok(Content::Empty);
        };

        if node.copy_verbatim {
            return copy_verbatim(&node.title, source, dest_dir).map(Content::Copied);
        }

        let result = convert_file(source, Some(assets_dir), self.convert_options())?;
        if result.markdown.is_empty() {
            Ok(Content::Empty)
        } else {
            Ok(Content::Markdown(result.markdown))
        }
    }

    /// Human-readable adapter name for tracing.
    fn name(&self) -> &str;
}

/// Construct the adapter for a source kind.
pub fn adapter_for(kind: SourceKind, config: &AppConfig) -> Box<dyn StructureAdapter> {
    match kind {
        SourceKind::Directory => {
            Box::new(DirectoryAdapter::new(&config.directory, &config.converter))
        }
        SourceKind::XmlManifest => {
            Box::new(XmlManifestAdapter::new(&config.xml_manifest, &config.converter))
        }
        SourceKind::HtmlToc => Box::new(HtmlTocAdapter::new(&config.html_toc, &config.converter)),
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Conversion options for a vendor profile, with the user's converter settings applied.
pub(crate) fn convert_options(profile: ContentProfile, config: &ConverterConfig) -> ConvertOptions {
    ConvertOptions {
        profile: profile.with_noise(&config.noise_selectors),
        formula: FormulaHeuristic::new(config.formula_operators.clone()),
    }
}

/// Make a source root absolute so every discovered `source_path` is too.
pub(crate) fn absolute_root(source_root: &Path) -> PathBuf {
    std::path::absolute(source_root).unwrap_or_else(|_| source_root.to_path_buf())
}

/// Drop a `#fragment` from a reference.
pub(crate) fn strip_fragment(href: &str) -> &str {
    href.split('#').next().unwrap_or(href)
}

/// Resolve `href` against `base` and keep it only if the file exists.
pub(crate) fn resolve_existing(base: &Path, href: &str) -> Option<PathBuf> {
    let rel = strip_fragment(href).trim();
    if rel.is_empty() {
        return None;
    }

    let path = normalize(&base.join(rel));
    if path.is_file() {
        Some(path)
    } else {
        debug!(href, path = %path.display(), "reference does not resolve to a file");
        None
    }
}

/// Whether `href` names a binary that is copied instead of converted.
pub(crate) fn is_verbatim(href: &str, extensions: &[String]) -> bool {
    Path::new(strip_fragment(href).trim())
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Copy a binary source next to the node's output as `<title>-<ext>.<ext>`.
///
/// An existing destination is left as is.
pub(crate) fn copy_verbatim(title: &str, source: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".into());

    fs::create_dir_all(dest_dir).map_err(|e| DocBuilderError::io(dest_dir, e))?;

    let dest = dest_dir.join(format!("{}-{ext}.{ext}", sanitize(title)));
    if !dest.exists() {
        fs::copy(source, &dest).map_err(|e| DocBuilderError::io(&dest, e))?;
        debug!(from = %source.display(), to = %dest.display(), "copied verbatim");
    }

    Ok(dest)
}
