//! XML-manifest adapter (Abaqus).
//!
//! A master manifest lists modules as `ITEM` elements. Each module's
//! `ITEM`/`DITEM` children are books, whose own children come from a linked
//! secondary manifest (`childtoc`) or from nested `ITEM`s inline.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use docbuilder_markdown::{ContentProfile, ConvertOptions};
use docbuilder_shared::{ConverterConfig, DocNode, XmlManifestConfig, count_nodes};

use super::{
    StructureAdapter, absolute_root, convert_options, is_verbatim, resolve_existing,
    strip_fragment,
};
use crate::xml::{self, XmlElement};

/// Element names that become nodes.
const ITEM_ELEMENTS: &[&str] = &["ITEM", "DITEM"];

/// Attributes tried, in order, for a node title.
const TITLE_ATTRS: &[&str] = &["name", "title", "href"];

/// Reads a master manifest and the secondary manifests it links.
pub struct XmlManifestAdapter {
    master_manifest: String,
    verbatim_extensions: Vec<String>,
    options: ConvertOptions,
}

/// Per-scan state: verbatim entries reported after discovery, and the
/// manifests open on the current branch.
#[derive(Default)]
struct Audit {
    verbatim: Vec<String>,
    loading: Vec<PathBuf>,
}

impl XmlManifestAdapter {
    pub fn new(config: &XmlManifestConfig, converter: &ConverterConfig) -> Self {
        Self {
            master_manifest: config.master_manifest.clone(),
            verbatim_extensions: converter.copy_verbatim_extensions.clone(),
            options: convert_options(ContentProfile::dita(), converter),
        }
    }

    /// Build the sibling group for the item children of `parent`.
    fn build_items(
        &self,
        parent: &XmlElement,
        base_dir: &Path,
        level: u32,
        audit: &mut Audit,
    ) -> Vec<DocNode> {
        parent
            .children_named(ITEM_ELEMENTS)
            .zip(1..)
            .map(|(item, index)| self.build_item(item, base_dir, level, index, audit))
            .collect()
    }

    fn build_item(
        &self,
        item: &XmlElement,
        base_dir: &Path,
        level: u32,
        index: u32,
        audit: &mut Audit,
    ) -> DocNode {
        let title = item.first_attr(TITLE_ATTRS).unwrap_or("Untitled").to_string();
        let href = item.attr("href");
        let childtoc = item.first_attr(&["childtoc"]);
        let has_nested = item.children_named(ITEM_ELEMENTS).next().is_some();

        let mut node = if childtoc.is_some() || has_nested {
            DocNode::container(title, level, index)
        } else {
            DocNode::leaf(title, level, index)
        };
        node.source_path = href.and_then(|h| resolve_existing(base_dir, h));

        if href.is_some_and(|h| is_verbatim(h, &self.verbatim_extensions)) {
            node.copy_verbatim = true;
            audit.verbatim.push(node.title.clone());
        }

        if let Some(rel) = childtoc {
            node.children = self.load_secondary(base_dir, rel, level + 1, audit);
        } else if has_nested {
            node.children = self.build_items(item, base_dir, level + 1, audit);
        }

        node
    }

    /// Parse a secondary manifest; its hrefs resolve against its own directory.
    ///
    /// A manifest already open on the current branch is not entered again.
    fn load_secondary(
        &self,
        base_dir: &Path,
        rel: &str,
        level: u32,
        audit: &mut Audit,
    ) -> Vec<DocNode> {
        let path = base_dir.join(strip_fragment(rel));
        let key = manifest_key(&path);
        if audit.loading.contains(&key) {
            warn!(manifest = %path.display(), "childtoc cycle, branch left empty");
            return Vec::new();
        }

        match xml::parse_file(&path) {
            Ok(root) => {
                let dir = path.parent().unwrap_or(base_dir);
                audit.loading.push(key);
                let children = self.build_items(&root, dir, level, audit);
                audit.loading.pop();
                children
            }
            Err(e) => {
                warn!(
                    manifest = %path.display(),
                    error = %e,
                    "secondary manifest unreadable, branch left empty"
                );
                Vec::new()
            }
        }
    }
}

/// Identity of a manifest file; symlinks and `..` collapse to one path.
fn manifest_key(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl StructureAdapter for XmlManifestAdapter {
    #[instrument(skip(self), fields(adapter = "xml-manifest"))]
    fn discover(&self, source_root: &Path) -> Vec<DocNode> {
        let root_dir = absolute_root(source_root);
        let master_path = root_dir.join(&self.master_manifest);

        let master = match xml::parse_file(&master_path) {
            Ok(master) => master,
            Err(e) => {
                warn!(manifest = %master_path.display(), error = %e, "master manifest unavailable");
                return Vec::new();
            }
        };

        let mut audit = Audit {
            loading: vec![manifest_key(&master_path)],
            ..Audit::default()
        };
        let nodes: Vec<DocNode> = master
            .children_named(&["ITEM"])
            .zip(1..)
            .map(|(item, index)| {
                let mut module = self.build_item(item, &root_dir, 1, index, &mut audit);
                module.is_container = true;
                module
            })
            .collect();

        if !audit.verbatim.is_empty() {
            info!(count = audit.verbatim.len(), "entries pointing at binary documents");
            for title in &audit.verbatim {
                info!(title = %title, "will be copied verbatim");
            }
        }
        info!(top_level = nodes.len(), total = count_nodes(&nodes), "manifest scan complete");

        nodes
    }

    fn convert_options(&self) -> &ConvertOptions {
        &self.options
    }

    fn name(&self) -> &str {
        "xml-manifest"
    }
}
