//! Core domain types: the unified document hierarchy.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// Which vendor layout a source tree uses, and therefore which structure
/// adapter discovers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Plain directory tree of Sphinx-style HTML pages (ANSA).
    Directory,
    /// XML master manifest with nested `ITEM` entries (Abaqus).
    XmlManifest,
    /// XML book configuration plus HTML definition-list TOC files (Ansys).
    HtmlToc,
}

impl SourceKind {
    /// All kinds, in the order the CLI lists them.
    pub const ALL: [SourceKind; 3] = [Self::Directory, Self::XmlManifest, Self::HtmlToc];

    /// Canonical tag used on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::XmlManifest => "xml-manifest",
            Self::HtmlToc => "html-toc",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "directory" | "dir" | "ansa" => Ok(Self::Directory),
            "xml-manifest" | "xml" | "abaqus" => Ok(Self::XmlManifest),
            "html-toc" | "toc" | "ansys" => Ok(Self::HtmlToc),
            other => Err(format!(
                "unknown source kind '{other}': expected directory, xml-manifest or html-toc"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// DocNode
// ---------------------------------------------------------------------------

/// One unit of the unified document hierarchy.
///
/// Containers materialize as directories, leaves as single files. The
/// `index` is fixed when the adapter discovers the node and is never
/// recomputed, so building any subset of the tree keeps the source ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocNode {
    /// Vendor-supplied label (not filesystem-safe).
    pub title: String,
    /// Depth in the discovered hierarchy, 1 = top.
    pub level: u32,
    /// 1-based rank among siblings.
    pub index: u32,
    /// Originating document; `None` for purely structural nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    /// Whether the node owns children and becomes a directory.
    pub is_container: bool,
    /// The source is a binary (PDF, video) copied as-is instead of converted.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub copy_verbatim: bool,
    /// Children in discovery order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DocNode>,
}

impl DocNode {
    /// Create a leaf node.
    pub fn leaf(title: impl Into<String>, level: u32, index: u32) -> Self {
        Self {
            title: title.into(),
            level,
            index,
            source_path: None,
            is_container: false,
            copy_verbatim: false,
            children: Vec::new(),
        }
    }

    /// Create a container node with no children yet.
    pub fn container(title: impl Into<String>, level: u32, index: u32) -> Self {
        Self {
            is_container: true,
            ..Self::leaf(title, level, index)
        }
    }

    /// Attach a source document.
    pub fn with_source(mut self, source_path: Option<PathBuf>) -> Self {
        self.source_path = source_path;
        self
    }

    /// Append a child. The caller assigns the child's index.
    pub fn add_child(&mut self, child: DocNode) {
        debug_assert!(self.is_container, "leaf nodes cannot own children");
        self.children.push(child);
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(DocNode::subtree_len).sum::<usize>()
    }
}

/// Count all nodes in a forest.
pub fn count_nodes(roots: &[DocNode]) -> usize {
    roots.iter().map(DocNode::subtree_len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_parses_vendor_aliases() {
        assert_eq!("ansa".parse::<SourceKind>(), Ok(SourceKind::Directory));
        assert_eq!("ABAQUS".parse::<SourceKind>(), Ok(SourceKind::XmlManifest));
        assert_eq!("html-toc".parse::<SourceKind>(), Ok(SourceKind::HtmlToc));
        assert!("nastran".parse::<SourceKind>().is_err());
    }

    #[test]
    fn source_kind_display_roundtrip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.to_string().parse::<SourceKind>(), Ok(kind));
        }
    }

    #[test]
    fn container_counts_subtree() {
        let mut root = DocNode::container("Guide", 1, 1);
        let mut chapter = DocNode::container("Chapter", 2, 1);
        chapter.add_child(DocNode::leaf("Page", 3, 1));
        root.add_child(chapter);
        root.add_child(DocNode::leaf("Appendix", 2, 2));

        assert_eq!(root.subtree_len(), 4);
        assert_eq!(count_nodes(&[root.clone(), DocNode::leaf("x", 1, 2)]), 5);
    }

    #[test]
    fn doc_node_serialization_skips_empty_fields() {
        let node = DocNode::leaf("Intro", 1, 1);
        let json = serde_json::to_string(&node).expect("serialize");
        assert!(!json.contains("children"));
        assert!(!json.contains("source_path"));
        assert!(!json.contains("copy_verbatim"));

        let parsed: DocNode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, node);
    }
}
