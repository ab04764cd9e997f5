//! Directory-walk adapter: the filesystem layout is the table of contents.
//!
//! Used for Sphinx-built trees (ANSA). Every directory is a container and
//! every `.html` file other than `index.html` is a leaf page.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use docbuilder_markdown::{ContentProfile, ConvertOptions};
use docbuilder_shared::{ConverterConfig, DirectoryConfig, DocNode, count_nodes};

use super::{StructureAdapter, absolute_root, convert_options};

/// File that holds a directory's own page.
const INDEX_FILE: &str = "index.html";

/// Walks a directory tree in sorted order.
pub struct DirectoryAdapter {
    ignore_dirs: Vec<String>,
    options: ConvertOptions,
}

impl DirectoryAdapter {
    pub fn new(config: &DirectoryConfig, converter: &ConverterConfig) -> Self {
        Self {
            ignore_dirs: config.ignore_dirs.clone(),
            options: convert_options(ContentProfile::sphinx(), converter),
        }
    }

    fn walk(&self, dir: &Path, level: u32) -> Vec<DocNode> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "cannot list directory, skipping");
                return Vec::new();
            }
        };

        let mut entries: Vec<PathBuf> = read.flatten().map(|entry| entry.path()).collect();
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut nodes = Vec::new();
        let mut index = 0;

        for path in entries {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                warn!(path = %path.display(), "non UTF-8 file name, skipping");
                continue;
            };

            if path.is_dir() {
                if self.ignore_dirs.iter().any(|d| d == name) {
                    continue;
                }
                index += 1;
                let intro = path.join(INDEX_FILE);
                let mut node = DocNode::container(name, level, index)
                    .with_source(intro.is_file().then_some(intro));
                node.children = self.walk(&path, level + 1);
                nodes.push(node);
            } else if is_page(&path) && name != INDEX_FILE {
                index += 1;
                let title = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or(name)
                    .to_string();
                nodes.push(DocNode::leaf(title, level, index).with_source(Some(path)));
            }
        }

        nodes
    }
}

impl StructureAdapter for DirectoryAdapter {
    #[instrument(skip(self), fields(adapter = "directory"))]
    fn discover(&self, source_root: &Path) -> Vec<DocNode> {
        if !source_root.is_dir() {
            warn!(root = %source_root.display(), "source root is not a directory");
            return Vec::new();
        }

        let nodes = self.walk(&absolute_root(source_root), 1);
        info!(top_level = nodes.len(), total = count_nodes(&nodes), "directory scan complete");
        nodes
    }

    fn convert_options(&self) -> &ConvertOptions {
        &self.options
    }

    fn name(&self) -> &str {
        "directory"
    }
}

fn is_page(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("html"))
}
