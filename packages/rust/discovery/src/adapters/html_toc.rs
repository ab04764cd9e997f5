//! HTML-TOC adapter (Ansys).
//!
//! `toc_config.xml` lists `set`s (titled groups of books) and bare `book`s.
//! Each book lives in `help/<path>/` with a landing page and a `toc.toc`
//! file of nested definition lists.

use std::fs;
use std::path::Path;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument, warn};

use docbuilder_markdown::{ContentProfile, ConvertOptions};
use docbuilder_shared::{
    ConverterConfig, DocBuilderError, DocNode, HtmlTocConfig, Result, count_nodes,
};

use super::{StructureAdapter, absolute_root, convert_options, resolve_existing};
use crate::xml::{self, XmlElement};

/// Reads the book configuration and each book's definition-list TOC.
pub struct HtmlTocAdapter {
    config: HtmlTocConfig,
    options: ConvertOptions,
}

impl HtmlTocAdapter {
    pub fn new(config: &HtmlTocConfig, converter: &ConverterConfig) -> Self {
        Self {
            config: config.clone(),
            options: convert_options(ContentProfile::docbook(), converter),
        }
    }

    /// Books of a set, numbered among themselves.
    fn build_books(&self, root: &Path, set: &XmlElement, level: u32) -> Vec<DocNode> {
        let mut books = Vec::new();
        for book in set.children_named(&["book"]) {
            let index = books.len() as u32 + 1;
            if let Some(node) = self.build_book(root, book, level, index) {
                books.push(node);
            }
        }
        books
    }

    fn build_book(
        &self,
        root: &Path,
        book: &XmlElement,
        level: u32,
        index: u32,
    ) -> Option<DocNode> {
        let Some(path) = book.first_attr(&["path"]) else {
            warn!(title = ?book.first_attr(&["label", "title"]), "book without a path, skipping");
            return None;
        };

        let title = book.first_attr(&["label", "title"]).unwrap_or(path);
        let book_dir = root.join(&self.config.help_dir).join(path);
        let mut node = DocNode::container(title, level, index)
            .with_source(resolve_existing(&book_dir, &self.config.book_index));

        let toc_path = book_dir.join(&self.config.toc_file);
        if toc_path.is_file() {
            match parse_toc(&toc_path, level + 1) {
                Ok(children) => node.children = children,
                Err(e) => {
                    warn!(toc = %toc_path.display(), error = %e, "TOC unreadable, book left empty")
                }
            }
        } else {
            debug!(toc = %toc_path.display(), "book has no TOC file");
        }

        Some(node)
    }
}

impl StructureAdapter for HtmlTocAdapter {
    #[instrument(skip(self), fields(adapter = "html-toc"))]
    fn discover(&self, source_root: &Path) -> Vec<DocNode> {
        let root = absolute_root(source_root);
        let config_path = root.join(&self.config.config_file);

        let config = match xml::parse_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    config = %config_path.display(),
                    error = %e,
                    "book configuration unavailable"
                );
                return Vec::new();
            }
        };

        let mut nodes = Vec::new();
        for child in &config.children {
            let index = nodes.len() as u32 + 1;
            match child.name.as_str() {
                "set" => {
                    let title = child.first_attr(&["title", "label"]).unwrap_or("Untitled set");
                    let mut set = DocNode::container(title, 1, index);
                    set.children = self.build_books(&root, child, 2);
                    nodes.push(set);
                }
                "book" => {
                    if let Some(book) = self.build_book(&root, child, 1, index) {
                        nodes.push(book);
                    }
                }
                other => debug!(element = other, "ignoring unknown configuration element"),
            }
        }

        info!(top_level = nodes.len(), total = count_nodes(&nodes), "book scan complete");
        nodes
    }

    fn convert_options(&self) -> &ConvertOptions {
        &self.options
    }

    fn name(&self) -> &str {
        "html-toc"
    }
}

// ---------------------------------------------------------------------------
// Definition-list TOC
// ---------------------------------------------------------------------------

/// Parse the first `dl` of a TOC file into nodes starting at `level`.
fn parse_toc(toc_path: &Path, level: u32) -> Result<Vec<DocNode>> {
    let bytes = fs::read(toc_path).map_err(|e| DocBuilderError::io(toc_path, e))?;
    let doc = Html::parse_document(&String::from_utf8_lossy(&bytes));

    let dl_sel = selector("dl")?;
    let base_dir = toc_path.parent().unwrap_or(Path::new("."));

    Ok(doc
        .select(&dl_sel)
        .next()
        .map(|dl| build_dl(dl, base_dir, level))
        .unwrap_or_default())
}

/// Each `dt` with an anchor is a node; a following `dd` holding a `dl` makes it a container.
fn build_dl(dl: ElementRef<'_>, base_dir: &Path, level: u32) -> Vec<DocNode> {
    let (Ok(a_sel), Ok(dl_sel)) = (selector("a"), selector("dl")) else {
        return Vec::new();
    };

    let mut nodes = Vec::new();

    for dt in dl.children().filter_map(ElementRef::wrap) {
        if dt.value().name() != "dt" {
            continue;
        }
        let Some(anchor) = dt.select(&a_sel).next() else {
            continue;
        };

        let index = nodes.len() as u32 + 1;
        let title = anchor.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        let source = anchor
            .value()
            .attr("href")
            .and_then(|href| resolve_existing(base_dir, href));

        let nested = dt
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .next()
            .filter(|sib| sib.value().name() == "dd")
            .and_then(|dd| dd.select(&dl_sel).next());

        let node = match nested {
            Some(child_dl) => {
                let mut node = DocNode::container(title, level, index).with_source(source);
                node.children = build_dl(child_dl, base_dir, level + 1);
                node
            }
            None => DocNode::leaf(title, level, index).with_source(source),
        };
        nodes.push(node);
    }

    nodes
}

fn selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| DocBuilderError::parse(format!("selector {s}: {e}")))
}
