//! Output materialization.
//!
//! Walks selected nodes depth-first and writes them under an output root:
//! containers become directories (with an optional introduction document),
//! leaves become `<index>-<title>.md` files. Every node gets a report; a
//! failing node never stops its siblings.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use docbuilder_discovery::{Content, StructureAdapter};
use docbuilder_shared::paths::name_for;
use docbuilder_shared::{DocBuilderError, DocNode, LayoutConfig, Result};

use crate::pipeline::ProgressReporter;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Markdown written.
    Written { bytes: usize, sha256: String },
    /// Source copied verbatim to `path`.
    Copied { path: PathBuf },
    /// Container directory created, no introduction document.
    Directory,
    /// Nothing to write.
    Skipped { reason: String },
    /// Conversion or write failed.
    Failed { reason: String },
}

/// Outcome for a single node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub title: String,
    /// Markdown file for leaves and introductions, directory otherwise.
    pub path: PathBuf,
    pub outcome: NodeOutcome,
}

/// Aggregate result of one materialization run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub output_root: PathBuf,
    pub nodes: Vec<NodeReport>,
    pub written: usize,
    pub copied: usize,
    pub directories: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Markdown files written more than once in this run; the last write wins.
    pub collisions: usize,
    pub elapsed: Duration,
}

impl BuildReport {
    fn record(&mut self, report: NodeReport) {
        match report.outcome {
            NodeOutcome::Written { .. } => self.written += 1,
            NodeOutcome::Copied { .. } => self.copied += 1,
            NodeOutcome::Directory => self.directories += 1,
            NodeOutcome::Skipped { .. } => self.skipped += 1,
            NodeOutcome::Failed { .. } => self.failed += 1,
        }
        self.nodes.push(report);
    }

    /// True when there was work and none of it succeeded.
    pub fn all_failed(&self) -> bool {
        !self.nodes.is_empty() && self.failed == self.nodes.len()
    }

    /// Reports for failed nodes.
    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes
            .iter()
            .filter(|r| matches!(r.outcome, NodeOutcome::Failed { .. }))
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Writes nodes to disk using an adapter for their content.
pub struct Engine<'a> {
    adapter: &'a dyn StructureAdapter,
    layout: LayoutConfig,
}

/// Per-run state threaded through the walk.
struct Run<'a> {
    report: BuildReport,
    progress: &'a dyn ProgressReporter,
    total: usize,
    written_paths: HashSet<PathBuf>,
}

impl Run<'_> {
    fn record(&mut self, report: NodeReport) {
        if matches!(report.outcome, NodeOutcome::Written { .. })
            && !self.written_paths.insert(report.path.clone())
        {
            warn!(
                title = %report.title,
                path = %report.path.display(),
                "output path already written in this run, overwritten"
            );
            self.report.collisions += 1;
        }
        self.progress
            .node_done(&report, self.report.nodes.len() + 1, self.total);
        self.report.record(report);
    }
}

impl<'a> Engine<'a> {
    pub fn new(adapter: &'a dyn StructureAdapter, layout: &LayoutConfig) -> Self {
        Self {
            adapter,
            layout: layout.clone(),
        }
    }

    /// Materialize `nodes` (and their subtrees) under `output_root`.
    ///
    /// Only failing to create `output_root` is an error; everything else is
    /// recorded per node in the report.
    #[instrument(
        skip_all,
        fields(adapter = self.adapter.name(), root = %output_root.display(), nodes = nodes.len())
    )]
    pub fn materialize(
        &self,
        nodes: &[&DocNode],
        output_root: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<BuildReport> {
        if output_root.as_os_str().is_empty() {
            return Err(DocBuilderError::validation("output path is empty"));
        }

        let start = Instant::now();
        fs::create_dir_all(output_root).map_err(|e| DocBuilderError::io(output_root, e))?;

        let mut run = Run {
            report: BuildReport {
                output_root: output_root.to_path_buf(),
                ..BuildReport::default()
            },
            progress,
            total: nodes.iter().map(|n| n.subtree_len()).sum(),
            written_paths: HashSet::new(),
        };

        for node in nodes {
            self.visit(node, output_root, &mut run);
        }

        run.report.elapsed = start.elapsed();
        info!(
            written = run.report.written,
            copied = run.report.copied,
            skipped = run.report.skipped,
            failed = run.report.failed,
            collisions = run.report.collisions,
            elapsed_ms = run.report.elapsed.as_millis() as u64,
            "materialization complete"
        );

        Ok(run.report)
    }

    fn visit(&self, node: &DocNode, dir: &Path, run: &mut Run<'_>) {
        let segment = name_for(&node.title, node.index);

        if node.is_container {
            self.visit_container(node, &dir.join(segment), run);
        } else {
            let report = self.write_leaf(node, dir, &segment);
            run.record(report);
        }
    }

    fn visit_container(&self, node: &DocNode, target: &Path, run: &mut Run<'_>) {
        if let Err(e) = fs::create_dir_all(target) {
            warn!(
                title = %node.title,
                path = %target.display(),
                error = %e,
                "cannot create directory, skipping subtree"
            );
            run.record(NodeReport {
                title: node.title.clone(),
                path: target.to_path_buf(),
                outcome: NodeOutcome::Failed {
                    reason: DocBuilderError::io(target, e).to_string(),
                },
            });
            return;
        }

        let report = if node.source_path.is_some() {
            let intro = target.join(&self.layout.intro_file_name);
            let assets = target.join(&self.layout.assets_dir_name);
            match self.adapter.read_content(node, target, &assets) {
                Ok(Content::Empty) => directory_report(node, target),
                result => self.finish(node, &intro, result),
            }
        } else {
            directory_report(node, target)
        };
        run.record(report);

        for child in &node.children {
            self.visit(child, target, run);
        }
    }

    fn write_leaf(&self, node: &DocNode, dir: &Path, segment: &str) -> NodeReport {
        let md_path = dir.join(format!("{segment}.md"));

        if node.source_path.is_none() {
            debug!(title = %node.title, "leaf has no source document");
            return NodeReport {
                title: node.title.clone(),
                path: md_path,
                outcome: NodeOutcome::Skipped {
                    reason: "no source document".into(),
                },
            };
        }

        let assets = dir.join(&self.layout.assets_dir_name);
        let result = self.adapter.read_content(node, dir, &assets);
        self.finish(node, &md_path, result)
    }

    /// Turn a content result into a report, writing Markdown to `md_path`.
    fn finish(&self, node: &DocNode, md_path: &Path, result: Result<Content>) -> NodeReport {
        let outcome = match result {
            Ok(Content::Markdown(md)) => match write_markdown(md_path, &md) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(title = %node.title, error = %e, "write failed");
                    NodeOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            },
            Ok(Content::Copied(path)) => {
                return NodeReport {
                    title: node.title.clone(),
                    path: path.clone(),
                    outcome: NodeOutcome::Copied { path },
                };
            }
            Ok(Content::Empty) => NodeOutcome::Skipped {
                reason: "empty content".into(),
            },
            Err(e) => {
                warn!(title = %node.title, error = %e, "conversion failed");
                NodeOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        };

        NodeReport {
            title: node.title.clone(),
            path: md_path.to_path_buf(),
            outcome,
        }
    }
}

fn directory_report(node: &DocNode, target: &Path) -> NodeReport {
    NodeReport {
        title: node.title.clone(),
        path: target.to_path_buf(),
        outcome: NodeOutcome::Directory,
    }
}

/// Write a Markdown file, creating its parent if needed.
fn write_markdown(path: &Path, markdown: &str) -> Result<NodeOutcome> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DocBuilderError::io(parent, e))?;
    }
    fs::write(path, markdown).map_err(|e| DocBuilderError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(markdown.as_bytes());
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(path = %path.display(), bytes = markdown.len(), "wrote markdown");
    Ok(NodeOutcome::Written {
        bytes: markdown.len(),
        sha256,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use docbuilder_discovery::{DirectoryAdapter, XmlManifestAdapter};
    use docbuilder_markdown::ConvertOptions;
    use docbuilder_shared::{ConverterConfig, DirectoryConfig, XmlManifestConfig};

    use super::*;
    use crate::pipeline::SilentProgress;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures")
            .join(name)
    }

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir()
            .join(format!("docbuilder-engine-test-{}", uuid::Uuid::now_v7()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn directory_adapter() -> DirectoryAdapter {
        DirectoryAdapter::new(&DirectoryConfig::default(), &ConverterConfig::default())
    }

    /// Adapter whose content is scripted per title.
    struct Scripted {
        options: ConvertOptions,
        calls: Mutex<Vec<(String, PathBuf)>>,
    }

    impl Scripted {
        fn new() -> Self {
            Self {
                options: ConvertOptions::default(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl StructureAdapter for Scripted {
        fn discover(&self, _source_root: &Path) -> Vec<DocNode> {
            Vec::new()
        }

        fn convert_options(&self) -> &ConvertOptions {
            &self.options
        }

        fn read_content(
            &self,
            node: &DocNode,
            _dest_dir: &Path,
            assets_dir: &Path,
        ) -> Result<Content> {
            self.calls
                .lock()
                .unwrap()
                .push((node.title.clone(), assets_dir.to_path_buf()));
            match node.title.as_str() {
                "Broken" => Err(DocBuilderError::Conversion("bad markup".into())),
                "Blank" => Ok(Content::Empty),
                title => Ok(Content::Markdown(format!("# {title}\n"))),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn with_source(node: DocNode) -> DocNode {
        node.with_source(Some(PathBuf::from("/src/page.html")))
    }

    #[test]
    fn writes_leaves_and_container_intro() {
        let out = temp_dir();
        let adapter = Scripted::new();

        let mut ch = with_source(DocNode::container("Chapter", 1, 1));
        ch.add_child(with_source(DocNode::leaf("Page", 2, 1)));
        let top = with_source(DocNode::leaf("What's New?", 1, 4));

        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&ch, &top], &out, &SilentProgress)
            .unwrap();

        assert_eq!(
            fs::read_to_string(out.join("1-Chapter/00_Introduction.md")).unwrap(),
            "# Chapter\n"
        );
        assert!(out.join("1-Chapter/1-Page.md").is_file());
        assert!(out.join("4-What_s New_.md").is_file());
        assert_eq!(report.written, 3);
        assert_eq!(report.failed, 0);

        let calls = adapter.calls.lock().unwrap();
        assert_eq!(calls[0].1, out.join("1-Chapter/assets"));
        assert_eq!(calls[1].1, out.join("1-Chapter/assets"));
        assert_eq!(calls[2].1, out.join("assets"));

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn failures_are_isolated() {
        let out = temp_dir();
        let adapter = Scripted::new();
        let broken = with_source(DocNode::leaf("Broken", 1, 1));
        let blank = with_source(DocNode::leaf("Blank", 1, 2));
        let sourceless = DocNode::leaf("Orphan", 1, 3);
        let fine = with_source(DocNode::leaf("Fine", 1, 4));

        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&broken, &blank, &sourceless, &fine], &out, &SilentProgress)
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.written, 1);
        assert!(!report.all_failed());
        assert!(out.join("4-Fine.md").is_file());
        assert!(!out.join("1-Broken.md").exists());
        assert!(!out.join("2-Blank.md").exists());
        assert_eq!(report.failures().next().unwrap().title, "Broken");

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn duplicate_numbered_titles_are_counted_as_collisions() {
        let out = temp_dir();
        let adapter = Scripted::new();
        let first = with_source(DocNode::leaf("1. Intro", 1, 1));
        let second = with_source(DocNode::leaf("1. Intro", 1, 2));
        let other = with_source(DocNode::leaf("Other", 1, 3));

        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&first, &second, &other], &out, &SilentProgress)
            .unwrap();

        assert_eq!(report.written, 3);
        assert_eq!(report.collisions, 1);
        assert_eq!(report.nodes[0].path, report.nodes[1].path);
        assert!(out.join("1. Intro.md").is_file());

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn container_without_intro_is_directory() {
        let out = temp_dir();
        let adapter = Scripted::new();
        let mut set = DocNode::container("Set", 1, 1);
        set.add_child(with_source(DocNode::leaf("Blank", 2, 1)));
        let blank_intro = with_source(DocNode::container("Blank", 1, 2));

        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&set, &blank_intro], &out, &SilentProgress)
            .unwrap();

        assert_eq!(report.directories, 2);
        assert!(out.join("1-Set").is_dir());
        assert!(!out.join("2-Blank/00_Introduction.md").exists());

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn uncreatable_container_skips_subtree() {
        let out = temp_dir();
        // a file where the container directory should go
        fs::write(out.join("1-Chapter"), "in the way").unwrap();

        let adapter = Scripted::new();
        let mut ch = with_source(DocNode::container("Chapter", 1, 1));
        ch.add_child(with_source(DocNode::leaf("Page", 2, 1)));
        let next = with_source(DocNode::leaf("Next", 1, 2));

        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&ch, &next], &out, &SilentProgress)
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.nodes.len(), 2);
        assert!(out.join("2-Next.md").is_file());
        assert_eq!(adapter.calls.lock().unwrap().len(), 1);

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn empty_output_path_is_rejected() {
        let adapter = Scripted::new();
        let leaf = with_source(DocNode::leaf("Page", 1, 1));
        let err = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&leaf], Path::new(""), &SilentProgress)
            .unwrap_err();
        assert!(matches!(err, DocBuilderError::Validation { .. }));
    }

    #[test]
    fn directory_fixture_layout() {
        let adapter = directory_adapter();
        let roots = adapter.discover(&fixture("directory"));
        let out = temp_dir();

        let selected: Vec<&DocNode> = roots.iter().collect();
        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&selected, &out, &SilentProgress)
            .unwrap();

        assert!(out.join("1-Ch1/00_Introduction.md").is_file());
        assert!(out.join("1-Ch1/1-p1.md").is_file());
        assert!(out.join("2-a.md").is_file());
        assert!(out.join("3-b.md").is_file());
        assert_eq!(report.failed, 0);

        let intro = fs::read_to_string(out.join("1-Ch1/00_Introduction.md")).unwrap();
        assert!(intro.contains("geometry cleanup"));
        assert!(!intro.contains("Navigation"));

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn materializing_twice_is_byte_identical() {
        let adapter = directory_adapter();
        let roots = adapter.discover(&fixture("directory"));
        let selected: Vec<&DocNode> = roots.iter().collect();
        let out = temp_dir();
        let engine = Engine::new(&adapter, &LayoutConfig::default());

        let first = engine.materialize(&selected, &out, &SilentProgress).unwrap();
        let before = fs::read(out.join("2-a.md")).unwrap();
        let second = engine.materialize(&selected, &out, &SilentProgress).unwrap();
        let after = fs::read(out.join("2-a.md")).unwrap();

        assert_eq!(before, after);
        let hashes = |r: &BuildReport| -> Vec<NodeOutcome> {
            r.nodes.iter().map(|n| n.outcome.clone()).collect()
        };
        assert_eq!(hashes(&first), hashes(&second));

        let _ = fs::remove_dir_all(&out);
    }

    #[test]
    fn manifest_fixture_copies_pdf_and_assets() {
        let adapter =
            XmlManifestAdapter::new(&XmlManifestConfig::default(), &ConverterConfig::default());
        let roots = adapter.discover(&fixture("xml-manifest"));
        let out = temp_dir();

        let report = Engine::new(&adapter, &LayoutConfig::default())
            .materialize(&[&roots[0]], &out, &SilentProgress)
            .unwrap();

        let module = out.join("1-Abaqus");
        assert!(module.join("00_Introduction.md").is_file());
        assert!(module.join("What_s New_-pdf.pdf").is_file());
        assert!(!module.join("2-What_s New_.md").exists());
        assert_eq!(report.copied, 1);

        let guide = module.join("1-Analysis Guide");
        let contact = fs::read_to_string(guide.join("1-Contact/00_Introduction.md")).unwrap();
        assert!(contact.contains("![Contact surfaces](assets/contact.png)"));
        assert!(guide.join("1-Contact/assets/contact.png").is_file());
        assert!(guide.join("1-Contact/1-Contact pairs.md").is_file());
        assert!(guide.join("2-Loads.md").is_file());
        assert!(guide.join("3-Materials/00_Introduction.md").is_file());
        assert!(guide.join("3-Materials/1-Elasticity.md").is_file());
        assert!(guide.join("3-Materials/2-Plasticity.md").is_file());

        // keyword titles keep their text with reserved characters replaced
        assert!(module.join("3-Keywords/1-_CONTACT PAIR.md").is_file());
        assert!(report.nodes.iter().any(|n| n.title == "*OBSOLETE"
            && matches!(n.outcome, NodeOutcome::Skipped { .. })));

        let _ = fs::remove_dir_all(&out);
    }
}
