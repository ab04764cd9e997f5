//! Scan and build pipelines, plus the [`Workbench`] that runs them off the
//! caller's task one at a time.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tracing::{info, instrument};

use docbuilder_discovery::{StructureAdapter, adapter_for};
use docbuilder_shared::{AppConfig, DocBuilderError, DocNode, LayoutConfig, Result, SourceKind};

use crate::engine::{BuildReport, Engine, NodeReport};
use crate::selection::{NodeId, NodeTable, top_level_selections};

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each node is materialized.
    fn node_done(&self, report: &NodeReport, current: usize, total: usize);
    /// Called when a build completes.
    fn done(&self, report: &BuildReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn node_done(&self, _report: &NodeReport, _current: usize, _total: usize) {}
    fn done(&self, _report: &BuildReport) {}
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Discover a source tree and index it.
#[instrument(skip_all, fields(adapter = adapter.name(), root = %source_root.display()))]
pub fn scan(
    adapter: &dyn StructureAdapter,
    source_root: &Path,
    progress: &dyn ProgressReporter,
) -> NodeTable {
    let start = Instant::now();
    progress.phase("Discovering structure");

    let table = NodeTable::new(adapter.discover(source_root));

    info!(
        nodes = table.len(),
        top_level = table.roots().len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "scan complete"
    );
    table
}

/// Materialize a selection from a scanned table.
///
/// The selection is validated up front, then reduced to its topmost nodes so
/// that a container and one of its descendants are only written once.
#[instrument(
    skip_all,
    fields(adapter = adapter.name(), out = %output_root.display(), selected = selection.len())
)]
pub fn build(
    adapter: &dyn StructureAdapter,
    table: &NodeTable,
    selection: &[NodeId],
    output_root: &Path,
    layout: &LayoutConfig,
    progress: &dyn ProgressReporter,
) -> Result<BuildReport> {
    validate_selection(table, selection, output_root)?;

    let roots = top_level_selections(selection, table);
    info!(requested = selection.len(), roots = roots.len(), "selection deduplicated");

    let nodes: Vec<&DocNode> = roots.iter().filter_map(|id| table.get(*id)).collect();

    progress.phase("Writing knowledge base");
    let report = Engine::new(adapter, layout).materialize(&nodes, output_root, progress)?;
    progress.done(&report);

    Ok(report)
}

fn validate_selection(table: &NodeTable, selection: &[NodeId], output_root: &Path) -> Result<()> {
    if selection.is_empty() {
        return Err(DocBuilderError::validation("no nodes selected"));
    }
    if output_root.as_os_str().is_empty() {
        return Err(DocBuilderError::validation("output path is empty"));
    }
    if let Some(unknown) = selection.iter().find(|id| !table.contains(**id)) {
        return Err(DocBuilderError::validation(format!(
            "unknown node id {unknown} (the scan has {} nodes)",
            table.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Workbench
// ---------------------------------------------------------------------------

/// The most recent scan.
struct Loaded {
    kind: SourceKind,
    source_root: PathBuf,
    adapter: Arc<dyn StructureAdapter>,
    table: Arc<NodeTable>,
}

/// Holds the current adapter and node table and runs scans and builds on a
/// blocking worker. Only one operation may be in flight.
pub struct Workbench {
    config: Arc<AppConfig>,
    loaded: Mutex<Option<Loaded>>,
    busy: AtomicBool,
}

/// Clears the busy flag when the operation ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool, operation: &str) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| Self(flag))
            .map_err(|_| {
                DocBuilderError::Busy(format!(
                    "cannot start {operation}: another operation is running"
                ))
            })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Workbench {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config: Arc::new(config),
            loaded: Mutex::new(None),
            busy: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether a scan or build is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Table from the last successful scan.
    pub fn table(&self) -> Option<Arc<NodeTable>> {
        self.lock()
            .ok()
            .and_then(|loaded| loaded.as_ref().map(|l| Arc::clone(&l.table)))
    }

    /// Kind and root of the last successful scan.
    pub fn source(&self) -> Option<(SourceKind, PathBuf)> {
        self.lock()
            .ok()
            .and_then(|loaded| loaded.as_ref().map(|l| (l.kind, l.source_root.clone())))
    }

    /// Discover `source_root` with the adapter for `kind` and keep the result.
    pub async fn scan(
        &self,
        kind: SourceKind,
        source_root: PathBuf,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<Arc<NodeTable>> {
        let _guard = BusyGuard::acquire(&self.busy, "scan")?;

        let adapter: Arc<dyn StructureAdapter> = Arc::from(adapter_for(kind, &self.config));
        let worker_adapter = Arc::clone(&adapter);
        let worker_root = source_root.clone();

        let table = tokio::task::spawn_blocking(move || {
            scan(worker_adapter.as_ref(), &worker_root, progress.as_ref())
        })
        .await
        .map_err(|e| DocBuilderError::Worker(format!("scan task failed: {e}")))?;

        let table = Arc::new(table);
        *self.lock()? = Some(Loaded {
            kind,
            source_root,
            adapter,
            table: Arc::clone(&table),
        });

        Ok(table)
    }

    /// Materialize `selection` from the last scan into `output_root`.
    pub async fn build(
        &self,
        selection: Vec<NodeId>,
        output_root: PathBuf,
        progress: Arc<dyn ProgressReporter>,
    ) -> Result<BuildReport> {
        let _guard = BusyGuard::acquire(&self.busy, "build")?;

        let (adapter, table) = {
            let loaded = self.lock()?;
            let loaded = loaded
                .as_ref()
                .ok_or_else(|| DocBuilderError::validation("nothing has been scanned yet"))?;
            (Arc::clone(&loaded.adapter), Arc::clone(&loaded.table))
        };
        let layout = self.config.layout.clone();

        tokio::task::spawn_blocking(move || {
            build(
                adapter.as_ref(),
                &table,
                &selection,
                &output_root,
                &layout,
                progress.as_ref(),
            )
        })
        .await
        .map_err(|e| DocBuilderError::Worker(format!("build task failed: {e}")))?
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Loaded>>> {
        self.loaded
            .lock()
            .map_err(|_| DocBuilderError::Worker("workbench state poisoned".into()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
