//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use docbuilder_core::{
    BuildReport, NodeId, NodeOutcome, NodeReport, NodeTable, ProgressReporter, Workbench,
};
use docbuilder_shared::{AppConfig, SourceKind, init_config, load_config, load_config_from};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocBuilder: turn vendor documentation trees into a Markdown knowledge base.
#[derive(Parser)]
#[command(
    name = "docbuilder",
    version,
    about = "Turn CAE vendor documentation trees into a Markdown knowledge base.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docbuilder/docbuilder.toml.
    #[arg(long, global = true, env = "DOCBUILDER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Discover a source tree and print its hierarchy with node ids.
    Scan {
        /// Source layout: directory (ansa), xml-manifest (abaqus), html-toc (ansys).
        #[arg(short, long)]
        kind: SourceKind,

        /// Root directory of the vendor documentation.
        source: PathBuf,

        /// Print the tree as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Scan a source tree and write the selected nodes as Markdown.
    Build {
        /// Source layout: directory (ansa), xml-manifest (abaqus), html-toc (ansys).
        #[arg(short, long)]
        kind: SourceKind,

        /// Root directory of the vendor documentation.
        source: PathBuf,

        /// Output directory (defaults to `[defaults] output_dir`).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Node ids to build, as printed by `scan` (repeatable).
        #[arg(short, long, num_args = 1.., required_unless_present = "all", conflicts_with = "all")]
        select: Vec<NodeId>,

        /// Build every top-level node.
        #[arg(long)]
        all: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbuilder=info",
        1 => "docbuilder=debug",
        _ => "docbuilder=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Scan { kind, source, json } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_scan(config, kind, source, json).await
        }
        Command::Build {
            kind,
            source,
            out,
            select,
            all,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_build(config, kind, source, out, select, all).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

/// `--config` wins over the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scan(config: AppConfig, kind: SourceKind, source: PathBuf, json: bool) -> Result<()> {
    ensure_source_dir(&source)?;
    info!(%kind, source = %source.display(), "scanning documentation tree");

    let bench = Workbench::new(config);
    let table = bench.scan(kind, source.clone(), Arc::new(CliProgress::new())).await?;

    if json {
        let doc = serde_json::json!({
            "kind": kind,
            "source": source,
            "nodes": table.roots(),
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    if table.is_empty() {
        println!("No documents found under {}", source.display());
        return Ok(());
    }

    print_tree(&table);
    println!();
    println!("  {} nodes ({} top-level)", table.len(), table.roots().len());
    println!("  Build with: docbuilder build --kind {kind} {} --select <id>...", source.display());
    Ok(())
}

async fn cmd_build(
    config: AppConfig,
    kind: SourceKind,
    source: PathBuf,
    out: Option<PathBuf>,
    select: Vec<NodeId>,
    all: bool,
) -> Result<()> {
    ensure_source_dir(&source)?;
    let output_root = out.unwrap_or_else(|| PathBuf::from(&config.defaults.output_dir));

    let bench = Workbench::new(config);
    let progress = Arc::new(CliProgress::new());
    let table = bench.scan(kind, source.clone(), progress.clone()).await?;

    if table.is_empty() {
        return Err(eyre!("no documents found under {}", source.display()));
    }

    let selection = if all { table.root_ids() } else { select };
    info!(
        %kind,
        source = %source.display(),
        out = %output_root.display(),
        selected = selection.len(),
        "building knowledge base"
    );

    let report = bench.build(selection, output_root, progress).await?;

    print_summary(&report);

    if report.all_failed() {
        return Err(eyre!("every selected node failed to build"));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn ensure_source_dir(source: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(eyre!("source '{}' is not a directory", source.display()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn print_tree(table: &NodeTable) {
    for (id, node) in table.iter() {
        let depth = table.depth(id).unwrap_or(0);
        let marker = if node.is_container { "+" } else { "-" };
        let note = match (&node.source_path, node.copy_verbatim) {
            (None, _) if !node.is_container => "  (no source)",
            (Some(_), true) => "  (copied as-is)",
            _ => "",
        };
        println!(
            "{:>5}  {}{marker} {}. {}{note}",
            id.to_string(),
            "  ".repeat(depth),
            node.index,
            node.title
        );
    }
}

fn print_summary(report: &BuildReport) {
    println!();
    println!("  Knowledge base written to {}", report.output_root.display());
    println!("  Written:     {}", report.written);
    println!("  Copied:      {}", report.copied);
    println!("  Directories: {}", report.directories);
    println!("  Skipped:     {}", report.skipped);
    println!("  Failed:      {}", report.failed);
    if report.collisions > 0 {
        println!("  Overwritten: {} (duplicate output names)", report.collisions);
    }
    println!("  Time:        {:.1}s", report.elapsed.as_secs_f64());

    let failures: Vec<&NodeReport> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("  Failures:");
        for failure in failures {
            if let NodeOutcome::Failed { reason } = &failure.outcome {
                println!("    {}: {reason}", failure.title);
            }
        }
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn node_done(&self, report: &NodeReport, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {}", report.title));
    }

    fn done(&self, _report: &BuildReport) {
        self.spinner.finish_and_clear();
    }
}

impl Drop for CliProgress {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}
