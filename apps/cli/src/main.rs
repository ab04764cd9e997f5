//! DocBuilder CLI: vendor documentation trees to a Markdown knowledge base.
//!
//! Scans a vendor's table of contents, prints the discovered hierarchy, and
//! materializes a selection of it as a directory of Markdown files.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
