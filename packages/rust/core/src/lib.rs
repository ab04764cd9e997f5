//! Core orchestration for DocBuilder.
//!
//! This crate ties structure discovery and Markdown conversion together:
//! scanned trees are indexed in a [`NodeTable`](selection::NodeTable),
//! selections are deduplicated, and the [`Engine`](engine::Engine) writes
//! the chosen subtrees into a knowledge-base directory.

pub mod engine;
pub mod pipeline;
pub mod selection;

pub use engine::{BuildReport, Engine, NodeOutcome, NodeReport};
pub use pipeline::{ProgressReporter, SilentProgress, Workbench, build, scan};
pub use selection::{NodeId, NodeTable, ParentLookup, top_level_selections};
