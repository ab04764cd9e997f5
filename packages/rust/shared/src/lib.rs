//! Shared types, error model, and configuration for DocBuilder.
//!
//! This crate is the foundation depended on by all other DocBuilder crates.
//! It provides:
//! - [`DocBuilderError`]: the unified error type
//! - Domain types ([`DocNode`], [`SourceKind`])
//! - Output naming ([`paths::sanitize`], [`paths::name_for`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ConverterConfig, DefaultsConfig, DirectoryConfig, HtmlTocConfig, LayoutConfig,
    XmlManifestConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{DocBuilderError, Result};
pub use types::{DocNode, SourceKind, count_nodes};
