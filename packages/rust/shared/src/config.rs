//! Application configuration for DocBuilder.
//!
//! User config lives at `~/.docbuilder/docbuilder.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocBuilderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docbuilder.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docbuilder";

// ---------------------------------------------------------------------------
// Config structs (matching docbuilder.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Output tree naming.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Content conversion heuristics.
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Directory-walk adapter.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// XML-manifest adapter.
    #[serde(default)]
    pub xml_manifest: XmlManifestConfig,

    /// HTML-TOC adapter.
    #[serde(default)]
    pub html_toc: HtmlTocConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Output directory used when `--out` is not given.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String {
    "docbuilder-kb".into()
}

/// `[layout]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// File written inside a container directory for its own document.
    #[serde(default = "default_intro_file_name")]
    pub intro_file_name: String,

    /// Directory (next to the Markdown) that receives relocated images.
    #[serde(default = "default_assets_dir_name")]
    pub assets_dir_name: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            intro_file_name: default_intro_file_name(),
            assets_dir_name: default_assets_dir_name(),
        }
    }
}

fn default_intro_file_name() -> String {
    "00_Introduction.md".into()
}
fn default_assets_dir_name() -> String {
    "assets".into()
}

/// `[converter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// An image whose alt text contains any of these is treated as a lost
    /// formula and rendered as inline `$...$`. Unverified heuristic.
    #[serde(default = "default_formula_operators")]
    pub formula_operators: Vec<String>,

    /// Source extensions copied verbatim instead of converted (lowercase, no dot).
    #[serde(default = "default_copy_verbatim_extensions")]
    pub copy_verbatim_extensions: Vec<String>,

    /// Extra CSS selectors stripped from every document.
    #[serde(default)]
    pub noise_selectors: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            formula_operators: default_formula_operators(),
            copy_verbatim_extensions: default_copy_verbatim_extensions(),
            noise_selectors: Vec::new(),
        }
    }
}

fn default_formula_operators() -> Vec<String> {
    vec!["=".into(), "\\".into(), "+".into()]
}
fn default_copy_verbatim_extensions() -> Vec<String> {
    ["pdf", "mp4", "avi", "wmv", "mov", "mp3", "swf"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `[directory]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Build-artifact directory names never descended into.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            ignore_dirs: default_ignore_dirs(),
        }
    }
}

fn default_ignore_dirs() -> Vec<String> {
    ["_static", "_images", "_sources", "__pycache__"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `[xml_manifest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlManifestConfig {
    /// Master manifest file name at the source root.
    #[serde(default = "default_master_manifest")]
    pub master_manifest: String,
}

impl Default for XmlManifestConfig {
    fn default() -> Self {
        Self {
            master_manifest: default_master_manifest(),
        }
    }
}

fn default_master_manifest() -> String {
    "DSSIMULIA_Established_TOC.xml".into()
}

/// `[html_toc]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HtmlTocConfig {
    /// Book configuration file at the source root.
    #[serde(default = "default_toc_config_file")]
    pub config_file: String,

    /// Directory (under the source root) holding one folder per book.
    #[serde(default = "default_help_dir")]
    pub help_dir: String,

    /// Definition-list TOC file inside each book folder.
    #[serde(default = "default_toc_file")]
    pub toc_file: String,

    /// Landing page inside each book folder.
    #[serde(default = "default_book_index")]
    pub book_index: String,
}

impl Default for HtmlTocConfig {
    fn default() -> Self {
        Self {
            config_file: default_toc_config_file(),
            help_dir: default_help_dir(),
            toc_file: default_toc_file(),
            book_index: default_book_index(),
        }
    }
}

fn default_toc_config_file() -> String {
    "toc_config.xml".into()
}
fn default_help_dir() -> String {
    "help".into()
}
fn default_toc_file() -> String {
    "toc.toc".into()
}
fn default_book_index() -> String {
    "index.html".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docbuilder/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocBuilderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docbuilder/docbuilder.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocBuilderError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocBuilderError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocBuilderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocBuilderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocBuilderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
