//! Application configuration for probank.
//!
//! User config lives at `~/.probank/probank.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ProbankError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "probank.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".probank";

// ---------------------------------------------------------------------------
// Config structs (matching probank.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Which documents are picked up, and in what order.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Where and how extracted units are written.
    #[serde(default)]
    pub output: OutputConfig,

    /// Incremental bundle settings.
    #[serde(default)]
    pub bundle: BundleConfig,
}

/// `[discovery]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// File extensions (without the dot) treated as source documents.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Directory names skipped anywhere in the tree.
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    /// Directory name prefixes skipped anywhere in the tree (backup copies).
    #[serde(default = "default_exclude_dir_prefixes")]
    pub exclude_dir_prefixes: Vec<String>,

    /// Case-insensitive substrings of the file stem that exclude a document.
    #[serde(default = "default_exclude_keywords")]
    pub exclude_keywords: Vec<String>,

    /// Documents under a directory with this name are processed first.
    #[serde(default = "default_priority_segment")]
    pub priority_segment: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            exclude_dirs: default_exclude_dirs(),
            exclude_dir_prefixes: default_exclude_dir_prefixes(),
            exclude_keywords: default_exclude_keywords(),
            priority_segment: default_priority_segment(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["tex".into()]
}
fn default_exclude_dirs() -> Vec<String> {
    ["tkz1", "tkz2", "images", "images_3rd", "problems", ".git", "__pycache__"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_exclude_dir_prefixes() -> Vec<String> {
    vec!["problems_backup".into()]
}
fn default_exclude_keywords() -> Vec<String> {
    ["template", "test", "_000", "_001", "_002", "tkz", "logo"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_priority_segment() -> String {
    "contents".into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Minimum digits of a unit identifier (zero-padded).
    #[serde(default = "default_id_width")]
    pub id_width: usize,

    /// Directory (under the output root) holding `<id>.tex` unit files.
    #[serde(default = "default_problems_dir")]
    pub problems_dir: String,

    /// Directory (under `problems_dir`) holding `<id>_solution.tex` files.
    #[serde(default = "default_solutions_dir")]
    pub solutions_dir: String,

    /// Aggregate metadata file name (under the output root).
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Human-readable extraction log file name (under the output root).
    #[serde(default = "default_log_file")]
    pub log_file: String,

    /// Carry hand-edited fields over from an existing metadata file.
    #[serde(default = "default_true")]
    pub merge_prior_metadata: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            id_width: default_id_width(),
            problems_dir: default_problems_dir(),
            solutions_dir: default_solutions_dir(),
            metadata_file: default_metadata_file(),
            log_file: default_log_file(),
            merge_prior_metadata: true,
        }
    }
}

fn default_id_width() -> usize {
    3
}
fn default_problems_dir() -> String {
    "problems".into()
}
fn default_solutions_dir() -> String {
    "solutions".into()
}
fn default_metadata_file() -> String {
    "problems_metadata.json".into()
}
fn default_log_file() -> String {
    "extraction_log.txt".into()
}
fn default_true() -> bool {
    true
}

/// `[bundle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleConfig {
    /// Output directory for per-unit JSON records.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: String,

    /// Hash cache file name (under `dist_dir`).
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            cache_file: default_cache_file(),
        }
    }
}

fn default_dist_dir() -> String {
    "dist".into()
}
fn default_cache_file() -> String {
    ".build_cache.json".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.probank/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ProbankError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.probank/probank.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| ProbankError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| ProbankError::config(format!("failed to parse {}: {e}", path.display())))?;

    if config.output.id_width == 0 {
        return Err(ProbankError::config("output.id_width must be at least 1"));
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ProbankError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ProbankError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ProbankError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
