//! Shared types, error model, and configuration for probank.
//!
//! This crate is the foundation depended on by all other probank crates.
//! It provides:
//! - [`ProbankError`], the unified error type
//! - Domain records ([`ProblemMeta`], [`CorpusMetadata`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BundleConfig, DiscoveryConfig, OutputConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{ProbankError, Result};
pub use types::{CorpusMetadata, ProblemMeta};
