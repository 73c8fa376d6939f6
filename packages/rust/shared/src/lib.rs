//! Shared types, error model, and configuration for PageNotFound.
//!
//! This crate is the foundation depended on by all other PageNotFound crates.
//! It provides:
//! - [`PageNotFoundError`] — the unified error type
//! - Domain types ([`NodeKey`], [`Section`], [`ContentNode`], [`NotFoundConfig`])
//! - Configuration ([`AppConfig`], [`ResolverConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ResolverConfig, ResolverSettings, StorageConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{PageNotFoundError, Result};
pub use types::{ContentNode, NOT_FOUND_STATUS, NodeKey, NotFoundConfig, NotFoundPageEntry, Section};
