//! Shared types, error model, and configuration for MediaImport.
//!
//! This crate is the foundation depended on by all other MediaImport crates.
//! It provides:
//! - [`MediaImportError`]: the unified error type
//! - Domain types ([`MediaId`], [`Metadata`], [`MediaRecord`], [`DescriptiveFields`])
//! - Configuration ([`AppConfig`], [`LibraryConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DownloadSection, LibraryConfig, LibrarySection, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from,
};
pub use error::{MediaImportError, Result};
pub use types::{DescriptiveFields, MediaId, MediaRecord, Metadata};
