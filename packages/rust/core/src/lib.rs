//! CSV-driven media import pipeline.
//!
//! This crate ties the pieces of an import together:
//! - [`reader`]: CSV parsing and `src` column validation
//! - [`importer`]: per-row download, extension resolution, and storage
//! - [`mime`]: content sniffing and the MIME → extension allow-list
//! - [`hooks`]: upload hooks run after each successful import
//! - [`store`]: the [`MediaStore`] trait the importer stores through
//! - [`library`]: a local, libSQL-backed [`MediaStore`]
//! - [`job`]: the [`ImportJob`] builder that runs everything end to end

pub mod hooks;
pub mod importer;
pub mod job;
pub mod library;
pub mod mime;
pub mod reader;
pub mod report;
pub mod store;

#[cfg(test)]
mod testing;

pub use hooks::{FnHook, HookDispatcher, UploadHook};
pub use importer::{Importer, TargetName};
pub use job::{ImportJob, ImportProgress, SilentProgress};
pub use library::LibraryMediaStore;
pub use reader::{CsvRow, CsvRows};
pub use report::{ImportReport, ImportResult, RowFailure, RowOutcome};
pub use store::{MediaStore, StoreRejection, TempResource, Upload};
