//! End-to-end import job: CSV → download → store → hooks, one row at a time.

use std::path::PathBuf;
use std::time::Instant;

use mediaimport_shared::{MediaId, Metadata, Result};
use tracing::{info, instrument, warn};

use crate::hooks::{FnHook, HookDispatcher, UploadHook};
use crate::importer::Importer;
use crate::reader::CsvRows;
use crate::report::{ImportReport, ImportResult, RowFailure};
use crate::store::MediaStore;

/// Progress callback for reporting job status.
pub trait ImportProgress: Send + Sync {
    /// Called before a row is processed.
    fn row_started(&self, line: u64, url: &str);
    /// Called after a row is processed.
    fn row_finished(&self, result: &ImportResult);
    /// Called when the job completes.
    fn done(&self, report: &ImportReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ImportProgress for SilentProgress {
    fn row_started(&self, _line: u64, _url: &str) {}
    fn row_finished(&self, _result: &ImportResult) {}
    fn done(&self, _report: &ImportReport) {}
}

/// Builder for a CSV media import.
///
/// ```no_run
/// # use mediaimport_core::job::ImportJob;
/// # async fn demo(store: &mediaimport_core::LibraryMediaStore) -> mediaimport_shared::Result<()> {
/// let report = ImportJob::new()
///     .from_source("images.csv")
///     .on_upload_fn("log", |id, metadata| {
///         println!("{id}: {metadata:?}");
///         Ok(())
///     })
///     .run(store)
///     .await?;
/// println!("{} imported", report.succeeded());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ImportJob {
    source: Option<PathBuf>,
    hooks: HookDispatcher,
}

impl ImportJob {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the CSV file to import.
    pub fn from_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Append an upload hook. Each call adds one hook; they run in call order.
    pub fn on_upload(mut self, hook: impl UploadHook + 'static) -> Self {
        self.hooks.register(Box::new(hook));
        self
    }

    /// Append a closure as an upload hook.
    pub fn on_upload_fn<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&MediaId, &Metadata) -> Result<()> + Send + Sync + 'static,
    {
        self.on_upload(FnHook::new(name, f))
    }

    /// Run the job against `store`.
    ///
    /// Returns an empty report when no source is set. Fails only when the CSV
    /// cannot be opened or has no `src` column; row failures are reported in
    /// the returned [`ImportReport`].
    pub async fn run<S: MediaStore + ?Sized>(&self, store: &S) -> Result<ImportReport> {
        self.run_with_progress(store, &SilentProgress).await
    }

    /// Like [`run`](Self::run), reporting per-row progress.
    #[instrument(skip_all, fields(source = ?self.source))]
    pub async fn run_with_progress<S: MediaStore + ?Sized>(
        &self,
        store: &S,
        progress: &dyn ImportProgress,
    ) -> Result<ImportReport> {
        let Some(source) = &self.source else {
            warn!("no CSV source set, nothing to import");
            return Ok(ImportReport::default());
        };

        let start = Instant::now();
        let rows = CsvRows::open(source)?;

        info!(hooks = self.hooks.len(), "starting import");

        let importer = Importer::new(store, &self.hooks);
        let mut results = Vec::new();

        for row in rows {
            let result = match row {
                Ok(row) => {
                    progress.row_started(row.line, &row.url);
                    importer.import_row(&row).await
                }
                Err(e) => {
                    let line = match &e {
                        mediaimport_shared::MediaImportError::Csv { line, .. } => *line,
                        _ => 0,
                    };
                    warn!(line, error = %e, "skipping malformed CSV record");
                    ImportResult::failed(line, String::new(), RowFailure::MalformedRow)
                }
            };
            progress.row_finished(&result);
            results.push(result);
        }

        let report = ImportReport {
            results,
            elapsed: start.elapsed(),
        };

        let imported = report.succeeded();
        info!(
            imported,
            failed = report.failed(),
            elapsed_ms = report.elapsed.as_millis(),
            "{imported} media items imported"
        );

        progress.done(&report);
        Ok(report)
    }
}
