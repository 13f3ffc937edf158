//! Per-row outcomes and the aggregate report returned by an import job.

use std::time::Duration;

use mediaimport_shared::MediaId;
use serde::Serialize;

/// Why a single row was not imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowFailure {
    DownloadFailed,
    UnresolvableExtension,
    StoreRejected,
    MalformedRow,
}

impl std::fmt::Display for RowFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::DownloadFailed => "download failed",
            Self::UnresolvableExtension => "unresolvable extension",
            Self::StoreRejected => "store rejected upload",
            Self::MalformedRow => "malformed row",
        };
        f.write_str(reason)
    }
}

/// Outcome of one row.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowOutcome {
    Imported {
        media_id: MediaId,
        filename: String,
        /// Messages from upload hooks that reported an error. The row still counts as imported.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        hook_errors: Vec<String>,
    },
    Failed {
        reason: RowFailure,
    },
}

/// Result for a single CSV row.
#[derive(Debug, Clone, Serialize)]
pub struct ImportResult {
    /// Record line in the CSV file (header is line 1).
    pub line: u64,
    pub url: String,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

impl ImportResult {
    pub fn imported(
        line: u64,
        url: impl Into<String>,
        media_id: MediaId,
        filename: String,
        hook_errors: Vec<String>,
    ) -> Self {
        Self {
            line,
            url: url.into(),
            outcome: RowOutcome::Imported {
                media_id,
                filename,
                hook_errors,
            },
        }
    }

    pub fn failed(line: u64, url: impl Into<String>, reason: RowFailure) -> Self {
        Self {
            line,
            url: url.into(),
            outcome: RowOutcome::Failed { reason },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RowOutcome::Imported { .. })
    }

    pub fn media_id(&self) -> Option<&MediaId> {
        match &self.outcome {
            RowOutcome::Imported { media_id, .. } => Some(media_id),
            RowOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<RowFailure> {
        match self.outcome {
            RowOutcome::Failed { reason } => Some(reason),
            RowOutcome::Imported { .. } => None,
        }
    }
}

/// Aggregate outcome of an [`ImportJob`](crate::job::ImportJob) run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub results: Vec<ImportResult>,
    pub elapsed: Duration,
}

impl ImportReport {
    /// Number of rows imported.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of rows that failed.
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Identifiers of every imported item, in row order.
    pub fn media_ids(&self) -> Vec<MediaId> {
        self.results
            .iter()
            .filter_map(|r| r.media_id().cloned())
            .collect()
    }
}
