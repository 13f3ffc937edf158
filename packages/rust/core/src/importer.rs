//! Per-row import: download, resolve extension, store, apply metadata, run hooks.

use mediaimport_shared::{DescriptiveFields, MediaId, Metadata};
use tracing::{debug, warn};
use url::Url;

use crate::hooks::HookDispatcher;
use crate::mime;
use crate::reader::CsvRow;
use crate::report::{ImportResult, RowFailure};
use crate::store::{MediaStore, Upload};

/// Basename used when the URL path has no usable segment.
const FALLBACK_BASENAME: &str = "download";

/// Filename parts derived from a URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    /// Last non-empty path segment, extension included.
    pub basename: String,
    /// Suffix after the final `.`, when present and non-empty.
    pub extension: Option<String>,
}

impl TargetName {
    /// Derive the target name from `url`.
    pub fn from_url(url: &str) -> Self {
        let basename = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(String::from))
            })
            .unwrap_or_else(|| FALLBACK_BASENAME.to_string());

        let extension = match basename.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext.to_string()),
            _ => None,
        };

        Self {
            basename,
            extension,
        }
    }

    /// Final filename, appending `resolved` when the URL carried no extension.
    pub fn with_extension(&self, resolved: &str) -> String {
        format!("{}.{resolved}", self.basename)
    }
}

/// Imports single rows through a [`MediaStore`], then fires the hooks.
pub struct Importer<'a, S: MediaStore + ?Sized> {
    store: &'a S,
    hooks: &'a HookDispatcher,
}

impl<'a, S: MediaStore + ?Sized> Importer<'a, S> {
    pub fn new(store: &'a S, hooks: &'a HookDispatcher) -> Self {
        Self { store, hooks }
    }

    /// Import one row. Every failure is confined to the row.
    pub async fn import_row(&self, row: &CsvRow) -> ImportResult {
        let temp = match self.store.download(&row.url).await {
            Ok(temp) => temp,
            Err(e) => {
                debug!(url = %row.url, error = %e, "download error");
                return fail(row, RowFailure::DownloadFailed);
            }
        };

        let target = TargetName::from_url(&row.url);
        let filename = match &target.extension {
            Some(_) => target.basename.clone(),
            None => {
                let sniffed = match mime::sniff_file(temp.path()).await {
                    Ok(sniffed) => sniffed,
                    Err(e) => {
                        debug!(url = %row.url, error = %e, "could not sniff download");
                        None
                    }
                };
                match sniffed.as_deref().and_then(mime::extension_for_mime) {
                    Some(ext) => {
                        debug!(url = %row.url, mime = ?sniffed, ext, "resolved extension from content");
                        target.with_extension(ext)
                    }
                    None => {
                        debug!(url = %row.url, mime = ?sniffed, "mime type not in allow-list");
                        if let Err(e) = self.store.delete_temp(temp).await {
                            warn!(url = %row.url, error = %e, "failed to delete temporary download");
                        }
                        return fail(row, RowFailure::UnresolvableExtension);
                    }
                }
            }
        };

        let upload = Upload {
            filename: filename.clone(),
            source_url: row.url.clone(),
            temp,
        };

        let media_id = match self.store.store(upload, &row.metadata).await {
            Ok(id) => id,
            Err(rejection) => {
                debug!(url = %row.url, error = %rejection.error, "store rejected upload");
                if let Err(e) = self.store.delete_temp(rejection.upload.temp).await {
                    warn!(url = %row.url, error = %e, "failed to delete temporary download");
                }
                return fail(row, RowFailure::StoreRejected);
            }
        };

        self.apply_metadata(&row.url, &media_id, &row.metadata).await;

        let hook_errors = self.hooks.dispatch(&row.url, &media_id, &row.metadata).await;

        debug!(url = %row.url, %media_id, %filename, "imported");
        ImportResult::imported(row.line, row.url.clone(), media_id, filename, hook_errors)
    }

    /// Apply `alt`, `caption` and `description` from the row, when non-empty.
    async fn apply_metadata(&self, url: &str, media_id: &MediaId, metadata: &Metadata) {
        if let Some(alt) = metadata.get("alt").filter(|v| !v.is_empty()) {
            if let Err(e) = self.store.set_accessible_text(media_id, alt).await {
                warn!(url, %media_id, error = %e, "failed to set accessible text");
            }
        }

        let fields = DescriptiveFields::from_metadata(metadata);
        if !fields.is_empty() {
            if let Err(e) = self.store.update_descriptive_fields(media_id, &fields).await {
                warn!(url, %media_id, error = %e, "failed to update caption/description");
            }
        }
    }
}

fn fail(row: &CsvRow, reason: RowFailure) -> ImportResult {
    warn!(url = %row.url, %reason, "Failed to import image from URL: {}", row.url);
    ImportResult::failed(row.line, row.url.clone(), reason)
}
