//! The Media Store seam: everything the importer needs from a media library.

use std::path::Path;

use async_trait::async_trait;
use mediaimport_shared::{DescriptiveFields, MediaId, MediaImportError, Metadata, Result};
use tempfile::TempPath;

/// A downloaded file waiting to be stored.
///
/// The file is removed when the value is dropped, so every path that does not
/// hand it to [`MediaStore::store`] cleans up after itself.
#[derive(Debug)]
pub struct TempResource {
    path: TempPath,
    content_type: Option<String>,
    size: u64,
}

impl TempResource {
    pub fn new(path: TempPath, content_type: Option<String>, size: u64) -> Self {
        Self {
            path,
            content_type,
            size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `Content-Type` reported by the server, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Remove the file now, reporting any error instead of swallowing it on drop.
    pub fn delete(self) -> Result<()> {
        let path = self.path.to_path_buf();
        self.path
            .close()
            .map_err(|e| MediaImportError::io(path, e))
    }
}

/// A file handed to the store: target filename plus the downloaded content.
#[derive(Debug)]
pub struct Upload {
    pub filename: String,
    pub source_url: String,
    pub temp: TempResource,
}

/// Returned by [`MediaStore::store`] on failure. Gives the upload back so the
/// caller can clean up.
#[derive(Debug)]
pub struct StoreRejection {
    pub upload: Upload,
    pub error: MediaImportError,
}

impl std::fmt::Display for StoreRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "store rejected {}: {}", self.upload.filename, self.error)
    }
}

impl std::error::Error for StoreRejection {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Media library collaborator used by the [`Importer`](crate::importer::Importer).
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Download `url` into a temporary file.
    async fn download(&self, url: &str) -> Result<TempResource>;

    /// Store an upload permanently. On success the store owns the temp file.
    async fn store(
        &self,
        upload: Upload,
        metadata: &Metadata,
    ) -> std::result::Result<MediaId, StoreRejection>;

    /// Set the accessible (alt) text of a stored item.
    async fn set_accessible_text(&self, id: &MediaId, text: &str) -> Result<()>;

    /// Update caption and/or description of a stored item in one call.
    async fn update_descriptive_fields(
        &self,
        id: &MediaId,
        fields: &DescriptiveFields,
    ) -> Result<()>;

    /// Delete a temporary download that will not be stored.
    async fn delete_temp(&self, temp: TempResource) -> Result<()>;
}
