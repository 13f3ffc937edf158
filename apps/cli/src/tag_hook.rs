//! Upload hook that tags each imported item with the value of a CSV column.

use async_trait::async_trait;
use mediaimport_core::UploadHook;
use mediaimport_shared::{MediaId, MediaImportError, Metadata, Result};
use mediaimport_storage::Storage;

pub(crate) struct TagHook {
    storage: Storage,
    column: String,
    name: String,
}

impl TagHook {
    pub(crate) fn new(storage: Storage, column: impl Into<String>) -> Self {
        let column = column.into();
        Self {
            storage,
            name: format!("tag:{column}"),
            column,
        }
    }
}

#[async_trait]
impl UploadHook for TagHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_upload(&self, media_id: &MediaId, metadata: &Metadata) -> Result<()> {
        let tag = metadata
            .get(&self.column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                MediaImportError::validation(format!(
                    "term not found: column '{}' is empty",
                    self.column
                ))
            })?;

        self.storage.tag_media(media_id, tag).await?;
        tracing::debug!(%media_id, tag, "tagged media item");
        Ok(())
    }
}
