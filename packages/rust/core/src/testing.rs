//! In-memory [`MediaStore`] that records every call, for unit tests.

use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use mediaimport_shared::{DescriptiveFields, MediaId, MediaImportError, Metadata, Result};

use crate::store::{MediaStore, StoreRejection, TempResource, Upload};

/// A minimal PNG signature + IHDR chunk header.
pub(crate) const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Download(String),
    Store { filename: String, metadata: Metadata },
    SetAccessibleText(String),
    UpdateDescriptive(DescriptiveFields),
    DeleteTemp(PathBuf),
}

#[derive(Default)]
pub(crate) struct RecordingStore {
    bodies: HashMap<String, Vec<u8>>,
    rejected: HashSet<String>,
    calls: Mutex<Vec<Call>>,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make `url` downloadable with `body`. Unknown URLs fail to download.
    pub(crate) fn serve(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    /// Reject uploads stored under `filename`.
    pub(crate) fn reject(mut self, filename: &str) -> Self {
        self.rejected.insert(filename.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn stored_filenames(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Store { filename, .. } => Some(filename),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn downloads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Download(_)))
            .count()
    }

    pub(crate) fn deleted_temps(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::DeleteTemp(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl MediaStore for RecordingStore {
    async fn download(&self, url: &str) -> Result<TempResource> {
        self.record(Call::Download(url.to_string()));
        let body = self
            .bodies
            .get(url)
            .ok_or_else(|| MediaImportError::Network(format!("{url}: HTTP 404 Not Found")))?;

        let mut file = tempfile::NamedTempFile::new().map_err(|e| MediaImportError::io("tmp", e))?;
        file.write_all(body)
            .map_err(|e| MediaImportError::io(file.path(), e))?;
        Ok(TempResource::new(file.into_temp_path(), None, body.len() as u64))
    }

    async fn store(
        &self,
        upload: Upload,
        metadata: &Metadata,
    ) -> std::result::Result<MediaId, StoreRejection> {
        if self.rejected.contains(&upload.filename) {
            return Err(StoreRejection {
                upload,
                error: MediaImportError::Storage("rejected by test store".into()),
            });
        }
        self.record(Call::Store {
            filename: upload.filename.clone(),
            metadata: metadata.clone(),
        });
        Ok(MediaId::new())
    }

    async fn set_accessible_text(&self, _id: &MediaId, text: &str) -> Result<()> {
        self.record(Call::SetAccessibleText(text.to_string()));
        Ok(())
    }

    async fn update_descriptive_fields(
        &self,
        _id: &MediaId,
        fields: &DescriptiveFields,
    ) -> Result<()> {
        self.record(Call::UpdateDescriptive(fields.clone()));
        Ok(())
    }

    async fn delete_temp(&self, temp: TempResource) -> Result<()> {
        self.record(Call::DeleteTemp(temp.path().to_path_buf()));
        temp.delete()
    }
}
