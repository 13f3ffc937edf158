//! libSQL storage layer for the local media library.
//!
//! The [`Storage`] struct wraps a libSQL database holding media item records,
//! their descriptive fields, and hook-assigned tags. File bytes live next to
//! the database under the library's `files/` directory; only paths are stored.
//!
//! **Access rules:**
//! - Importer: read-write via [`Storage::open`]
//! - Listing/reporting: read-only via [`Storage::open_readonly`]

mod migrations;

use std::path::Path;

use libsql::{Connection, Database, params};
use mediaimport_shared::{
    DescriptiveFields, MediaId, MediaImportError, MediaRecord, Metadata, Result,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

fn storage_err(e: impl std::fmt::Display) -> MediaImportError {
    MediaImportError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MediaImportError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(MediaImportError::not_found(path, "media library database"));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;

        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        MediaImportError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(MediaImportError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Media operations
    // -----------------------------------------------------------------------

    /// Insert a new media record.
    pub async fn insert_media(&self, media: &MediaRecord) -> Result<()> {
        self.check_writable()?;
        let metadata_json = serde_json::to_string(&media.metadata).map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT INTO media (id, filename, path, source_url, mime_type, content_hash, size,
                                    alt_text, caption, description, metadata_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    media.id.to_string(),
                    media.filename.as_str(),
                    media.path.as_str(),
                    media.source_url.as_str(),
                    media.mime_type.as_deref(),
                    media.content_hash.as_str(),
                    media.size as i64,
                    media.alt_text.as_deref(),
                    media.caption.as_deref(),
                    media.description.as_deref(),
                    metadata_json,
                    media.created_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Get a media record by ID.
    pub async fn get_media(&self, id: &MediaId) -> Result<Option<MediaRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, filename, path, source_url, mime_type, content_hash, size,
                        alt_text, caption, description, metadata_json, created_at
                 FROM media WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_media(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// List all media records, oldest first.
    pub async fn list_media(&self) -> Result<Vec<MediaRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, filename, path, source_url, mime_type, content_hash, size,
                        alt_text, caption, description, metadata_json, created_at
                 FROM media ORDER BY created_at, id",
                params![],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row_to_media(&row)?);
        }
        Ok(results)
    }

    /// Number of stored media records.
    pub async fn count_media(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM media", params![])
            .await
            .map_err(storage_err)?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).map_err(storage_err)? as u64),
            Ok(None) => Ok(0),
            Err(e) => Err(storage_err(e)),
        }
    }

    /// Set the accessible (alt) text of a media item.
    pub async fn set_alt_text(&self, id: &MediaId, alt_text: &str) -> Result<()> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "UPDATE media SET alt_text = ?1 WHERE id = ?2",
                params![alt_text, id.to_string()],
            )
            .await
            .map_err(storage_err)?;
        ensure_found(changed, id)
    }

    /// Update caption and/or description in a single statement.
    ///
    /// `None` fields keep their stored value.
    pub async fn update_descriptive_fields(
        &self,
        id: &MediaId,
        fields: &DescriptiveFields,
    ) -> Result<()> {
        self.check_writable()?;
        let changed = self
            .conn
            .execute(
                "UPDATE media SET
                   caption = COALESCE(?1, caption),
                   description = COALESCE(?2, description)
                 WHERE id = ?3",
                params![
                    fields.caption.as_deref(),
                    fields.description.as_deref(),
                    id.to_string()
                ],
            )
            .await
            .map_err(storage_err)?;
        ensure_found(changed, id)
    }

    // -----------------------------------------------------------------------
    // Tag operations
    // -----------------------------------------------------------------------

    /// Attach `tag` to a media item, creating the tag on first use.
    pub async fn tag_media(&self, id: &MediaId, tag: &str) -> Result<()> {
        self.check_writable()?;
        if tag.trim().is_empty() {
            return Err(MediaImportError::validation("tag name is empty"));
        }
        if self.get_media(id).await?.is_none() {
            return Err(MediaImportError::Storage(format!("media {id} not found")));
        }

        self.conn
            .execute(
                "INSERT OR IGNORE INTO tags (name) VALUES (?1)",
                params![tag],
            )
            .await
            .map_err(storage_err)?;
        self.conn
            .execute(
                "INSERT OR IGNORE INTO media_tags (media_id, tag) VALUES (?1, ?2)",
                params![id.to_string(), tag],
            )
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    /// Tags attached to a media item, sorted by name.
    pub async fn tags_for_media(&self, id: &MediaId) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT tag FROM media_tags WHERE media_id = ?1 ORDER BY tag",
                params![id.to_string()],
            )
            .await
            .map_err(storage_err)?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(row.get::<String>(0).map_err(storage_err)?);
        }
        Ok(results)
    }
}

fn ensure_found(changed: u64, id: &MediaId) -> Result<()> {
    if changed == 0 {
        return Err(MediaImportError::Storage(format!("media {id} not found")));
    }
    Ok(())
}

/// Convert a database row to a [`MediaRecord`].
fn row_to_media(row: &libsql::Row) -> Result<MediaRecord> {
    let id: String = row.get(0).map_err(storage_err)?;
    let metadata_json: String = row.get(10).map_err(storage_err)?;
    let metadata: Metadata = serde_json::from_str(&metadata_json)
        .map_err(|e| MediaImportError::Storage(format!("invalid metadata json: {e}")))?;

    Ok(MediaRecord {
        id: id
            .parse()
            .map_err(|e| MediaImportError::Storage(format!("invalid media id {id}: {e}")))?,
        filename: row.get::<String>(1).map_err(storage_err)?,
        path: row.get::<String>(2).map_err(storage_err)?,
        source_url: row.get::<String>(3).map_err(storage_err)?,
        mime_type: row.get::<String>(4).ok(),
        content_hash: row.get::<String>(5).map_err(storage_err)?,
        size: row.get::<i64>(6).map_err(storage_err)? as u64,
        alt_text: row.get::<String>(7).ok(),
        caption: row.get::<String>(8).ok(),
        description: row.get::<String>(9).ok(),
        metadata,
        created_at: {
            let s: String = row.get(11).map_err(storage_err)?;
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .map_err(|e| MediaImportError::Storage(format!("invalid date: {e}")))?
        },
    })
}
