//! CSV reader: validates the `src` header and yields rows lazily.

use std::fs::File;
use std::path::Path;

use mediaimport_shared::{MediaImportError, Metadata, Result};
use tracing::debug;

/// Name of the required URL column.
pub const SRC_COLUMN: &str = "src";

/// One parsed CSV record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    /// Record line in the file (header is line 1).
    pub line: u64,
    pub url: String,
    /// Every non-`src` column keyed by header name.
    pub metadata: Metadata,
}

/// Single-pass iterator over the rows of a CSV file.
///
/// Re-reading requires calling [`CsvRows::open`] again.
pub struct CsvRows {
    records: csv::StringRecordsIntoIter<File>,
    headers: Vec<String>,
    src_index: usize,
    next_line: u64,
}

impl std::fmt::Debug for CsvRows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvRows")
            .field("headers", &self.headers)
            .field("src_index", &self.src_index)
            .finish_non_exhaustive()
    }
}

impl CsvRows {
    /// Open `path` and read its header row.
    ///
    /// Fails with `NotFound` when the file is missing or unreadable, and with
    /// `Config("missing src column")` when no header is exactly `src`.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(MediaImportError::not_found(path, "no such CSV file"));
        }
        let file = File::open(path).map_err(|e| MediaImportError::not_found(path, e.to_string()))?;

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| MediaImportError::config(format!("unreadable header row: {e}")))?
            .iter()
            .map(String::from)
            .collect();

        let src_index = headers
            .iter()
            .position(|h| h == SRC_COLUMN)
            .ok_or_else(|| MediaImportError::config("missing src column"))?;

        debug!(path = %path.display(), ?headers, "opened CSV source");

        Ok(Self {
            records: reader.into_records(),
            headers,
            src_index,
            next_line: 2,
        })
    }

    fn to_row(&self, record: &csv::StringRecord, line: u64) -> CsvRow {
        let metadata = self
            .headers
            .iter()
            .enumerate()
            .filter(|(_, name)| name.as_str() != SRC_COLUMN)
            .map(|(i, name)| (name.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();

        CsvRow {
            line,
            url: record.get(self.src_index).unwrap_or_default().trim().to_string(),
            metadata,
        }
    }
}

impl Iterator for CsvRows {
    type Item = Result<CsvRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let fallback_line = self.next_line;
        self.next_line += 1;

        match self.records.next()? {
            Ok(record) => {
                let line = record
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                Some(Ok(self.to_row(&record, line)))
            }
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| p.line())
                    .unwrap_or(fallback_line);
                Some(Err(MediaImportError::Csv {
                    line,
                    message: e.to_string(),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp csv");
        file.write_all(content).expect("write csv");
        file.flush().expect("flush csv");
        file
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = CsvRows::open(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(matches!(err, MediaImportError::NotFound { .. }));
    }

    #[test]
    fn directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CsvRows::open(dir.path()).unwrap_err();
        assert!(matches!(err, MediaImportError::NotFound { .. }));
    }

    #[test]
    fn missing_src_is_config_error() {
        let file = csv_file(b"url,alt\nhttps://example.com/a.png,A\n");
        let err = CsvRows::open(file.path()).unwrap_err();
        assert_eq!(err.to_string(), "config error: missing src column");
    }

    #[test]
    fn src_match_is_case_sensitive() {
        let file = csv_file(b"Src,alt\nhttps://example.com/a.png,A\n");
        assert!(CsvRows::open(file.path()).is_err());
    }

    #[test]
    fn empty_file_is_config_error() {
        let file = csv_file(b"");
        let err = CsvRows::open(file.path()).unwrap_err();
        assert!(matches!(err, MediaImportError::Config { .. }));
    }

    #[test]
    fn rows_exclude_src_from_metadata() {
        let file = csv_file(
            b"alt,src,category\n\"Sunset, golden\",https://example.com/photo.png,travel\n",
        );
        let rows: Vec<CsvRow> = CsvRows::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].url, "https://example.com/photo.png");
        assert_eq!(rows[0].metadata.len(), 2);
        assert_eq!(rows[0].metadata["alt"], "Sunset, golden");
        assert_eq!(rows[0].metadata["category"], "travel");
        assert!(!rows[0].metadata.contains_key("src"));
    }

    #[test]
    fn repeated_src_header_stays_out_of_metadata() {
        let file = csv_file(
            b"src,alt,src\nhttps://example.com/a.png,A,https://example.com/b.png\n",
        );
        let row = CsvRows::open(file.path()).unwrap().next().unwrap().unwrap();

        assert_eq!(row.url, "https://example.com/a.png");
        assert_eq!(row.metadata.len(), 1);
        assert_eq!(row.metadata["alt"], "A");
        assert!(!row.metadata.contains_key("src"));
    }

    #[test]
    fn short_rows_fill_empty_and_long_rows_truncate() {
        let file = csv_file(
            b"src,alt,caption\nhttps://example.com/a.png\nhttps://example.com/b.png,B,Cap,extra\n",
        );
        let rows: Vec<CsvRow> = CsvRows::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(rows[0].metadata["alt"], "");
        assert_eq!(rows[0].metadata["caption"], "");
        assert_eq!(rows[1].metadata["caption"], "Cap");
        assert_eq!(rows[1].metadata.len(), 2);
        assert_eq!(rows[1].line, 3);
    }

    #[test]
    fn long_fields_are_accepted() {
        let long = "x".repeat(50_000);
        let content = format!("src,description\nhttps://example.com/a.png,{long}\n");
        let file = csv_file(content.as_bytes());
        let row = CsvRows::open(file.path()).unwrap().next().unwrap().unwrap();
        assert_eq!(row.metadata["description"].len(), 50_000);
    }

    #[test]
    fn undecodable_record_is_row_error() {
        let file = csv_file(b"src,alt\nhttps://example.com/a.png,\xff\xfe\nhttps://example.com/b.png,B\n");
        let mut rows = CsvRows::open(file.path()).unwrap();

        let first = rows.next().unwrap();
        assert!(matches!(first, Err(MediaImportError::Csv { .. })));
        let second = rows.next().unwrap().unwrap();
        assert_eq!(second.url, "https://example.com/b.png");
        assert!(rows.next().is_none());
    }
}
