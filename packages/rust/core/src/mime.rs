//! Content sniffing and the MIME → extension allow-list.
//!
//! Only the MIME types listed in [`EXTENSION_ALLOW_LIST`] are trusted to name
//! a file extension. Anything else leaves the extension unresolved.

use std::path::Path;

use mediaimport_shared::{MediaImportError, Result};
use tokio::io::AsyncReadExt;

/// Bytes read from the head of a file for sniffing.
const SNIFF_LEN: usize = 64 * 1024;

/// Fixed MIME type → extension mapping.
pub const EXTENSION_ALLOW_LIST: &[(&str, &str)] = &[
    ("text/plain", "txt"),
    ("text/csv", "csv"),
    ("application/msword", "doc"),
    ("image/jpg", "jpg"),
    ("image/jpeg", "jpeg"),
    ("image/gif", "gif"),
    ("image/png", "png"),
    ("video/mp4", "mp4"),
];

/// Look up the extension for `mime`. Parameters such as `; charset=utf-8` are ignored.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    EXTENSION_ALLOW_LIST
        .iter()
        .find(|(m, _)| m.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// Sniff the MIME type of a byte sample.
///
/// Binary signatures come from `infer`. Content with no signature that decodes
/// as UTF-8 without NUL bytes is reported as `text/plain`. `truncated` marks
/// a sample cut from a longer file, where a trailing partial UTF-8 sequence is
/// tolerated.
pub fn sniff_mime(sample: &[u8], truncated: bool) -> Option<String> {
    if sample.is_empty() {
        return None;
    }
    if let Some(kind) = infer::get(sample) {
        return Some(kind.mime_type().to_string());
    }
    looks_like_text(sample, truncated).then(|| "text/plain".to_string())
}

/// Sniff the MIME type of the file at `path` from its leading bytes.
pub async fn sniff_file(path: &Path) -> Result<Option<String>> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| MediaImportError::io(path, e))?;
    let mut sample = Vec::with_capacity(8 * 1024);
    file.take(SNIFF_LEN as u64 + 1)
        .read_to_end(&mut sample)
        .await
        .map_err(|e| MediaImportError::io(path, e))?;

    let truncated = sample.len() > SNIFF_LEN;
    sample.truncate(SNIFF_LEN);
    Ok(sniff_mime(&sample, truncated))
}

fn looks_like_text(sample: &[u8], truncated: bool) -> bool {
    if sample.contains(&0) {
        return false;
    }
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        // An incomplete sequence at the very end of a truncated sample.
        Err(e) => truncated && e.error_len().is_none(),
    }
}
