//! Local media library: HTTP downloads into `tmp/`, files promoted into
//! `files/<YYYY>/<MM>/`, records kept in the libSQL [`Storage`].

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use reqwest::Client;
use reqwest::redirect::Policy;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use url::Url;

use mediaimport_shared::{
    DescriptiveFields, LibraryConfig, MediaId, MediaImportError, MediaRecord, Metadata, Result,
};
use mediaimport_storage::Storage;

use crate::mime;
use crate::store::{MediaStore, StoreRejection, TempResource, Upload};

/// User-Agent string for download requests.
const USER_AGENT: &str = concat!("MediaImport/", env!("CARGO_PKG_VERSION"));

/// [`MediaStore`] backed by a directory on disk and a libSQL database.
pub struct LibraryMediaStore {
    config: LibraryConfig,
    client: Client,
    storage: Storage,
}

impl LibraryMediaStore {
    /// Open (or create) the library described by `config`.
    pub async fn open(config: LibraryConfig) -> Result<Self> {
        for dir in [config.files_dir(), config.tmp_dir()] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| MediaImportError::io(&dir, e))?;
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(config.max_redirects, config.allow_private_hosts))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MediaImportError::Network(format!("failed to build HTTP client: {e}")))?;

        let storage = Storage::open(&config.db_path()).await?;

        info!(root = %config.root.display(), "opened media library");

        Ok(Self {
            config,
            client,
            storage,
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Copy the temp file into the library and insert its record.
    async fn promote(&self, upload: &Upload, metadata: &Metadata) -> Result<MediaId> {
        validate_filename(&upload.filename)?;

        let now = Utc::now();
        let relative_dir = PathBuf::from("files")
            .join(format!("{:04}", now.year()))
            .join(format!("{:02}", now.month()));
        let dir = self.config.root.join(&relative_dir);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| MediaImportError::io(&dir, e))?;

        let filename = unique_filename(&dir, &upload.filename).await;
        let dest = dir.join(&filename);

        let content_hash = hash_file(upload.temp.path()).await?;
        let mime_type = mime::sniff_file(upload.temp.path())
            .await?
            .or_else(|| upload.temp.content_type().map(String::from));

        link_or_copy(upload.temp.path(), &dest).await?;

        let record = MediaRecord {
            id: MediaId::new(),
            filename: filename.clone(),
            path: relative_dir.join(&filename).to_string_lossy().replace('\\', "/"),
            source_url: upload.source_url.clone(),
            mime_type,
            content_hash,
            size: upload.temp.size(),
            alt_text: None,
            caption: None,
            description: None,
            metadata: metadata.clone(),
            created_at: now,
        };

        if let Err(e) = self.storage.insert_media(&record).await {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(e);
        }

        debug!(id = %record.id, path = %record.path, "stored media item");
        Ok(record.id)
    }
}

#[async_trait]
impl MediaStore for LibraryMediaStore {
    async fn download(&self, url: &str) -> Result<TempResource> {
        let parsed = Url::parse(url)
            .map_err(|e| MediaImportError::validation(format!("invalid URL '{url}': {e}")))?;
        check_target(&parsed, self.config.allow_private_hosts)?;

        debug!(%url, "downloading");

        let mut response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| MediaImportError::Network(format!("{url}: {}", error_chain(&e))))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MediaImportError::Network(format!("{url}: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let tmp_dir = self.config.tmp_dir();
        let (file, temp_path) = tempfile::Builder::new()
            .prefix("download-")
            .tempfile_in(&tmp_dir)
            .map_err(|e| MediaImportError::io(&tmp_dir, e))?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);

        let mut size: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MediaImportError::Network(format!("{url}: body read failed: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| MediaImportError::io(temp_path.to_path_buf(), e))?;
            size += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| MediaImportError::io(temp_path.to_path_buf(), e))?;

        debug!(%url, size, content_type = ?content_type, "download complete");
        Ok(TempResource::new(temp_path, content_type, size))
    }

    async fn store(
        &self,
        upload: Upload,
        metadata: &Metadata,
    ) -> std::result::Result<MediaId, StoreRejection> {
        let promoted = self.promote(&upload, metadata).await;
        match promoted {
            Ok(id) => {
                if let Err(e) = upload.temp.delete() {
                    warn!(error = %e, "failed to remove promoted temp file");
                }
                Ok(id)
            }
            Err(error) => Err(StoreRejection { upload, error }),
        }
    }

    async fn set_accessible_text(&self, id: &MediaId, text: &str) -> Result<()> {
        self.storage.set_alt_text(id, text).await
    }

    async fn update_descriptive_fields(
        &self,
        id: &MediaId,
        fields: &DescriptiveFields,
    ) -> Result<()> {
        self.storage.update_descriptive_fields(id, fields).await
    }

    async fn delete_temp(&self, temp: TempResource) -> Result<()> {
        temp.delete()
    }
}

/// Render an error with its sources, e.g. a redirect refusal inside a reqwest error.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Reject names that could escape the target directory.
fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
    {
        return Err(MediaImportError::validation(format!(
            "invalid filename '{name}'"
        )));
    }
    Ok(())
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// First free name in `dir`: `name.ext`, then `name-1.ext`, `name-2.ext`, …
async fn unique_filename(dir: &Path, filename: &str) -> String {
    if !exists(&dir.join(filename)).await {
        return filename.to_string();
    }

    let (stem, ext) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    for n in 1u32.. {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if !exists(&dir.join(&candidate)).await {
            return candidate;
        }
    }
    filename.to_string()
}

/// Hard-link `src` to `dest`, falling back to a copy across filesystems.
async fn link_or_copy(src: &Path, dest: &Path) -> Result<()> {
    if tokio::fs::hard_link(src, dest).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(src, dest)
        .await
        .map(|_| ())
        .map_err(|e| MediaImportError::io(dest, e))
}

/// Compute the SHA-256 hash of a file.
async fn hash_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| MediaImportError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 8192];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| MediaImportError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

// ---------------------------------------------------------------------------
// Private host protection
// ---------------------------------------------------------------------------

/// Reject non-HTTP schemes and, unless allowed, private hosts.
fn check_target(url: &Url, allow_private_hosts: bool) -> Result<()> {
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(MediaImportError::validation(format!(
                "unsupported URL scheme '{other}': {url}"
            )));
        }
    }
    if !allow_private_hosts && is_private_target(url) {
        return Err(MediaImportError::validation(format!(
            "refusing to download from private host: {url}"
        )));
    }
    Ok(())
}

/// Decide whether to follow a redirect to `next` after `hops` earlier redirects.
fn check_redirect(
    next: &Url,
    hops: usize,
    max_redirects: usize,
    allow_private_hosts: bool,
) -> Result<()> {
    if hops > max_redirects {
        return Err(MediaImportError::Network(format!(
            "too many redirects (max {max_redirects})"
        )));
    }
    check_target(next, allow_private_hosts)
}

/// Redirect policy that re-checks every hop against the target rules.
fn redirect_policy(max_redirects: usize, allow_private_hosts: bool) -> Policy {
    Policy::custom(move |attempt| {
        let hops = attempt.previous().len();
        match check_redirect(attempt.url(), hops, max_redirects, allow_private_hosts) {
            Ok(()) => attempt.follow(),
            Err(e) => attempt.error(e),
        }
    })
}

/// Check if a URL targets a loopback, private, or local-only host.
fn is_private_target(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_private_ip(&IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 (unique local)
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 (link local)
                || (first & 0xffc0) == 0xfe80
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::PNG_BYTES;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(root: &Path) -> LibraryConfig {
        LibraryConfig {
            root: root.to_path_buf(),
            timeout_secs: 5,
            max_redirects: 2,
            allow_private_hosts: true,
        }
    }

    #[test]
    fn private_targets() {
        let blocked = [
            "http://127.0.0.1:8080/a.png",
            "http://192.168.1.1/a.png",
            "http://10.0.0.1/a.png",
            "http://localhost:3000/a.png",
            "http://[::1]/a.png",
            "http://printer.local/a.png",
            "http://[::ffff:127.0.0.1]/a.png",
            "http://[::ffff:10.1.2.3]/a.png",
            "http://[fd00::1]/a.png",
            "http://[fe80::1]/a.png",
        ];
        for url in blocked {
            assert!(is_private_target(&Url::parse(url).unwrap()), "{url}");
        }
        assert!(!is_private_target(
            &Url::parse("https://cdn.example.com/a.png").unwrap()
        ));
        assert!(!is_private_target(
            &Url::parse("http://[2606:4700::1111]/a.png").unwrap()
        ));
    }

    #[test]
    fn redirects_are_rechecked_per_hop() {
        let public = Url::parse("https://cdn.example.com/a.png").unwrap();
        let loopback = Url::parse("http://127.0.0.1:8080/secret.png").unwrap();

        assert!(check_redirect(&public, 1, 2, false).is_ok());
        let err = check_redirect(&loopback, 1, 2, false).unwrap_err();
        assert!(err.to_string().contains("private host"));
        assert!(check_redirect(&loopback, 1, 2, true).is_ok());

        let err = check_redirect(&public, 3, 2, false).unwrap_err();
        assert!(err.to_string().contains("too many redirects"));
        let ftp = Url::parse("ftp://cdn.example.com/a.png").unwrap();
        assert!(check_redirect(&ftp, 1, 2, true).is_err());
    }

    #[tokio::test]
    async fn filenames_are_made_unique() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(unique_filename(dir.path(), "photo.png").await, "photo.png");

        std::fs::write(dir.path().join("photo.png"), b"1").unwrap();
        assert_eq!(unique_filename(dir.path(), "photo.png").await, "photo-1.png");

        std::fs::write(dir.path().join("photo-1.png"), b"2").unwrap();
        assert_eq!(unique_filename(dir.path(), "photo.png").await, "photo-2.png");

        std::fs::write(dir.path().join("README"), b"3").unwrap();
        assert_eq!(unique_filename(dir.path(), "README").await, "README-1");
    }

    #[test]
    fn unsafe_filenames_rejected() {
        assert!(validate_filename("photo.png").is_ok());
        for bad in ["", ".", "..", "a/b.png", "a\\b.png"] {
            assert!(validate_filename(bad).is_err(), "{bad:?}");
        }
    }

    #[tokio::test]
    async fn hash_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("hello.txt");
        std::fs::write(&file, b"hello world").unwrap();
        assert_eq!(
            hash_file(&file).await.unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[tokio::test]
    async fn download_and_store_promotes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photo.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(PNG_BYTES),
            )
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let store = LibraryMediaStore::open(test_config(root.path())).await.unwrap();

        let url = format!("{}/photo.png", server.uri());
        let temp = store.download(&url).await.expect("download");
        assert_eq!(temp.size(), PNG_BYTES.len() as u64);
        assert_eq!(temp.content_type(), Some("image/png"));
        let temp_path = temp.path().to_path_buf();
        assert!(temp_path.starts_with(root.path().join("tmp")));

        let metadata = Metadata::from([("alt".to_string(), "Sunset".to_string())]);
        let upload = Upload {
            filename: "photo.png".into(),
            source_url: url.clone(),
            temp,
        };
        let id = store.store(upload, &metadata).await.expect("store");
        assert!(!temp_path.exists());

        store.set_accessible_text(&id, "Sunset").await.unwrap();
        let record = store.storage().get_media(&id).await.unwrap().expect("record");
        assert_eq!(record.filename, "photo.png");
        assert_eq!(record.source_url, url);
        assert_eq!(record.mime_type.as_deref(), Some("image/png"));
        assert_eq!(record.alt_text.as_deref(), Some("Sunset"));
        assert_eq!(record.metadata, metadata);
        assert!(root.path().join(&record.path).exists());
    }

    #[tokio::test]
    async fn same_name_twice_gets_suffix() {
        let server = MockServer::start().await;
        Mock::given(path("/photo.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let store = LibraryMediaStore::open(test_config(root.path())).await.unwrap();
        let url = format!("{}/photo.png", server.uri());

        let mut names = Vec::new();
        for _ in 0..2 {
            let temp = store.download(&url).await.unwrap();
            let upload = Upload {
                filename: "photo.png".into(),
                source_url: url.clone(),
                temp,
            };
            let id = store.store(upload, &Metadata::new()).await.unwrap();
            names.push(store.storage().get_media(&id).await.unwrap().unwrap().filename);
        }
        assert_eq!(names, vec!["photo.png".to_string(), "photo-1.png".to_string()]);
        assert_eq!(store.storage().count_media().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn non_success_status_fails_download() {
        let server = MockServer::start().await;
        Mock::given(path("/gone.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let store = LibraryMediaStore::open(test_config(root.path())).await.unwrap();
        let err = store
            .download(&format!("{}/gone.png", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn private_hosts_blocked_by_default() {
        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.allow_private_hosts = false;
        let store = LibraryMediaStore::open(config).await.unwrap();

        let err = store.download("http://127.0.0.1:9/a.png").await.unwrap_err();
        assert!(err.to_string().contains("private host"));
        let err = store.download("file:///etc/passwd").await.unwrap_err();
        assert!(err.to_string().contains("scheme"));
        let err = store.download("not a url").await.unwrap_err();
        assert!(err.to_string().contains("invalid URL"));
    }

    #[tokio::test]
    async fn mapped_loopback_host_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(path("/secret.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"SECRET".to_vec()))
            .mount(&server)
            .await;
        let port = server.address().port();

        let root = tempfile::tempdir().unwrap();
        let mut config = test_config(root.path());
        config.allow_private_hosts = false;
        let store = LibraryMediaStore::open(config).await.unwrap();

        for host in ["[::ffff:127.0.0.1]", "[::1]", "127.0.0.1"] {
            let err = store
                .download(&format!("http://{host}:{port}/secret.png"))
                .await
                .unwrap_err();
            assert!(err.to_string().contains("private host"), "{host}");
        }
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn redirect_chain_stops_at_limit() {
        let server = MockServer::start().await;
        for (from, to) in [("/a", "/b"), ("/b", "/c"), ("/c", "/d")] {
            Mock::given(path(from))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("location", format!("{}{to}", server.uri()).as_str()),
                )
                .mount(&server)
                .await;
        }
        Mock::given(path("/d"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(PNG_BYTES))
            .mount(&server)
            .await;

        let root = tempfile::tempdir().unwrap();
        let store = LibraryMediaStore::open(test_config(root.path())).await.unwrap();

        let err = store
            .download(&format!("{}/a", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("too many redirects"), "{err}");
        let ok = store.download(&format!("{}/b", server.uri())).await.unwrap();
        assert_eq!(ok.size(), PNG_BYTES.len() as u64);
    }

    #[tokio::test]
    async fn invalid_filename_is_rejected_with_upload_returned() {
        let root = tempfile::tempdir().unwrap();
        let store = LibraryMediaStore::open(test_config(root.path())).await.unwrap();

        let mut file = tempfile::NamedTempFile::new_in(root.path().join("tmp")).unwrap();
        file.write_all(PNG_BYTES).unwrap();
        let temp = TempResource::new(file.into_temp_path(), None, PNG_BYTES.len() as u64);
        let upload = Upload {
            filename: "..".into(),
            source_url: "https://example.com/..".into(),
            temp,
        };

        let rejection = store.store(upload, &Metadata::new()).await.unwrap_err();
        assert!(rejection.upload.temp.path().exists());
        store.delete_temp(rejection.upload.temp).await.unwrap();
        assert_eq!(store.storage().count_media().await.unwrap(), 0);
    }
}
