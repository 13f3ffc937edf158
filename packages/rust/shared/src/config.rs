//! Application configuration for MediaImport.
//!
//! User config lives at `~/.mediaimport/mediaimport.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MediaImportError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "mediaimport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".mediaimport";

// ---------------------------------------------------------------------------
// Config structs (matching mediaimport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Media library location.
    #[serde(default)]
    pub library: LibrarySection,

    /// HTTP download settings.
    #[serde(default)]
    pub download: DownloadSection,
}

/// `[library]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySection {
    /// Root directory of the local media library (`~` is expanded).
    #[serde(default = "default_library_dir")]
    pub dir: String,
}

impl Default for LibrarySection {
    fn default() -> Self {
        Self {
            dir: default_library_dir(),
        }
    }
}

fn default_library_dir() -> String {
    "~/mediaimport-library".into()
}

/// `[download]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSection {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects followed per download.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Permit downloads from loopback/private hosts.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            allow_private_hosts: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Library config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime media library configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Library root. Holds `media.db`, `files/` and `tmp/`.
    pub root: PathBuf,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum redirects followed per download.
    pub max_redirects: usize,
    /// Permit downloads from loopback/private hosts.
    pub allow_private_hosts: bool,
}

impl LibraryConfig {
    /// Path of the library database.
    pub fn db_path(&self) -> PathBuf {
        self.root.join("media.db")
    }

    /// Directory that stored files are promoted into.
    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    /// Directory for in-flight downloads.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Replace the library root (e.g. from a `--library` flag).
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }
}

impl From<&AppConfig> for LibraryConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            root: expand_home(&config.library.dir),
            timeout_secs: config.download.timeout_secs,
            max_redirects: config.download.max_redirects,
            allow_private_hosts: config.download.allow_private_hosts,
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.mediaimport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| MediaImportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.mediaimport/mediaimport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| MediaImportError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        MediaImportError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| MediaImportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| MediaImportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| MediaImportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
