//! Configuration loading and store path resolution
//!
//! Two tiers:
//! 1. **TOML bootstrap**: store location, logging, retry budget, annotation
//!    namespace conventions, tag database location
//! 2. **Command line / environment**: overrides applied by the binaries
//!
//! A missing TOML file is not an error: it is reported as
//! [`ConfigOrigin::Missing`] and compiled defaults are used. A TOML file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MINKV_CONFIG";

/// Environment variable naming the annotation store database
pub const STORE_DB_ENV_VAR: &str = "MINKV_STORE_DB";

/// Environment variable carrying the tag database connection URL
pub const TAGDB_URL_ENV_VAR: &str = "MINKV_TAGDB_URL";

/// Namespace written for unnamespaced key-value groups
pub const CLIENT_MAP_NAMESPACE: &str = "openmicroscopy.org/omero/client/mapAnnotation";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Annotation store location
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Bounded retry for the delete primitive
    #[serde(default)]
    pub retry: RetryConfig,

    /// Namespace conventions used when writing annotations
    #[serde(default)]
    pub annotate: AnnotateConfig,

    /// External tag database (only needed by the tag job)
    #[serde(default)]
    pub tag_database: Option<TagDatabaseConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    /// Path to SQLite annotation store
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Polling budget for delete operations
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Number of attempts before the failure is surfaced
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    /// Fixed sleep between attempts
    #[serde(default = "default_retry_interval_ms")]
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            interval_ms: default_retry_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotateConfig {
    /// Namespace stored for the default (unnamespaced) key-value group
    #[serde(default = "default_namespace")]
    pub default_namespace: String,

    /// Prefix marking namespaces owned by the namespaced tag output.
    /// Only namespaces carrying it are removed when they vanish upstream.
    #[serde(default = "default_managed_prefix")]
    pub managed_prefix: String,

    /// Prefix of tag-database parents that denote "no real parent tag"
    #[serde(default = "default_single_tag_prefix")]
    pub single_tag_prefix: String,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            default_namespace: default_namespace(),
            managed_prefix: default_managed_prefix(),
            single_tag_prefix: default_single_tag_prefix(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagDatabaseConfig {
    /// Connection URL of the tag database
    #[serde(default)]
    pub url: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_retry_attempts() -> u32 {
    10
}

fn default_retry_interval_ms() -> u64 {
    500
}

fn default_namespace() -> String {
    CLIENT_MAP_NAMESPACE.to_string()
}

fn default_managed_prefix() -> String {
    "mapr_".to_string()
}

fn default_single_tag_prefix() -> String {
    "_".to_string()
}

/// Locate the config file
///
/// Priority: explicit path → `MINKV_CONFIG` → `<config dir>/minkv/config.toml`.
/// Returns `None` when no candidate exists on disk (explicit paths are
/// returned even if missing so the caller can report them).
pub fn resolve_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("minkv").join("config.toml"))
        .filter(|p| p.exists())
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    /// Named file does not exist; compiled defaults in use
    Missing(PathBuf),
    Defaults,
}

impl ConfigOrigin {
    /// Report the origin; call once the tracing subscriber is installed
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigOrigin::Missing(path) => warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            ),
            ConfigOrigin::Defaults => info!("No config file, using built-in defaults"),
        }
    }
}

/// Load config from the resolved location, falling back to defaults
///
/// Logging is left to the caller through [`ConfigOrigin::log`], since the
/// subscriber is usually configured from the loaded values.
pub fn load_config(cli_path: Option<&Path>) -> Result<(TomlConfig, ConfigOrigin)> {
    match resolve_config_path(cli_path) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            Ok((config, ConfigOrigin::File(path)))
        }
        Some(path) => Ok((TomlConfig::default(), ConfigOrigin::Missing(path))),
        None => Ok((TomlConfig::default(), ConfigOrigin::Defaults)),
    }
}

/// Resolve the annotation store path
///
/// Priority: command line → `MINKV_STORE_DB` → TOML → OS default.
pub fn resolve_store_path(cli_path: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(STORE_DB_ENV_VAR) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.store.database_path {
        return path.clone();
    }

    default_store_path()
}

/// OS-dependent default store location
pub fn default_store_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("minkv"))
        .unwrap_or_else(|| PathBuf::from("./minkv_data"))
        .join("annotations.db")
}

/// Resolve the tag database URL
///
/// Priority: command line → `MINKV_TAGDB_URL` → TOML.
pub fn resolve_tagdb_url(cli_url: Option<&str>, config: &TomlConfig) -> Result<String> {
    if let Some(url) = cli_url.filter(|u| !u.trim().is_empty()) {
        return Ok(url.to_string());
    }

    if let Ok(url) = std::env::var(TAGDB_URL_ENV_VAR) {
        if !url.trim().is_empty() {
            return Ok(url);
        }
    }

    config
        .tag_database
        .as_ref()
        .and_then(|t| t.url.clone())
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "Tag database not configured. Use one of:\n\
                 1. Command line: --tagdb-url <URL>\n\
                 2. Environment: {}=<URL>\n\
                 3. TOML config: [tag_database] url = \"<URL>\"",
                TAGDB_URL_ENV_VAR
            ))
        })
}
