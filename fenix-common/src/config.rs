//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are merged by the binaries' `clap` parsers (`#[arg(env)]`)
//! before they reach [`AdminConfig::resolve`], which only sees the merged
//! [`ConfigOverrides`] and the optional TOML file.
//!
//! A missing or unreadable TOML file never stops startup: it is logged and
//! the remaining tiers apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Default HTTP listen address
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";

/// Default bucket holding covers and page images
pub const DEFAULT_BUCKET: &str = "mangas";

/// Default S3 region (MinIO ignores it but request signing needs one)
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default session lifetime (7 days)
pub const DEFAULT_SESSION_TTL_HOURS: u64 = 168;

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ========================================
// TOML file
// ========================================

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub bind_addr: Option<String>,
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub session_ttl_hours: Option<u64>,
    #[serde(default)]
    pub secure_cookies: Option<bool>,
    #[serde(default)]
    pub logging: LoggingToml,
    #[serde(default)]
    pub storage: StorageToml,
}

/// `[logging]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingToml {
    #[serde(default)]
    pub level: Option<String>,
}

/// `[storage]` table
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageToml {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub use_ssl: Option<bool>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }
}

/// Candidate config file locations, in lookup order
///
/// An explicit path (from `--config` / `FENIX_CONFIG`) is the only
/// candidate when given.
pub fn config_file_candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }

    let mut candidates = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("fenix").join("config.toml"));
    }
    if cfg!(unix) {
        candidates.push(PathBuf::from("/etc/fenix/config.toml"));
    }
    candidates
}

/// Load the first readable config file
///
/// Returns `None` (after logging) when no file exists or the file cannot
/// be parsed.
pub fn load_toml_config(explicit: Option<&Path>) -> Option<TomlConfig> {
    for path in config_file_candidates(explicit) {
        if !path.exists() {
            if explicit.is_some() {
                warn!("Config file not found: {} (using defaults)", path.display());
            }
            continue;
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => match TomlConfig::from_toml_str(&content) {
                Ok(config) => {
                    info!("Loaded config file: {}", path.display());
                    return Some(config);
                }
                Err(e) => {
                    warn!("Ignoring config file {}: {}", path.display(), e);
                    return None;
                }
            },
            Err(e) => {
                warn!("Could not read config file {}: {}", path.display(), e);
                return None;
            }
        }
    }

    None
}

// ========================================
// Resolved configuration
// ========================================

/// Command-line / environment values, already merged by clap
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bind_addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub session_ttl_hours: Option<u64>,
    pub secure_cookies: Option<bool>,
    pub log_level: Option<String>,
    pub storage_backend: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_port: Option<u16>,
    pub storage_use_ssl: Option<bool>,
    pub storage_access_key: Option<String>,
    pub storage_secret_key: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_region: Option<String>,
    pub storage_dir: Option<PathBuf>,
}

/// Which object storage implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible service (MinIO in the reference deployment)
    S3,
    /// Plain directory on the local filesystem
    Local,
    /// Process memory; contents vanish on restart
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s3" | "minio" => Ok(StorageBackend::S3),
            "local" | "fs" | "filesystem" => Ok(StorageBackend::Local),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

/// S3 connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Host name, or full URL with scheme
    pub endpoint: String,
    pub port: Option<u16>,
    pub use_ssl: bool,
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
}

impl S3Config {
    /// Endpoint URL used by the S3 client
    ///
    /// A bare host name gets a scheme from `use_ssl` and the configured
    /// port; an endpoint that already carries a scheme is used verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use fenix_common::config::S3Config;
    ///
    /// let mut cfg = S3Config {
    ///     endpoint: "minio.local".to_string(),
    ///     port: Some(9000),
    ///     use_ssl: false,
    ///     access_key: "k".to_string(),
    ///     secret_key: "s".to_string(),
    ///     bucket: "mangas".to_string(),
    ///     region: "us-east-1".to_string(),
    /// };
    /// assert_eq!(cfg.endpoint_url(), "http://minio.local:9000");
    ///
    /// cfg.endpoint = "https://s3.example.com".to_string();
    /// assert_eq!(cfg.endpoint_url(), "https://s3.example.com");
    /// ```
    pub fn endpoint_url(&self) -> String {
        if self.endpoint.contains("://") {
            return self.endpoint.trim_end_matches('/').to_string();
        }

        let scheme = if self.use_ssl { "https" } else { "http" };
        match self.port {
            Some(port) => format!("{}://{}:{}", scheme, self.endpoint, port),
            None => format!("{}://{}", scheme, self.endpoint),
        }
    }
}

/// Resolved storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    S3(S3Config),
    Local { root: PathBuf },
    Memory,
}

/// Fully resolved admin service configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub session_ttl: Duration,
    pub secure_cookies: bool,
    pub log_level: String,
    pub storage: StorageConfig,
}

impl AdminConfig {
    /// Resolve configuration from overrides (CLI/env) and the TOML file
    pub fn resolve(overrides: &ConfigOverrides, file: Option<&TomlConfig>) -> Result<Self> {
        let empty = TomlConfig::default();
        let file = file.unwrap_or(&empty);

        let bind_str = overrides
            .bind_addr
            .clone()
            .or_else(|| file.bind_addr.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_str
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind_str, e)))?;

        let database_path = overrides
            .database_path
            .clone()
            .or_else(|| file.database_path.clone())
            .unwrap_or_else(|| default_data_dir().join("fenix.db"));

        let ttl_hours = overrides
            .session_ttl_hours
            .or(file.session_ttl_hours)
            .unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        if ttl_hours == 0 {
            return Err(Error::Config("session_ttl_hours must be positive".to_string()));
        }

        let secure_cookies = overrides
            .secure_cookies
            .or(file.secure_cookies)
            .unwrap_or(false);

        let log_level = overrides
            .log_level
            .clone()
            .or_else(|| file.logging.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());

        let storage = resolve_storage(overrides, &file.storage)?;

        Ok(Self {
            bind_addr,
            database_path,
            session_ttl: Duration::from_secs(ttl_hours * 3600),
            secure_cookies,
            log_level,
            storage,
        })
    }
}

fn resolve_storage(overrides: &ConfigOverrides, file: &StorageToml) -> Result<StorageConfig> {
    let endpoint = overrides
        .storage_endpoint
        .clone()
        .or_else(|| file.endpoint.clone())
        .filter(|e| !e.trim().is_empty());

    let backend = match overrides.storage_backend.as_ref().or(file.backend.as_ref()) {
        Some(name) => name.parse::<StorageBackend>()?,
        None if endpoint.is_some() => StorageBackend::S3,
        None => StorageBackend::Local,
    };

    match backend {
        StorageBackend::S3 => {
            let endpoint = endpoint.ok_or_else(|| {
                Error::Config("S3 storage requires an endpoint (MINIO_ENDPOINT)".to_string())
            })?;
            let access_key = overrides
                .storage_access_key
                .clone()
                .or_else(|| file.access_key.clone())
                .ok_or_else(|| {
                    Error::Config("S3 storage requires an access key (MINIO_ACCESS_KEY)".to_string())
                })?;
            let secret_key = overrides
                .storage_secret_key
                .clone()
                .or_else(|| file.secret_key.clone())
                .ok_or_else(|| {
                    Error::Config("S3 storage requires a secret key (MINIO_SECRET_KEY)".to_string())
                })?;

            Ok(StorageConfig::S3(S3Config {
                endpoint,
                port: overrides.storage_port.or(file.port),
                use_ssl: overrides.storage_use_ssl.or(file.use_ssl).unwrap_or(false),
                access_key,
                secret_key,
                bucket: overrides
                    .storage_bucket
                    .clone()
                    .or_else(|| file.bucket.clone())
                    .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
                region: overrides
                    .storage_region
                    .clone()
                    .or_else(|| file.region.clone())
                    .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            }))
        }
        StorageBackend::Local => Ok(StorageConfig::Local {
            root: overrides
                .storage_dir
                .clone()
                .or_else(|| file.local_root.clone())
                .unwrap_or_else(|| default_data_dir().join("media")),
        }),
        StorageBackend::Memory => Ok(StorageConfig::Memory),
    }
}

/// OS-dependent default data folder
pub fn default_data_dir() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/fenix (or /var/lib/fenix for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("fenix"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/fenix"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("fenix"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/fenix"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("fenix"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\fenix"))
    } else {
        PathBuf::from("./fenix_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!("minio".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert_eq!(" memory ".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("ftp".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_endpoint_url_without_port() {
        let cfg = S3Config {
            endpoint: "minio.local".to_string(),
            port: None,
            use_ssl: true,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
        };
        assert_eq!(cfg.endpoint_url(), "https://minio.local");
    }

    #[test]
    fn test_endpoint_with_scheme_drops_trailing_slash() {
        let cfg = S3Config {
            endpoint: "http://127.0.0.1:9000/".to_string(),
            port: Some(1234),
            use_ssl: true,
            access_key: String::new(),
            secret_key: String::new(),
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
        };
        assert_eq!(cfg.endpoint_url(), "http://127.0.0.1:9000");
    }
}
