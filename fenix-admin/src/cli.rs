//! Command-line and environment configuration shared by both binaries
//!
//! Every option can also come from the environment; anything left unset
//! falls through to the TOML file and then to compiled defaults
//! (see [`fenix_common::config::AdminConfig::resolve`]).

use std::path::PathBuf;

use clap::Args;
use fenix_common::config::ConfigOverrides;

#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, env = "FENIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on (host:port)
    #[arg(long, env = "FENIX_BIND")]
    pub bind: Option<String>,

    /// SQLite database file
    #[arg(long, env = "FENIX_DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// Hours a sign-in stays valid
    #[arg(long, env = "FENIX_SESSION_TTL_HOURS")]
    pub session_ttl_hours: Option<u64>,

    /// Mark the session cookie Secure
    #[arg(long, env = "FENIX_SECURE_COOKIES")]
    pub secure_cookies: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FENIX_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Storage backend: s3, local or memory
    #[arg(long, env = "FENIX_STORAGE_BACKEND")]
    pub storage_backend: Option<String>,

    /// Root directory for the local storage backend
    #[arg(long, env = "FENIX_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,

    /// S3/MinIO endpoint host or URL
    #[arg(long, env = "MINIO_ENDPOINT")]
    pub storage_endpoint: Option<String>,

    #[arg(long, env = "MINIO_PORT")]
    pub storage_port: Option<u16>,

    #[arg(long, env = "MINIO_USE_SSL")]
    pub storage_use_ssl: Option<bool>,

    #[arg(long, env = "MINIO_ACCESS_KEY", hide_env_values = true)]
    pub storage_access_key: Option<String>,

    #[arg(long, env = "MINIO_SECRET_KEY", hide_env_values = true)]
    pub storage_secret_key: Option<String>,

    #[arg(long, env = "MINIO_BUCKET_NAME")]
    pub storage_bucket: Option<String>,

    #[arg(long, env = "FENIX_STORAGE_REGION")]
    pub storage_region: Option<String>,
}

impl ConfigArgs {
    pub fn to_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            bind_addr: self.bind.clone(),
            database_path: self.database_path.clone(),
            session_ttl_hours: self.session_ttl_hours,
            secure_cookies: self.secure_cookies,
            log_level: self.log_level.clone(),
            storage_backend: self.storage_backend.clone(),
            storage_endpoint: self.storage_endpoint.clone(),
            storage_port: self.storage_port,
            storage_use_ssl: self.storage_use_ssl,
            storage_access_key: self.storage_access_key.clone(),
            storage_secret_key: self.storage_secret_key.clone(),
            storage_bucket: self.storage_bucket.clone(),
            storage_region: self.storage_region.clone(),
            storage_dir: self.storage_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    const VARS: [&str; 6] = [
        "FENIX_BIND",
        "FENIX_DATABASE_PATH",
        "MINIO_ENDPOINT",
        "MINIO_PORT",
        "MINIO_BUCKET_NAME",
        "FENIX_SECURE_COOKIES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_arguments_map_to_overrides() {
        clear_env();
        let cli = TestCli::parse_from([
            "fenix-admin",
            "--bind",
            "0.0.0.0:8080",
            "--storage-backend",
            "memory",
            "--session-ttl-hours",
            "2",
        ]);
        let overrides = cli.config.to_overrides();

        assert_eq!(overrides.bind_addr.as_deref(), Some("0.0.0.0:8080"));
        assert_eq!(overrides.storage_backend.as_deref(), Some("memory"));
        assert_eq!(overrides.session_ttl_hours, Some(2));
        assert!(overrides.database_path.is_none());
    }

    #[test]
    #[serial]
    fn test_minio_environment_names() {
        clear_env();
        std::env::set_var("MINIO_ENDPOINT", "minio.local");
        std::env::set_var("MINIO_PORT", "9000");
        std::env::set_var("MINIO_BUCKET_NAME", "covers");
        std::env::set_var("FENIX_SECURE_COOKIES", "true");

        let cli = TestCli::parse_from(["fenix-admin"]);
        let overrides = cli.config.to_overrides();
        clear_env();

        assert_eq!(overrides.storage_endpoint.as_deref(), Some("minio.local"));
        assert_eq!(overrides.storage_port, Some(9000));
        assert_eq!(overrides.storage_bucket.as_deref(), Some("covers"));
        assert_eq!(overrides.secure_cookies, Some(true));
    }

    #[test]
    #[serial]
    fn test_argument_beats_environment() {
        clear_env();
        std::env::set_var("FENIX_BIND", "127.0.0.1:1111");

        let cli = TestCli::parse_from(["fenix-admin", "--bind", "127.0.0.1:2222"]);
        clear_env();

        assert_eq!(cli.config.bind.as_deref(), Some("127.0.0.1:2222"));
    }
}
