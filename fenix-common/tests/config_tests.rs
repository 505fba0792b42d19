//! Tests for configuration resolution and graceful degradation
//!
//! Covers:
//! - Priority order: overrides (CLI/env) > TOML file > compiled defaults
//! - Missing or malformed TOML files never abort startup
//! - Storage backend selection and S3 credential requirements

use fenix_common::config::{
    load_toml_config, AdminConfig, ConfigOverrides, StorageConfig, TomlConfig,
    DEFAULT_BIND_ADDR, DEFAULT_BUCKET, DEFAULT_SESSION_TTL_HOURS,
};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn test_defaults_without_overrides_or_file() {
    let config = AdminConfig::resolve(&ConfigOverrides::default(), None).unwrap();

    assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    assert!(config.database_path.ends_with("fenix.db"));
    assert_eq!(
        config.session_ttl,
        Duration::from_secs(DEFAULT_SESSION_TTL_HOURS * 3600)
    );
    assert!(!config.secure_cookies);
    assert_eq!(config.log_level, "info");

    // No endpoint configured -> local directory storage
    match config.storage {
        StorageConfig::Local { root } => assert!(root.ends_with("media")),
        other => panic!("expected local storage, got {:?}", other),
    }
}

#[test]
fn test_toml_values_apply_when_no_override() {
    let file = TomlConfig::from_toml_str(
        r#"
        bind_addr = "0.0.0.0:8080"
        database_path = "/srv/fenix/fenix.db"
        session_ttl_hours = 2
        secure_cookies = true

        [logging]
        level = "debug"

        [storage]
        backend = "memory"
        "#,
    )
    .unwrap();

    let config = AdminConfig::resolve(&ConfigOverrides::default(), Some(&file)).unwrap();

    assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
    assert_eq!(config.database_path, PathBuf::from("/srv/fenix/fenix.db"));
    assert_eq!(config.session_ttl, Duration::from_secs(7200));
    assert!(config.secure_cookies);
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.storage, StorageConfig::Memory);
}

#[test]
fn test_overrides_beat_toml() {
    let file = TomlConfig::from_toml_str(
        r#"
        bind_addr = "0.0.0.0:8080"
        [storage]
        backend = "memory"
        "#,
    )
    .unwrap();

    let overrides = ConfigOverrides {
        bind_addr: Some("127.0.0.1:9999".to_string()),
        storage_backend: Some("local".to_string()),
        storage_dir: Some(PathBuf::from("/tmp/fenix-media")),
        ..Default::default()
    };

    let config = AdminConfig::resolve(&overrides, Some(&file)).unwrap();
    assert_eq!(config.bind_addr.to_string(), "127.0.0.1:9999");
    assert_eq!(
        config.storage,
        StorageConfig::Local {
            root: PathBuf::from("/tmp/fenix-media")
        }
    );
}

#[test]
fn test_endpoint_implies_s3_backend() {
    let overrides = ConfigOverrides {
        storage_endpoint: Some("minio.internal".to_string()),
        storage_port: Some(9000),
        storage_access_key: Some("access".to_string()),
        storage_secret_key: Some("secret".to_string()),
        ..Default::default()
    };

    let config = AdminConfig::resolve(&overrides, None).unwrap();
    match config.storage {
        StorageConfig::S3(s3) => {
            assert_eq!(s3.endpoint_url(), "http://minio.internal:9000");
            assert_eq!(s3.bucket, DEFAULT_BUCKET);
            assert_eq!(s3.access_key, "access");
        }
        other => panic!("expected S3 storage, got {:?}", other),
    }
}

#[test]
fn test_s3_without_credentials_is_config_error() {
    let overrides = ConfigOverrides {
        storage_backend: Some("s3".to_string()),
        storage_endpoint: Some("minio.internal".to_string()),
        ..Default::default()
    };

    let err = AdminConfig::resolve(&overrides, None).unwrap_err();
    assert!(err.to_string().contains("access key"), "got: {}", err);
}

#[test]
fn test_invalid_bind_address_rejected() {
    let overrides = ConfigOverrides {
        bind_addr: Some("not-an-address".to_string()),
        ..Default::default()
    };
    assert!(AdminConfig::resolve(&overrides, None).is_err());
}

#[test]
fn test_zero_session_ttl_rejected() {
    let overrides = ConfigOverrides {
        session_ttl_hours: Some(0),
        ..Default::default()
    };
    assert!(AdminConfig::resolve(&overrides, None).is_err());
}

#[test]
fn test_missing_explicit_config_file_degrades_to_none() {
    let missing = PathBuf::from("/nonexistent/fenix/config.toml");
    assert!(load_toml_config(Some(&missing)).is_none());
}

#[test]
fn test_malformed_config_file_degrades_to_none() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "bind_addr = [this is not toml").unwrap();

    assert!(load_toml_config(Some(file.path())).is_none());
}

#[test]
fn test_explicit_config_file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "bind_addr = \"127.0.0.1:7000\"").unwrap();
    writeln!(file, "[storage]").unwrap();
    writeln!(file, "bucket = \"covers\"").unwrap();

    let loaded = load_toml_config(Some(file.path())).expect("config should load");
    assert_eq!(loaded.bind_addr.as_deref(), Some("127.0.0.1:7000"));
    assert_eq!(loaded.storage.bucket.as_deref(), Some("covers"));
}
