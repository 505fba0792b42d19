//! Object storage for cover and page images
//!
//! [`MediaStore`] wraps any `object_store` backend: S3/MinIO in production,
//! a local directory for single-host installs, memory for tests. All keys
//! live in one bucket and follow a fixed layout:
//!
//! ```text
//! {manga_id}/thumbnail.webp
//! {manga_id}/chapters/{chapter_id}/thumbnail.webp
//! {manga_id}/chapters/{chapter_id}/{page_number}.{ext}
//! ```
//!
//! Deleting a manga or chapter therefore only needs a prefix delete.

use crate::config::{S3Config, StorageConfig};
use crate::{Error, Result};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{Attribute, AttributeValue, Attributes, ObjectStore, PutOptions, PutPayload};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifetime of presigned GET URLs
pub const DEFAULT_URL_TTL: Duration = Duration::from_secs(3600);

/// Route prefix used for objects when the backend cannot sign URLs
pub const MEDIA_ROUTE_PREFIX: &str = "/media";

// ========================================
// Key layout
// ========================================

/// Cover image of a manga
pub fn manga_thumbnail_key(manga_id: i64) -> String {
    format!("{}/thumbnail.webp", manga_id)
}

/// Everything stored for a manga
pub fn manga_prefix(manga_id: i64) -> String {
    manga_id.to_string()
}

/// Everything stored for a chapter
pub fn chapter_prefix(manga_id: i64, chapter_id: i64) -> String {
    format!("{}/chapters/{}", manga_id, chapter_id)
}

/// Cover image of a chapter
pub fn chapter_thumbnail_key(manga_id: i64, chapter_id: i64) -> String {
    format!("{}/thumbnail.webp", chapter_prefix(manga_id, chapter_id))
}

/// Page image; `extension` without the leading dot
///
/// # Examples
///
/// ```
/// use fenix_common::storage::page_key;
///
/// assert_eq!(page_key(3, 17, 5, "webp"), "3/chapters/17/5.webp");
/// ```
pub fn page_key(manga_id: i64, chapter_id: i64, number: i64, extension: &str) -> String {
    format!("{}/{}.{}", chapter_prefix(manga_id, chapter_id), number, extension)
}

/// MIME type for an image file extension (without dot, any case)
pub fn content_type_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "webp" => Some("image/webp"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

/// File extension (without dot) for an accepted image MIME type
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/webp" => Some("webp"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

/// Guess a key's MIME type from its extension
pub fn content_type_for_key(key: &str) -> &'static str {
    key.rsplit_once('.')
        .and_then(|(_, ext)| content_type_for_extension(ext))
        .unwrap_or("application/octet-stream")
}

// ========================================
// Store
// ========================================

/// Object fetched from storage
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Handle to the media bucket
#[derive(Debug, Clone)]
pub struct MediaStore {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    /// Whether the backend keeps per-object attributes; the local
    /// filesystem does not, so content types are derived from the key
    stores_attributes: bool,
}

impl MediaStore {
    /// Wrap an existing backend
    pub fn new(store: Arc<dyn ObjectStore>, signer: Option<Arc<dyn Signer>>) -> Self {
        Self {
            store,
            signer,
            stores_attributes: true,
        }
    }

    /// Memory-backed store (tests, throwaway instances)
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), None)
    }

    /// Build the store described by the resolved configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        match config {
            StorageConfig::S3(s3) => Self::s3(s3),
            StorageConfig::Local { root } => {
                std::fs::create_dir_all(root)?;
                info!("Using local media storage at {}", root.display());
                let fs = LocalFileSystem::new_with_prefix(root)?;
                Ok(Self {
                    stores_attributes: false,
                    ..Self::new(Arc::new(fs), None)
                })
            }
            StorageConfig::Memory => {
                info!("Using in-memory media storage (contents are not persisted)");
                Ok(Self::in_memory())
            }
        }
    }

    fn s3(config: &S3Config) -> Result<Self> {
        let endpoint = config.endpoint_url();
        let s3 = AmazonS3Builder::new()
            .with_endpoint(&endpoint)
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key)
            .with_secret_access_key(&config.secret_key)
            .with_allow_http(!endpoint.starts_with("https://"))
            .with_virtual_hosted_style_request(false)
            .build()?;

        info!("Using S3 media storage at {} (bucket '{}')", endpoint, config.bucket);
        let s3 = Arc::new(s3);
        Ok(Self::new(s3.clone(), Some(s3)))
    }

    /// Upload an object, replacing any existing one with the same key
    pub async fn put(
        &self,
        key: &str,
        data: impl Into<PutPayload>,
        content_type: &str,
    ) -> Result<()> {
        let path = parse_key(key)?;
        let mut attributes = Attributes::new();
        if self.stores_attributes {
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store.put_opts(&path, data.into(), options).await?;
        debug!("Stored object {}", key);
        Ok(())
    }

    /// Fetch an object
    pub async fn get(&self, key: &str) -> Result<StoredObject> {
        let path = parse_key(key)?;
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Err(Error::NotFound(format!("object {}", key)));
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = result
            .attributes
            .get(&Attribute::ContentType)
            .map(|v| AsRef::<str>::as_ref(v).to_string())
            .unwrap_or_else(|| content_type_for_key(key).to_string());
        let bytes = result.bytes().await?.to_vec();

        Ok(StoredObject { bytes, content_type })
    }

    /// Whether an object exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = parse_key(key)?;
        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete one object; deleting a missing object succeeds
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = parse_key(key)?;
        match self.store.delete(&path).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List every key below a prefix (recursive)
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let path = parse_key(prefix)?;
        let keys = self
            .store
            .list(Some(&path))
            .map_ok(|meta| meta.location.to_string())
            .try_collect::<Vec<_>>()
            .await?;
        Ok(keys)
    }

    /// Delete every object below a prefix, returning how many were removed
    pub async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list_prefix(prefix).await?;
        for key in &keys {
            self.delete(key).await?;
        }
        debug!("Deleted {} object(s) under {}", keys.len(), prefix);
        Ok(keys.len())
    }

    /// Best-effort delete of objects left behind by a failed or replaced
    /// write; failures are logged, never returned
    pub async fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!("Could not remove object {}: {}", key, e);
            }
        }
    }

    /// Move an object to a new key
    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let from_path = parse_key(from)?;
        let to_path = parse_key(to)?;
        match self.store.rename(&from_path, &to_path).await {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => {
                Err(Error::NotFound(format!("object {}", from)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether URLs handed to clients are presigned by the backend
    pub fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    /// URL a browser can use to GET the object
    ///
    /// Presigned for `ttl` when the backend supports it, otherwise a path
    /// under [`MEDIA_ROUTE_PREFIX`] served by the admin service.
    pub async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        let path = parse_key(key)?;
        match &self.signer {
            Some(signer) => {
                let url = signer.signed_url(http::Method::GET, &path, ttl).await?;
                Ok(url.to_string())
            }
            None => Ok(format!("{}/{}", MEDIA_ROUTE_PREFIX, path)),
        }
    }
}

/// Validate a key as an object path
fn parse_key(key: &str) -> Result<ObjectPath> {
    if key.trim().is_empty() {
        return Err(Error::InvalidInput("Empty object key".to_string()));
    }
    ObjectPath::parse(key)
        .map_err(|e| Error::InvalidInput(format!("Invalid object key '{}': {}", key, e)))
}
