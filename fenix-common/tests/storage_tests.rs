//! Tests for the media store
//!
//! Uses the in-memory and local filesystem backends; S3 shares the same
//! code path apart from URL signing.

use fenix_common::config::StorageConfig;
use fenix_common::storage::{chapter_prefix, manga_prefix, page_key, DEFAULT_URL_TTL};
use fenix_common::{Error, MediaStore};

#[tokio::test]
async fn test_put_then_get_keeps_content_type() {
    let store = MediaStore::in_memory();

    store
        .put("1/thumbnail.webp", b"RIFF....WEBP".to_vec(), "image/webp")
        .await
        .unwrap();

    let object = store.get("1/thumbnail.webp").await.unwrap();
    assert_eq!(object.bytes, b"RIFF....WEBP");
    assert_eq!(object.content_type, "image/webp");
}

#[tokio::test]
async fn test_get_missing_is_not_found() {
    let store = MediaStore::in_memory();
    let err = store.get("1/thumbnail.webp").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_delete_missing_object_succeeds() {
    let store = MediaStore::in_memory();
    store.delete("1/chapters/2/3.webp").await.unwrap();
}

#[tokio::test]
async fn test_delete_prefix_only_touches_that_prefix() {
    let store = MediaStore::in_memory();
    for key in [
        page_key(1, 10, 1, "webp"),
        page_key(1, 10, 2, "webp"),
        page_key(1, 11, 1, "webp"),
        page_key(12, 100, 1, "webp"),
    ] {
        store.put(&key, vec![0u8; 4], "image/webp").await.unwrap();
    }

    let removed = store.delete_prefix(&chapter_prefix(1, 10)).await.unwrap();
    assert_eq!(removed, 2);
    assert!(store.exists(&page_key(1, 11, 1, "webp")).await.unwrap());

    // Prefix "1" must not match manga 12
    let removed = store.delete_prefix(&manga_prefix(1)).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.exists(&page_key(12, 100, 1, "webp")).await.unwrap());
}

#[tokio::test]
async fn test_rename_moves_object() {
    let store = MediaStore::in_memory();
    store.put("1/chapters/2/3.webp", vec![1, 2, 3], "image/webp").await.unwrap();

    store.rename("1/chapters/2/3.webp", "1/chapters/2/4.webp").await.unwrap();

    assert!(!store.exists("1/chapters/2/3.webp").await.unwrap());
    assert_eq!(store.get("1/chapters/2/4.webp").await.unwrap().bytes, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_unsigned_backend_uses_media_route() {
    let store = MediaStore::in_memory();
    assert!(!store.can_sign());

    let url = store.presigned_url("1/thumbnail.webp", DEFAULT_URL_TTL).await.unwrap();
    assert_eq!(url, "/media/1/thumbnail.webp");
}

#[tokio::test]
async fn test_invalid_key_rejected() {
    let store = MediaStore::in_memory();
    let err = store.put("../escape", vec![0], "image/webp").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_local_backend_writes_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = MediaStore::from_config(&StorageConfig::Local {
        root: dir.path().join("media"),
    })
    .unwrap();

    store.put("5/thumbnail.webp", vec![9, 9], "image/webp").await.unwrap();
    assert!(dir.path().join("media/5/thumbnail.webp").exists());

    assert_eq!(store.delete_prefix("5").await.unwrap(), 1);
    assert!(!dir.path().join("media/5/thumbnail.webp").exists());
}
