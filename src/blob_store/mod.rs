mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Blob not found: {0}")]
    NotFound(String),
    #[error("Invalid blob key: {0}")]
    InvalidKey(String),
}

/// Byte stream returned by [`BlobStore::get`].
pub type BlobStream = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// Flat key -> bytes storage.
/// Keys are generated by the store and never derived from display filenames;
/// the raw blobs are meaningless without the catalog.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `data` under a freshly generated key and return that key.
    async fn put(&self, data: Bytes, suggested_name: &str) -> Result<String, BlobStoreError>;
    async fn get(&self, key: &str) -> Result<BlobStream, BlobStoreError>;
    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError>;
    /// Remove a blob. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobStoreError>;
    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError>;
}

/// Generate a blob key: a random UUID plus the suggested name's extension when
/// that extension is short and alphanumeric.
pub fn generate_key(suggested_name: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    let ext = std::path::Path::new(suggested_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10)
        .filter(|e| e.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{id}.{}", ext.to_ascii_lowercase()),
        None => id,
    }
}

/// A key is valid when it cannot address anything outside the store's root.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_keeps_clean_extension() {
        let key = generate_key("Quarterly Report.PDF");
        assert!(key.ends_with(".pdf"));
        assert!(is_valid_key(&key));
    }

    #[test]
    fn key_ignores_hostile_names() {
        let key = generate_key("../../etc/passwd");
        assert!(!key.contains('/'));
        assert!(is_valid_key(&key));

        let key = generate_key("archive.tar.g z");
        assert!(!key.contains(' '));
    }

    #[test]
    fn keys_are_unique() {
        assert_ne!(generate_key("a.txt"), generate_key("a.txt"));
    }

    #[test]
    fn rejects_traversal_keys() {
        assert!(!is_valid_key(""));
        assert!(!is_valid_key(".."));
        assert!(!is_valid_key("../secret"));
        assert!(!is_valid_key("a/b"));
        assert!(!is_valid_key(".hidden"));
    }
}
