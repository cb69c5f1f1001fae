use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio_util::io::ReaderStream;

use super::{generate_key, is_valid_key, BlobStore, BlobStoreError, BlobStream};

/// Local filesystem blob store.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    fn blob_path(&self, key: &str) -> Result<PathBuf, BlobStoreError> {
        if !is_valid_key(key) {
            return Err(BlobStoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn put(&self, data: Bytes, suggested_name: &str) -> Result<String, BlobStoreError> {
        let key = generate_key(suggested_name);
        let path = self.blob_path(&key)?;

        // Readers never observe a half-written blob.
        let partial = self.base_path.join(format!("{key}.partial"));
        tokio::fs::write(&partial, &data).await?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::trace!(key = %key, bytes = data.len(), "Stored blob");
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<BlobStream, BlobStoreError> {
        let path = self.blob_path(key)?;
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BlobStoreError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ReaderStream::new(file).boxed())
    }

    async fn read(&self, key: &str) -> Result<Bytes, BlobStoreError> {
        let path = self.blob_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(BlobStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobStoreError> {
        let path = self.blob_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, BlobStoreError> {
        let path = self.blob_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }
}
