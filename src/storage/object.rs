//! Object storage backend (S3 and in-memory) built on `object_store`

use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;

use super::{KeyValueStore, StorageError};

/// Stores each dashboard as one object under an optional prefix.
///
/// Object stores replace whole objects atomically but offer no
/// read-modify-write primitive; that is left to the lock registry.
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    prefix: String,
}

impl ObjectBackend {
    /// Wrap any [`ObjectStore`] implementation
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// S3 bucket; region and credentials come from the standard AWS variables
    pub fn s3(bucket: &str, prefix: &str) -> Result<Self, StorageError> {
        let store = AmazonS3Builder::from_env().with_bucket_name(bucket).build()?;
        Ok(Self::new(Arc::new(store), prefix))
    }

    pub fn in_memory(prefix: &str) -> Self {
        Self::new(Arc::new(InMemory::new()), prefix)
    }

    fn object_path(&self, key: &str) -> ObjectPath {
        if self.prefix.is_empty() {
            ObjectPath::from(key)
        } else {
            ObjectPath::from(format!("{}/{}", self.prefix, key))
        }
    }
}

#[async_trait]
impl KeyValueStore for ObjectBackend {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        self.store.put(&self.object_path(key), data.into()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        match self.store.get(&self.object_path(key)).await {
            Ok(result) => Ok(result.bytes().await?),
            Err(object_store::Error::NotFound { .. }) => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        // S3 deletes of missing objects succeed, so check first
        if !self.exists(key).await? {
            return Err(StorageError::NotFound(key.to_string()));
        }
        self.store.delete(&self.object_path(key)).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.store.head(&self.object_path(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
