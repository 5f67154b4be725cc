//! Key-value storage for dashboard documents
//!
//! Backends implement [`KeyValueStore`] and know nothing about locking. The
//! [`Storage`] wrapper owns the per-key lock registry and only hands out
//! access to a key through a [`ReadHandle`] or [`WriteHandle`], so a whole
//! load → mutate → persist cycle runs under one exclusive lock.

mod file;
mod locks;
mod object;

pub use file::FileStore;
pub use locks::KeyLocks;
pub use object::ObjectBackend;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};
use tracing::info;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Dashboard with ID '{0}' was not found")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid storage URI '{0}'")]
    InvalidUri(String),

    #[error("Storage scheme '{0}' is not supported")]
    UnsupportedScheme(String),
}

/// Byte-blob storage keyed by dashboard id
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous document as a whole.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError>;

    /// Fetch the document stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Remove `key`. Removing an absent key is [`StorageError::NotFound`].
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// The backend selected at startup
pub enum Backend {
    File(FileStore),
    Object(ObjectBackend),
}

impl Backend {
    /// Build a backend from a scheme-prefixed URI.
    ///
    /// * `file://<dir>` - one JSON file per dashboard below `dir`
    /// * `s3://<bucket>[/<prefix>]` - S3, credentials from the AWS environment
    /// * `memory://` - in-process object store
    pub async fn open(uri: &str) -> Result<Self, StorageError> {
        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;

        match scheme {
            "file" => {
                if rest.is_empty() {
                    return Err(StorageError::InvalidUri(uri.to_string()));
                }
                Ok(Backend::File(FileStore::new(rest).await?))
            }
            "s3" => {
                let (bucket, prefix) = rest.split_once('/').unwrap_or((rest, ""));
                if bucket.is_empty() {
                    return Err(StorageError::InvalidUri(uri.to_string()));
                }
                Ok(Backend::Object(ObjectBackend::s3(bucket, prefix)?))
            }
            "memory" => Ok(Backend::Object(ObjectBackend::in_memory(rest))),
            other => Err(StorageError::UnsupportedScheme(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::File(_) => "file",
            Backend::Object(_) => "object",
        }
    }
}

#[async_trait]
impl KeyValueStore for Backend {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StorageError> {
        match self {
            Backend::File(store) => store.put(key, data).await,
            Backend::Object(store) => store.put(key, data).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        match self {
            Backend::File(store) => store.get(key).await,
            Backend::Object(store) => store.get(key).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self {
            Backend::File(store) => store.delete(key).await,
            Backend::Object(store) => store.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self {
            Backend::File(store) => store.exists(key).await,
            Backend::Object(store) => store.exists(key).await,
        }
    }
}

/// A backend plus the lock registry serializing access per key
pub struct Storage {
    backend: Backend,
    locks: Arc<KeyLocks>,
}

impl Storage {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            locks: Arc::new(KeyLocks::default()),
        }
    }

    /// Open the backend named by `uri`
    pub async fn open(uri: &str) -> Result<Self, StorageError> {
        let backend = Backend::open(uri).await?;
        info!(backend = backend.name(), "Storage backend initialized");
        Ok(Self::new(backend))
    }

    pub fn locks(&self) -> Arc<KeyLocks> {
        Arc::clone(&self.locks)
    }

    /// Shared access to `key`; waits while a writer holds it.
    pub async fn read(&self, key: &str) -> ReadHandle<'_> {
        let guard = self.locks.read(key).await;
        ReadHandle {
            backend: &self.backend,
            key: key.to_string(),
            _guard: guard,
        }
    }

    /// Exclusive access to `key` until the handle is dropped.
    pub async fn write(&self, key: &str) -> WriteHandle<'_> {
        let guard = self.locks.write(key).await;
        WriteHandle {
            backend: &self.backend,
            key: key.to_string(),
            _guard: guard,
        }
    }
}

/// Read access to one key, held under a shared lock
pub struct ReadHandle<'a> {
    backend: &'a Backend,
    key: String,
    _guard: OwnedRwLockReadGuard<()>,
}

impl ReadHandle<'_> {
    pub async fn get(&self) -> Result<Bytes, StorageError> {
        self.backend.get(&self.key).await
    }

    pub async fn exists(&self) -> Result<bool, StorageError> {
        self.backend.exists(&self.key).await
    }
}

/// Read-write access to one key, held under an exclusive lock
pub struct WriteHandle<'a> {
    backend: &'a Backend,
    key: String,
    _guard: OwnedRwLockWriteGuard<()>,
}

impl WriteHandle<'_> {
    pub async fn get(&self) -> Result<Bytes, StorageError> {
        self.backend.get(&self.key).await
    }

    pub async fn exists(&self) -> Result<bool, StorageError> {
        self.backend.exists(&self.key).await
    }

    pub async fn put(&self, data: Bytes) -> Result<(), StorageError> {
        self.backend.put(&self.key, data).await
    }

    pub async fn delete(&self) -> Result<(), StorageError> {
        self.backend.delete(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_open_rejects_unknown_schemes() {
        assert!(matches!(
            Backend::open("ftp://example.com").await,
            Err(StorageError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            Backend::open("no-scheme").await,
            Err(StorageError::InvalidUri(_))
        ));
        assert!(matches!(
            Backend::open("s3://").await,
            Err(StorageError::InvalidUri(_))
        ));
    }

    #[tokio::test]
    async fn test_open_file_and_memory() {
        let dir = tempfile::tempdir().unwrap();
        let uri = format!("file://{}", dir.path().join("boards").display());
        assert_eq!(Backend::open(&uri).await.unwrap().name(), "file");
        assert!(dir.path().join("boards").is_dir());

        assert_eq!(Backend::open("memory://").await.unwrap().name(), "object");
    }

    #[tokio::test]
    async fn test_write_handle_excludes_readers_of_same_key() {
        let storage = Arc::new(Storage::new(Backend::open("memory://").await.unwrap()));

        let writer = storage.write("d1").await;
        writer.put(Bytes::from_static(b"v1")).await.unwrap();

        let reader_storage = Arc::clone(&storage);
        let reader = tokio::spawn(async move {
            let handle = reader_storage.read("d1").await;
            handle.get().await.unwrap()
        });

        // Other keys are unaffected while d1 is held
        let other = storage.write("d2").await;
        other.put(Bytes::from_static(b"x")).await.unwrap();
        drop(other);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!reader.is_finished());

        writer.put(Bytes::from_static(b"v2")).await.unwrap();
        drop(writer);

        assert_eq!(reader.await.unwrap(), Bytes::from_static(b"v2"));
    }

    #[tokio::test]
    async fn test_lock_wait_is_cancellable() {
        let storage = Storage::new(Backend::open("memory://").await.unwrap());
        let _held = storage.write("d1").await;

        let waited = tokio::time::timeout(Duration::from_millis(20), storage.write("d1")).await;
        assert!(waited.is_err());
    }
}
