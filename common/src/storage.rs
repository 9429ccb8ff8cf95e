//! Object storage abstraction using trait-based design.
//!
//! Datasets address their payloads by slash-separated object paths. This
//! module hides which `object_store` backend actually holds those objects.

use async_trait::async_trait;
use futures::StreamExt;
use object_store::{
    ObjectStore, PutMode, PutOptions, PutPayload, local::LocalFileSystem, memory::InMemory,
    path::Path as ObjectPath,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

use crate::error::{CommonError, ErrorContext, Result};

/// Generic storage trait for async object operations.
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Get an object by path. Missing objects yield `None`.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Write an object, overwriting whatever is there.
    async fn put(&self, path: &str, value: Vec<u8>) -> Result<()>;

    /// Write an object only if nothing exists at `path` yet.
    async fn put_if_absent(&self, path: &str, value: Vec<u8>) -> Result<()>;

    /// Remove an object.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if an object exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// List every object path below `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Short backend description, e.g. `local:/data`.
    fn describe(&self) -> String;
}

/// Storage backend configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-memory storage for testing and development.
    #[default]
    Memory,
    /// Local filesystem storage.
    #[serde(alias = "local")]
    LocalFileSystem { root_path: String },
    /// AWS S3 storage.
    #[cfg(feature = "aws")]
    S3 {
        bucket: String,
        region: String,
        #[serde(default)]
        access_key_id: Option<String>,
        #[serde(default)]
        secret_access_key: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// Azure Blob Storage.
    #[cfg(feature = "azure")]
    Azure {
        account: String,
        container: String,
        #[serde(default)]
        access_key: Option<String>,
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// Google Cloud Storage.
    #[cfg(feature = "gcp")]
    Gcs {
        bucket: String,
        #[serde(default)]
        service_account_path: Option<String>,
    },
}

impl StorageBackend {
    /// Fill secret fields from a resolved credentials entry.
    ///
    /// Keys that do not apply to the backend are ignored, and values already
    /// present in the backend configuration win.
    #[allow(unused_variables)]
    pub fn apply_credentials(&mut self, credentials: &HashMap<String, String>) {
        let fill = |slot: &mut Option<String>, key: &str| {
            if slot.is_none() {
                *slot = credentials.get(key).cloned();
            }
        };
        match self {
            StorageBackend::Memory | StorageBackend::LocalFileSystem { .. } => {}
            #[cfg(feature = "aws")]
            StorageBackend::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => {
                fill(access_key_id, "access_key_id");
                fill(secret_access_key, "secret_access_key");
            }
            #[cfg(feature = "azure")]
            StorageBackend::Azure { access_key, .. } => fill(access_key, "access_key"),
            #[cfg(feature = "gcp")]
            StorageBackend::Gcs {
                service_account_path,
                ..
            } => fill(service_account_path, "service_account_path"),
        }
    }

    fn label(&self) -> String {
        match self {
            StorageBackend::Memory => "memory".to_string(),
            StorageBackend::LocalFileSystem { root_path } => format!("local:{}", root_path),
            #[cfg(feature = "aws")]
            StorageBackend::S3 { bucket, .. } => format!("s3://{}", bucket),
            #[cfg(feature = "azure")]
            StorageBackend::Azure {
                account, container, ..
            } => format!("azure://{}/{}", account, container),
            #[cfg(feature = "gcp")]
            StorageBackend::Gcs { bucket, .. } => format!("gs://{}", bucket),
        }
    }
}

/// Builder for creating storage instances.
#[derive(Debug, Default)]
pub struct StorageBuilder {
    backend: StorageBackend,
    key_prefix: Option<String>,
}

impl StorageBuilder {
    /// Create a new storage builder backed by memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the storage backend.
    pub fn backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Set a path prefix applied to every operation.
    pub fn key_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Build a storage instance with the specified configuration.
    ///
    /// Construction is synchronous: `object_store` clients connect lazily.
    pub fn build(self) -> Result<Arc<dyn Storage>> {
        let storage = ObjectStoreStorage::new(self.backend, self.key_prefix)?;
        Ok(Arc::new(storage))
    }
}

/// Object store-based storage implementation.
struct ObjectStoreStorage {
    store: Arc<dyn ObjectStore>,
    backend: StorageBackend,
    key_prefix: Option<String>,
}

impl std::fmt::Debug for ObjectStoreStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreStorage")
            .field("backend", &self.backend.label())
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl ObjectStoreStorage {
    fn new(backend: StorageBackend, key_prefix: Option<String>) -> Result<Self> {
        let store: Arc<dyn ObjectStore> = match &backend {
            StorageBackend::Memory => Arc::new(InMemory::new()),
            StorageBackend::LocalFileSystem { root_path } => {
                std::fs::create_dir_all(root_path)
                    .with_config_context(|| format!("Cannot create root path {}", root_path))?;
                let fs = LocalFileSystem::new_with_prefix(root_path).with_config_context(|| {
                    format!("Failed to create local filesystem storage at {}", root_path)
                })?;
                Arc::new(fs)
            }
            #[cfg(feature = "aws")]
            StorageBackend::S3 {
                bucket,
                region,
                access_key_id,
                secret_access_key,
                endpoint,
            } => {
                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(bucket)
                    .with_region(region);
                if let Some(key) = access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                Arc::new(builder.build()?)
            }
            #[cfg(feature = "azure")]
            StorageBackend::Azure {
                account,
                container,
                access_key,
                endpoint,
            } => {
                let mut builder = object_store::azure::MicrosoftAzureBuilder::from_env()
                    .with_account(account)
                    .with_container_name(container);
                if let Some(key) = access_key {
                    builder = builder.with_access_key(key);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint.clone());
                }
                Arc::new(builder.build()?)
            }
            #[cfg(feature = "gcp")]
            StorageBackend::Gcs {
                bucket,
                service_account_path,
            } => {
                let mut builder = object_store::gcp::GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(bucket);
                if let Some(path) = service_account_path {
                    builder = builder.with_service_account_path(path);
                }
                Arc::new(builder.build()?)
            }
        };

        debug!("Opened {} storage", backend.label());
        Ok(Self {
            store,
            backend,
            key_prefix,
        })
    }

    fn to_object_path(&self, path: &str) -> ObjectPath {
        let path = path.trim_matches('/');
        match &self.key_prefix {
            Some(prefix) => ObjectPath::from(format!("{}/{}", prefix.trim_matches('/'), path)),
            None => ObjectPath::from(path),
        }
    }

    fn from_object_path(&self, path: &ObjectPath) -> String {
        let raw = path.as_ref();
        match &self.key_prefix {
            Some(prefix) => {
                let prefix = format!("{}/", prefix.trim_matches('/'));
                raw.strip_prefix(&prefix).unwrap_or(raw).to_string()
            }
            None => raw.to_string(),
        }
    }

    fn failed(&self, error: object_store::Error) -> CommonError {
        debug!("Storage operation on {} failed: {}", self.backend.label(), error);
        CommonError::from(error)
    }
}

#[async_trait]
impl Storage for ObjectStoreStorage {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let location = self.to_object_path(path);

        match self.store.get(&location).await {
            Ok(get_result) => {
                let bytes = get_result.bytes().await.map_err(|e| self.failed(e))?;
                Ok(Some(bytes.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(self.failed(e)),
        }
    }

    async fn put(&self, path: &str, value: Vec<u8>) -> Result<()> {
        let location = self.to_object_path(path);
        self.store
            .put(&location, PutPayload::from(value))
            .await
            .map_err(|e| self.failed(e))?;
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, value: Vec<u8>) -> Result<()> {
        let location = self.to_object_path(path);
        let options = PutOptions {
            mode: PutMode::Create,
            ..Default::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(value), options)
            .await
            .map_err(|e| self.failed(e))?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let location = self.to_object_path(path);
        self.store
            .delete(&location)
            .await
            .map_err(|e| self.failed(e))?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let location = self.to_object_path(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(self.failed(e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let location = self.to_object_path(prefix);
        let mut paths = Vec::new();

        let mut stream = self.store.list(Some(&location));
        while let Some(result) = stream.next().await {
            let meta = result.map_err(|e| self.failed(e))?;
            paths.push(self.from_object_path(&meta.location));
        }

        paths.sort();
        Ok(paths)
    }

    fn describe(&self) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}/{}", self.backend.label(), prefix),
            None => self.backend.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_storage_basic_operations() {
        let storage = StorageBuilder::new()
            .backend(StorageBackend::Memory)
            .build()
            .expect("Failed to create memory storage");

        storage
            .put("cars/cars.json", b"[1, 2]".to_vec())
            .await
            .expect("Failed to put");

        let value = storage.get("cars/cars.json").await.expect("Failed to get");
        assert_eq!(value, Some(b"[1, 2]".to_vec()));

        assert!(storage.exists("cars/cars.json").await.expect("exists"));
        assert!(!storage.exists("boats.json").await.expect("exists"));

        storage.delete("cars/cars.json").await.expect("Failed to delete");
        assert_eq!(storage.get("cars/cars.json").await.expect("get"), None);
    }

    #[tokio::test]
    async fn test_local_filesystem_storage() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().join("nested").to_string_lossy().to_string();

        let storage = StorageBuilder::new()
            .backend(StorageBackend::LocalFileSystem { root_path })
            .build()
            .expect("Failed to create local filesystem storage");

        storage
            .put("planes/v1/planes.json", b"{}".to_vec())
            .await
            .expect("Failed to put");

        let value = storage.get("planes/v1/planes.json").await.expect("get");
        assert_eq!(value, Some(b"{}".to_vec()));
        assert!(storage.describe().starts_with("local:"));
    }

    #[tokio::test]
    async fn test_list_is_sorted_and_prefix_relative() {
        let storage = StorageBuilder::new()
            .key_prefix("project")
            .build()
            .expect("storage");

        for version in ["2019-01-02", "2019-01-01", "2019-01-03"] {
            storage
                .put(&format!("data/{}/data.json", version), b"1".to_vec())
                .await
                .expect("put");
        }
        storage.put("other/x.json", b"2".to_vec()).await.expect("put");

        let listed = storage.list("data").await.expect("list");
        assert_eq!(
            listed,
            vec![
                "data/2019-01-01/data.json".to_string(),
                "data/2019-01-02/data.json".to_string(),
                "data/2019-01-03/data.json".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_put_if_absent_rejects_existing_object() {
        let storage = StorageBuilder::new().build().expect("storage");

        storage
            .put_if_absent("once.json", b"1".to_vec())
            .await
            .expect("first write");
        let err = storage
            .put_if_absent("once.json", b"2".to_vec())
            .await
            .expect_err("second write must fail");
        assert!(matches!(err, CommonError::AlreadyExistsError { .. }));
        assert_eq!(
            storage.get("once.json").await.expect("get"),
            Some(b"1".to_vec())
        );
    }

    #[test]
    fn test_backend_from_config() {
        let backend: StorageBackend =
            serde_json::from_str(r#"{"kind": "local", "root_path": "/tmp/data"}"#)
                .expect("backend config");
        assert_eq!(
            backend,
            StorageBackend::LocalFileSystem {
                root_path: "/tmp/data".to_string()
            }
        );

        let mut memory = StorageBackend::Memory;
        memory.apply_credentials(&HashMap::from([("token".to_string(), "x".to_string())]));
        assert_eq!(memory, StorageBackend::Memory);
    }
}
