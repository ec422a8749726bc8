//! Durable storage for backup artifacts.
//!
//! [`StorageClient`] is what the orchestrator uses: it owns the namespace
//! (bucket and key prefix), enforces the connect-before-use precondition and
//! logs provider diagnostics. The actual provider sits behind the
//! [`ObjectStore`] trait; [`s3::S3Connector`] builds the rusoto-backed one.
//!
//! ## Usage Example
//!
//! ```no_run
//! use routeros_backup::config::Settings;
//! use routeros_backup::storage::{StorageClient, s3::S3Connector};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let settings = Settings::from_env()?;
//! let mut client = StorageClient::new(&settings.s3);
//! client.connect(&S3Connector::new(&settings.s3))?;
//! let key = client.upload(Path::new("/tmp/routeros-2025-04-21.backup"))?;
//! println!("stored as {}", key);
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::config::S3Settings;

/// Error types for storage operations
pub mod error;

/// rusoto-backed S3 implementation
pub mod s3;

pub use error::{
    ConnectError, DeleteError, ListError, ProviderError, StorageFailure, UploadError,
};

/// One stored object as seen by retention pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectDescriptor {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

/// Provider operations, bound to one bucket.
#[cfg_attr(test, mockall::automock)]
pub trait ObjectStore {
    /// Every object whose key starts with `prefix`, across all result pages.
    fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectDescriptor>, StorageFailure>;

    /// Full-body put; replaces an existing object with the same key.
    fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), StorageFailure>;

    fn delete_object(&self, key: &str) -> Result<(), StorageFailure>;
}

/// Builds an [`ObjectStore`] and proves it is reachable.
pub trait StorageConnector {
    fn connect(&self) -> Result<Box<dyn ObjectStore>, StorageFailure>;
}

/// Namespaced access to the configured bucket.
pub struct StorageClient {
    bucket: String,
    prefix: String,
    endpoint: String,
    handle: Option<Box<dyn ObjectStore>>,
}

impl StorageClient {
    /// Create an unconnected client. Every operation fails until
    /// [`StorageClient::connect`] succeeds.
    pub fn new(settings: &S3Settings) -> Self {
        Self {
            bucket: settings.bucket.clone(),
            prefix: settings.prefix.clone(),
            endpoint: settings.endpoint.clone(),
            handle: None,
        }
    }

    pub fn connect(&mut self, connector: &dyn StorageConnector) -> Result<(), ConnectError> {
        match connector.connect() {
            Ok(store) => {
                debug!("S3 client initialized and verified.");
                self.handle = Some(store);
                Ok(())
            }
            Err(failure) => {
                failure.log_diagnostics("connect");
                Err(ConnectError::from_failure(failure, &self.endpoint))
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Key prefix that delimits this tool's objects in the bucket
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Upload a local file as `<prefix><file name>` and return the key.
    pub fn upload(&self, local_path: &Path) -> Result<String, UploadError> {
        let store = self.handle.as_ref().ok_or(UploadError::NotConnected)?;

        let file_name = local_path
            .file_name()
            .ok_or_else(|| UploadError::InvalidPath(local_path.to_path_buf()))?
            .to_string_lossy();
        let key = format!("{}{}", self.prefix, file_name);

        let body = fs::read(local_path).map_err(|source| UploadError::ReadLocal {
            path: local_path.to_path_buf(),
            source,
        })?;

        info!(
            "Uploading {} ({} bytes) to s3://{}/{}",
            local_path.display(),
            body.len(),
            self.bucket,
            key
        );

        store.put_object(&key, body).map_err(|source| {
            source.log_diagnostics("upload");
            UploadError::Store {
                key: key.clone(),
                source,
            }
        })?;

        info!("Upload complete.");
        Ok(key)
    }

    /// All objects in this client's namespace.
    ///
    /// Keys outside the prefix are dropped even if the provider returns them.
    pub fn list_by_prefix(&self) -> Result<Vec<ObjectDescriptor>, ListError> {
        let store = self.handle.as_ref().ok_or(ListError::NotConnected)?;

        let objects = store.list_objects(&self.prefix).map_err(|source| {
            source.log_diagnostics("retention");
            ListError::Store {
                prefix: self.prefix.clone(),
                source,
            }
        })?;

        Ok(objects
            .into_iter()
            .filter(|object| object.key.starts_with(&self.prefix))
            .collect())
    }

    pub fn delete(&self, key: &str) -> Result<(), DeleteError> {
        let store = self.handle.as_ref().ok_or(DeleteError::NotConnected)?;

        store.delete_object(key).map_err(|source| {
            source.log_diagnostics("retention");
            DeleteError::Store {
                key: key.to_string(),
                source,
            }
        })
    }
}
