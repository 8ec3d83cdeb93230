use crate::thunder::ThunderApi;
use async_trait::async_trait;
use ftpgate_core::Result;
use ftpgate_core::model::Object;
use std::fmt::Debug;
use std::sync::Arc;

/// A mounted storage driver, as far as offline downloads need one.
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Where the storage is mounted in the gateway namespace.
    fn mount_path(&self) -> &str;

    /// Returns the object at a path relative to the mount.
    async fn get(&self, actual_path: &str) -> Result<Object>;

    /// The Thunder offline download API, for drivers that offer it.
    fn as_thunder(&self) -> Option<&dyn ThunderApi> {
        None
    }
}

/// Finds the storage mounted at a gateway path.
#[async_trait]
pub trait StorageResolver: Send + Sync + Debug {
    /// Returns the storage serving `path` and the path relative to its mount.
    async fn storage_and_actual_path(&self, path: &str) -> Result<(Arc<dyn Storage>, String)>;

    /// Returns the driver's own object at `actual_path`, without any gateway wrapping.
    async fn get_unwrap(&self, storage: &dyn Storage, actual_path: &str) -> Result<Object> {
        storage.get(actual_path).await
    }
}
