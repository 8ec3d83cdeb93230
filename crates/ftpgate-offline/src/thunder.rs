//! Offline downloads performed by a Thunder storage driver.
//!
//! Thunder downloads straight into the user's drive, so the gateway only submits the URL and
//! polls the driver's task list. The task list is cached briefly per driver; submitting a new
//! task forces the next poll to refresh it.

use crate::storage::{Storage, StorageResolver};
use crate::task::{AddUrlArgs, DownloadTask, SettingItem, Status};
use crate::Tool;
use async_trait::async_trait;
use ftpgate_core::model::Object;
use ftpgate_core::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Phase of a finished task.
pub const PHASE_COMPLETE: &str = "PHASE_TYPE_COMPLETE";
/// Phase of a failed task.
pub const PHASE_ERROR: &str = "PHASE_TYPE_ERROR";
/// Status reported for tasks the driver no longer lists.
pub const TASK_DELETED: &str = "the task has been deleted";

const TASK_CACHE_TTL: Duration = Duration::from_secs(10);

/// A task as listed by the driver.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OfflineTask {
    /// Driver task id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Percent done.
    pub progress: i64,
    /// Human readable state.
    pub message: String,
    /// Driver phase, such as [`PHASE_COMPLETE`].
    pub phase: String,
    /// Size in bytes, as a decimal string.
    pub file_size: String,
}

/// The offline download calls a Thunder driver offers.
#[async_trait]
pub trait ThunderApi: Send + Sync {
    /// Identifies the driver instance for caching.
    fn cache_key(&self) -> String;

    /// Starts downloading `url` into `parent`.
    async fn offline_download(&self, url: &str, parent: &Object, file_name: &str) -> Result<OfflineTask>;

    /// Deletes tasks, optionally with the files they produced.
    async fn delete_offline_tasks(&self, ids: &[String], delete_files: bool) -> Result<()>;

    /// Lists the driver's tasks.
    async fn offline_list(&self) -> Result<Vec<OfflineTask>>;
}

fn unsupported() -> Error {
    Error::Other("unsupported storage driver for offline download, only Thunder is supported".to_string())
}

fn thunder_of(storage: &dyn Storage) -> Result<&dyn ThunderApi> {
    storage.as_thunder().ok_or_else(unsupported)
}

/// The Thunder offline download tool.
pub struct Thunder {
    resolver: Arc<dyn StorageResolver>,
    refresh_task_cache: AtomicBool,
    task_cache: Mutex<HashMap<String, (Instant, Vec<OfflineTask>)>>,
}

impl Thunder {
    /// A tool resolving destinations through `resolver`.
    pub fn new(resolver: Arc<dyn StorageResolver>) -> Self {
        Thunder {
            resolver,
            refresh_task_cache: AtomicBool::new(false),
            task_cache: Mutex::new(HashMap::new()),
        }
    }

    async fn tasks(&self, driver: &dyn ThunderApi) -> Result<Vec<OfflineTask>> {
        let key = driver.cache_key();
        let cached = if self.refresh_task_cache.load(Ordering::SeqCst) { None } else { self.cached(&key) };
        if let Some(tasks) = cached {
            return Ok(tasks);
        }
        self.refresh_task_cache.store(false, Ordering::SeqCst);

        let tasks = driver.offline_list().await?;
        if let Ok(mut cache) = self.task_cache.lock() {
            if tasks.is_empty() {
                cache.remove(&key);
            } else {
                cache.insert(key, (Instant::now(), tasks.clone()));
            }
        }
        Ok(tasks)
    }

    fn cached(&self, key: &str) -> Option<Vec<OfflineTask>> {
        let cache = self.task_cache.lock().ok()?;
        let (at, tasks) = cache.get(key)?;
        (at.elapsed() < TASK_CACHE_TTL).then(|| tasks.clone())
    }
}

impl fmt::Debug for Thunder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thunder")
            .field("refresh_task_cache", &self.refresh_task_cache)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Tool for Thunder {
    fn name(&self) -> &'static str {
        "thunder"
    }

    fn items(&self) -> Vec<SettingItem> {
        Vec::new()
    }

    async fn init(&self) -> Result<String> {
        self.refresh_task_cache.store(false, Ordering::SeqCst);
        Ok("ok".to_string())
    }

    fn is_ready(&self) -> bool {
        true
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn add_url(&self, args: &AddUrlArgs) -> Result<String> {
        self.refresh_task_cache.store(true, Ordering::SeqCst);
        let (storage, actual_path) = self.resolver.storage_and_actual_path(&args.dst_dir_path).await?;
        let driver = thunder_of(storage.as_ref())?;
        let parent = self.resolver.get_unwrap(storage.as_ref(), &actual_path).await?;
        let task = driver
            .offline_download(&args.url, &parent, "")
            .await
            .map_err(|e| Error::Other(format!("failed to add offline download task: {}", e)))?;
        tracing::info!(id = %task.id, "submitted offline download");
        Ok(task.id)
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn remove(&self, task: &DownloadTask) -> Result<()> {
        let (storage, _) = self.resolver.storage_and_actual_path(&task.dst_dir_path).await?;
        thunder_of(storage.as_ref())?.delete_offline_tasks(&[task.gid.clone()], false).await
    }

    async fn status(&self, task: &DownloadTask) -> Result<Status> {
        let (storage, _) = self.resolver.storage_and_actual_path(&task.dst_dir_path).await?;
        let driver = thunder_of(storage.as_ref())?;
        let tasks = self.tasks(driver).await?;

        match tasks.iter().find(|t| t.id == task.gid) {
            Some(t) => Ok(Status {
                progress: t.progress as f64,
                new_gid: String::new(),
                completed: t.phase == PHASE_COMPLETE,
                status: t.message.clone(),
                err: (t.phase == PHASE_ERROR).then(|| t.message.clone()),
                total_bytes: t.file_size.parse().unwrap_or(0),
            }),
            None => Ok(Status {
                status: TASK_DELETED.to_string(),
                err: Some(TASK_DELETED.to_string()),
                ..Status::default()
            }),
        }
    }

    async fn run(&self, _task: &mut DownloadTask) -> Result<()> {
        Err(Error::NotSupport)
    }
}
