use async_trait::async_trait;
use ftpgate_core::model::Object;
use ftpgate_core::{Error, Result};
use ftpgate_offline::thunder::{OfflineTask, PHASE_COMPLETE, PHASE_ERROR, TASK_DELETED, Thunder, ThunderApi};
use ftpgate_offline::{AddUrlArgs, DownloadTask, Storage, StorageResolver, TaskState, Tool, ToolRegistry};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct FakeThunder {
    tasks: Mutex<Vec<OfflineTask>>,
    submitted: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
    lists: AtomicUsize,
}

#[async_trait]
impl ThunderApi for FakeThunder {
    fn cache_key(&self) -> String {
        "fake-thunder".to_string()
    }

    async fn offline_download(&self, url: &str, parent: &Object, _file_name: &str) -> Result<OfflineTask> {
        self.submitted.lock().unwrap().push((url.to_string(), parent.name.clone()));
        let task = OfflineTask {
            id: format!("task-{}", self.submitted.lock().unwrap().len()),
            message: "queued".to_string(),
            phase: "PHASE_TYPE_RUNNING".to_string(),
            file_size: "2048".to_string(),
            ..OfflineTask::default()
        };
        self.tasks.lock().unwrap().push(task.clone());
        Ok(task)
    }

    async fn delete_offline_tasks(&self, ids: &[String], _delete_files: bool) -> Result<()> {
        self.deleted.lock().unwrap().extend_from_slice(ids);
        self.tasks.lock().unwrap().retain(|t| !ids.contains(&t.id));
        Ok(())
    }

    async fn offline_list(&self) -> Result<Vec<OfflineTask>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        Ok(self.tasks.lock().unwrap().clone())
    }
}

#[derive(Debug)]
struct Mount {
    path: &'static str,
    thunder: Option<FakeThunder>,
}

#[async_trait]
impl Storage for Mount {
    fn mount_path(&self) -> &str {
        self.path
    }

    async fn get(&self, actual_path: &str) -> Result<Object> {
        Ok(Object::dir(actual_path.rsplit('/').next().unwrap_or_default()))
    }

    fn as_thunder(&self) -> Option<&dyn ThunderApi> {
        self.thunder.as_ref().map(|t| t as &dyn ThunderApi)
    }
}

#[derive(Debug)]
struct Mounts(Vec<Arc<Mount>>);

#[async_trait]
impl StorageResolver for Mounts {
    async fn storage_and_actual_path(&self, path: &str) -> Result<(Arc<dyn Storage>, String)> {
        for mount in &self.0 {
            if let Some(rest) = path.strip_prefix(mount.path) {
                let storage: Arc<dyn Storage> = mount.clone();
                return Ok((storage, format!("/{}", rest.trim_start_matches('/'))));
            }
        }
        Err(Error::ObjectNotFound)
    }
}

fn setup() -> (Thunder, Arc<Mount>) {
    let thunder = Arc::new(Mount {
        path: "/thunder",
        thunder: Some(FakeThunder::default()),
    });
    let local = Arc::new(Mount { path: "/local", thunder: None });
    let tool = Thunder::new(Arc::new(Mounts(vec![thunder.clone(), local])));
    (tool, thunder)
}

fn fake(mount: &Mount) -> &FakeThunder {
    mount.thunder.as_ref().unwrap()
}

fn args(url: &str, dst: &str) -> AddUrlArgs {
    AddUrlArgs {
        url: url.to_string(),
        dst_dir_path: dst.to_string(),
        ..AddUrlArgs::default()
    }
}

#[tokio::test]
async fn basics() {
    let (tool, _) = setup();
    assert_eq!(tool.name(), "thunder");
    assert!(tool.items().is_empty());
    assert_eq!(tool.init().await.unwrap(), "ok");
    assert!(tool.is_ready());
    assert!(matches!(tool.run(&mut DownloadTask::default()).await, Err(Error::NotSupport)));

    let mut registry = ToolRegistry::new();
    registry.add(Arc::new(tool));
    assert_eq!(registry.names(), vec!["thunder".to_string()]);
    assert!(registry.get("thunder").is_some());
    assert!(registry.get("aria2").is_none());
}

#[tokio::test]
async fn add_url_submits_into_parent_dir() {
    let (tool, mount) = setup();
    let id = tool.add_url(&args("magnet:?xt=abc", "/thunder/movies")).await.unwrap();
    assert_eq!(id, "task-1");
    assert_eq!(
        fake(&mount).submitted.lock().unwrap().clone(),
        vec![("magnet:?xt=abc".to_string(), "movies".to_string())]
    );
}

#[tokio::test]
async fn other_drivers_are_refused() {
    let (tool, _) = setup();
    let err = tool.add_url(&args("http://x/y", "/local/dl")).await.unwrap_err();
    assert_eq!(err.to_string(), "unsupported storage driver for offline download, only Thunder is supported");

    let task = DownloadTask::new("http://x/y", "/local/dl");
    assert!(tool.status(&task).await.is_err());
    assert!(tool.remove(&task).await.is_err());
}

#[tokio::test]
async fn status_maps_phases() {
    let (tool, mount) = setup();
    let mut task = DownloadTask::new("http://x/a.iso", "/thunder");
    task.gid = tool.add_url(&args(&task.url, &task.dst_dir_path)).await.unwrap();

    let status = tool.status(&task).await.unwrap();
    assert!(!status.completed);
    assert_eq!(status.status, "queued");
    assert_eq!(status.total_bytes, 2048);
    assert_eq!(status.err, None);
    task.apply(&status);
    assert_eq!(task.state, TaskState::Running);

    {
        let mut tasks = fake(&mount).tasks.lock().unwrap();
        tasks[0].phase = PHASE_COMPLETE.to_string();
        tasks[0].progress = 100;
        tasks[0].file_size = "not a number".to_string();
    }
    // a new submission forces the cached listing to refresh
    tool.add_url(&args("http://x/b.iso", "/thunder")).await.unwrap();
    let status = tool.status(&task).await.unwrap();
    assert!(status.completed);
    assert_eq!(status.progress, 100.0);
    assert_eq!(status.total_bytes, 0);
    task.apply(&status);
    assert_eq!(task.state, TaskState::Complete);
}

#[tokio::test]
async fn failed_and_deleted_tasks() {
    let (tool, mount) = setup();
    let mut task = DownloadTask::new("http://x/a.iso", "/thunder");
    task.gid = tool.add_url(&args(&task.url, &task.dst_dir_path)).await.unwrap();
    fake(&mount).tasks.lock().unwrap()[0].phase = PHASE_ERROR.to_string();
    fake(&mount).tasks.lock().unwrap()[0].message = "disk full".to_string();

    let status = tool.status(&task).await.unwrap();
    assert_eq!(status.err.as_deref(), Some("disk full"));

    tool.remove(&task).await.unwrap();
    assert_eq!(fake(&mount).deleted.lock().unwrap().clone(), vec![task.gid.clone()]);

    tool.add_url(&args("http://x/c.iso", "/thunder")).await.unwrap();
    let status = tool.status(&task).await.unwrap();
    assert_eq!(status.status, TASK_DELETED);
    assert_eq!(status.err.as_deref(), Some(TASK_DELETED));
    task.apply(&status);
    assert_eq!(task.state, TaskState::Deleted);
}

#[tokio::test]
async fn listing_is_cached_between_polls() {
    let (tool, mount) = setup();
    let mut task = DownloadTask::new("http://x/a.iso", "/thunder");
    task.gid = tool.add_url(&args(&task.url, &task.dst_dir_path)).await.unwrap();

    tool.status(&task).await.unwrap();
    tool.status(&task).await.unwrap();
    tool.status(&task).await.unwrap();
    assert_eq!(fake(&mount).lists.load(Ordering::SeqCst), 1);
}
