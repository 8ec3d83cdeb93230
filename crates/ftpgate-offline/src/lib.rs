//! Offline download tools.
//!
//! An offline download asks some service to fetch a URL into gateway storage on the user's
//! behalf. Each [`Tool`] talks to one such service and is registered by name in a
//! [`ToolRegistry`]. The [`thunder`] tool hands jobs to a storage driver that downloads them
//! itself.

mod storage;
mod task;
pub mod thunder;

pub use storage::{Storage, StorageResolver};
pub use task::{AddUrlArgs, DownloadTask, SettingItem, Status, TaskState};

use async_trait::async_trait;
use ftpgate_core::Result;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// A service that performs offline downloads.
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    /// The unique name the tool is registered under.
    fn name(&self) -> &'static str;

    /// Settings the tool needs configured.
    fn items(&self) -> Vec<SettingItem>;

    /// Prepares the tool and returns a human readable state.
    async fn init(&self) -> Result<String>;

    /// Whether the tool can accept work.
    fn is_ready(&self) -> bool;

    /// Submits a download and returns the service's id for it.
    async fn add_url(&self, args: &AddUrlArgs) -> Result<String>;

    /// Cancels a download and forgets it at the service.
    async fn remove(&self, task: &DownloadTask) -> Result<()>;

    /// Reports the progress of a download.
    async fn status(&self, task: &DownloadTask) -> Result<Status>;

    /// Performs the download in-process, for tools that do so.
    async fn run(&self, task: &mut DownloadTask) -> Result<()>;
}

/// Offline download tools keyed by name. Populated at start-up.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    /// Registers `tool` under its name, replacing an earlier tool of that name.
    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// The tool called `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// The registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }
}
