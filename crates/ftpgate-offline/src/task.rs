use derive_more::Display;

/// A setting a tool needs configured.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettingItem {
    /// Setting key.
    pub key: String,
    /// Default value.
    pub value: String,
    /// Help text.
    pub help: String,
}

/// A request to download `url`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AddUrlArgs {
    /// What to download.
    pub url: String,
    /// The gateway directory the result should end up in.
    pub dst_dir_path: String,
    /// Where an in-process tool stages the download.
    pub temp_dir: String,
    /// Id of the user asking.
    pub uid: String,
}

/// Where a download is in its life.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq)]
pub enum TaskState {
    /// Submitted, no status seen yet.
    #[default]
    #[display("pending")]
    Pending,
    /// The service reports progress.
    #[display("running")]
    Running,
    /// Finished successfully.
    #[display("complete")]
    Complete,
    /// Failed.
    #[display("error")]
    Error,
    /// The service no longer knows the task.
    #[display("deleted")]
    Deleted,
}

impl TaskState {
    /// Whether no further transitions happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Complete | TaskState::Error | TaskState::Deleted)
    }
}

/// A status report from a tool.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Status {
    /// Percent done, 0 to 100.
    pub progress: f64,
    /// A replacement id when the service re-keyed the task.
    pub new_gid: String,
    /// Whether the download finished.
    pub completed: bool,
    /// Human readable state.
    pub status: String,
    /// Failure reported by the service.
    pub err: Option<String>,
    /// Total size of the download.
    pub total_bytes: u64,
}

/// A download tracked by the gateway.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DownloadTask {
    /// What is downloaded.
    pub url: String,
    /// The gateway directory the result ends up in.
    pub dst_dir_path: String,
    /// Staging directory for in-process tools.
    pub temp_dir: String,
    /// The service's id for the download.
    pub gid: String,
    /// Percent done.
    pub progress: f64,
    /// Last human readable state.
    pub status: String,
    /// Life cycle state.
    pub state: TaskState,
    /// Failure, once the task ended in error or was deleted.
    pub error: Option<String>,
    /// Total size of the download.
    pub total_bytes: u64,
}

impl DownloadTask {
    /// A pending download of `url` into `dst_dir_path`.
    pub fn new<U: Into<String>, D: Into<String>>(url: U, dst_dir_path: D) -> Self {
        DownloadTask {
            url: url.into(),
            dst_dir_path: dst_dir_path.into(),
            ..DownloadTask::default()
        }
    }

    /// Folds a status report into the task. Terminal tasks are left unchanged.
    pub fn apply(&mut self, status: &Status) {
        if self.state.is_terminal() {
            return;
        }
        if !status.new_gid.is_empty() {
            self.gid = status.new_gid.clone();
        }
        self.progress = status.progress;
        self.status = status.status.clone();
        self.total_bytes = status.total_bytes;
        self.state = match (&status.err, status.completed) {
            (Some(err), _) if status.status == crate::thunder::TASK_DELETED => {
                self.error = Some(err.clone());
                TaskState::Deleted
            }
            (Some(err), _) => {
                self.error = Some(err.clone());
                TaskState::Error
            }
            (None, true) => TaskState::Complete,
            (None, false) => TaskState::Running,
        };
    }
}
