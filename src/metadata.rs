//! Projection of gateway objects onto libunftp file metadata.

use ftpgate_core::model::Object;
use unftp_core::storage::{Metadata, Permissions, Result};
use std::time::SystemTime;

/// File information reported to FTP clients. Everything is shown as `rwxr-xr-x`, owned by
/// uid and gid 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMeta {
    size: u64,
    is_dir: bool,
    modified: SystemTime,
}

impl From<&Object> for ObjectMeta {
    fn from(obj: &Object) -> Self {
        ObjectMeta {
            size: obj.size,
            is_dir: obj.is_dir,
            modified: obj.modified.into(),
        }
    }
}

impl Metadata for ObjectMeta {
    fn len(&self) -> u64 {
        self.size
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }

    fn is_file(&self) -> bool {
        !self.is_dir
    }

    fn is_symlink(&self) -> bool {
        false
    }

    fn modified(&self) -> Result<SystemTime> {
        Ok(self.modified)
    }

    fn gid(&self) -> u32 {
        0
    }

    fn uid(&self) -> u32 {
        0
    }

    fn permissions(&self) -> Permissions {
        Permissions(0o755)
    }
}
