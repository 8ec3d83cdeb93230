//! The contract between the gateway and the storage back-ends it mounts.

use crate::errs::Result;
use crate::model::{Link, LinkArgs, Object};
use crate::scope::RequestScope;
use crate::stream::FileStream;
use async_trait::async_trait;
use std::fmt::Debug;

/// A storage back-end addressed by absolute gateway paths.
///
/// Paths handed to a `FileSystem` have already passed the access checks in
/// [`access`](crate::access). Implementations report a missing object with
/// [`Error::ObjectNotFound`](crate::Error::ObjectNotFound).
#[async_trait]
pub trait FileSystem: Send + Sync + Debug {
    /// Returns the object at `path`.
    async fn get(&self, scope: &RequestScope, path: &str) -> Result<Object>;

    /// Returns the immediate children of the directory at `path`.
    async fn list(&self, scope: &RequestScope, path: &str) -> Result<Vec<Object>>;

    /// Resolves a link through which the bytes of the file at `path` can be read.
    async fn link(&self, scope: &RequestScope, path: &str, args: LinkArgs) -> Result<(Link, Object)>;

    /// Stores `stream` as a file named after its object inside `dst_dir`, replacing any file of
    /// that name. The file either appears complete or not at all.
    async fn put_directly(&self, scope: &RequestScope, dst_dir: &str, stream: FileStream) -> Result<()>;

    /// Creates the directory at `path`.
    async fn make_dir(&self, scope: &RequestScope, path: &str) -> Result<()>;

    /// Removes the file or directory at `path`.
    async fn remove(&self, scope: &RequestScope, path: &str) -> Result<()>;

    /// Renames the object at `src_path` to `dst_name` within its directory.
    async fn rename(&self, scope: &RequestScope, src_path: &str, dst_name: &str) -> Result<()>;

    /// Moves the object at `src_path` into `dst_dir`, keeping its name.
    async fn move_to(&self, scope: &RequestScope, src_path: &str, dst_dir: &str) -> Result<()>;
}
