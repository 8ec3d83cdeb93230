//! The gateway namespace as a libunftp storage back-end.

use crate::auth::GatewayUser;
use crate::download::DownloadProxy;
use crate::metadata::ObjectMeta;
use crate::upload::UploadProxy;
use async_trait::async_trait;
use ftpgate_core::access::{self, Resolved};
use ftpgate_core::fs::FileSystem;
use ftpgate_core::meta::MetaStore;
use ftpgate_core::model::{LinkArgs, Object};
use ftpgate_core::path;
use ftpgate_core::scope::RequestScope;
use ftpgate_core::stream::SeekableStream;
use ftpgate_core::{Error as GatewayError, Result as GatewayResult};
use hyper::HeaderMap;
use unftp_core::storage::{Error, ErrorKind, FEATURE_RESTART, Fileinfo, Metadata, Result, StorageBackend};
use std::fmt::Debug;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::io::AsyncRead;

bitflags::bitflags! {
    /// How a transfer handle is opened.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for writing only.
        const WRITE_ONLY = 1;
        /// Append to the end of the file.
        const APPEND = 1 << 1;
        /// Create the file if it does not exist.
        const CREATE = 1 << 2;
        /// Truncate an existing file.
        const TRUNCATE = 1 << 3;
    }
}

/// An open transfer handle.
#[derive(Debug)]
pub enum Handle {
    /// A download positioned at the requested offset.
    Download(DownloadProxy),
    /// An upload that commits when closed.
    Upload(UploadProxy),
}

/// Maps a gateway error onto the FTP reply libunftp sends for it.
pub fn storage_error(err: GatewayError) -> Error {
    let kind = match &err {
        GatewayError::PermissionDenied | GatewayError::WrongPassword => ErrorKind::PermissionDenied,
        GatewayError::ObjectNotFound | GatewayError::MetaNotFound => ErrorKind::PermanentFileNotAvailable,
        GatewayError::NotSupport | GatewayError::NotImplement | GatewayError::Append => ErrorKind::CommandNotImplemented,
        GatewayError::Transport(_) | GatewayError::Canceled => ErrorKind::TransientFileNotAvailable,
        GatewayError::Io(e) if e.kind() == io::ErrorKind::NotFound => ErrorKind::PermanentFileNotAvailable,
        GatewayError::Io(e) if e.kind() == io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        _ => ErrorKind::LocalError,
    };
    Error::new(kind, err)
}

fn path_str<P: AsRef<Path>>(p: P) -> String {
    p.as_ref().to_string_lossy().into_owned()
}

/// The gateway's file namespace seen through the eyes of one FTP session.
///
/// Every operation resolves the client path against the user's base path and checks access
/// before the storage back-end sees it. Mutating operations also need write access to the
/// parent directory.
#[derive(Clone, Debug)]
pub struct GatewayFs {
    fs: Arc<dyn FileSystem>,
    metas: Arc<dyn MetaStore>,
    temp_dir: PathBuf,
    proxy_header: HeaderMap,
}

impl GatewayFs {
    /// A namespace served by `fs` with folder policies from `metas`.
    pub fn new(fs: Arc<dyn FileSystem>, metas: Arc<dyn MetaStore>) -> Self {
        GatewayFs {
            fs,
            metas,
            temp_dir: std::env::temp_dir(),
            proxy_header: HeaderMap::new(),
        }
    }

    /// Sets where uploads are buffered.
    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Sets headers forwarded to origins when links are fetched.
    pub fn with_proxy_header(mut self, header: HeaderMap) -> Self {
        self.proxy_header = header;
        self
    }

    /// The request scope for a call made by `user`.
    pub fn scope(&self, user: &GatewayUser) -> RequestScope {
        RequestScope::new(user.user.clone())
            .with_meta_pass(user.meta_pass.clone())
            .with_proxy_header(self.proxy_header.clone())
    }

    async fn readable(&self, scope: &RequestScope, path: &str) -> GatewayResult<(RequestScope, Resolved)> {
        let resolved = access::resolve(scope, self.metas.as_ref(), path).await?;
        Ok((scope.clone().with_meta(resolved.meta.clone()), resolved))
    }

    async fn writable(&self, scope: &RequestScope, path: &str) -> GatewayResult<(RequestScope, Resolved)> {
        let resolved = access::resolve_writable(scope, self.metas.as_ref(), path).await?;
        Ok((scope.clone().with_meta(resolved.meta.clone()), resolved))
    }

    /// Returns the object at `path`.
    pub async fn stat(&self, scope: &RequestScope, path: &str) -> GatewayResult<Object> {
        let (scope, r) = self.readable(scope, path).await?;
        self.fs.get(&scope, &r.path).await
    }

    /// Returns the visible children of the directory at `path`.
    pub async fn read_dir(&self, scope: &RequestScope, path: &str) -> GatewayResult<Vec<Object>> {
        let (scope, r) = self.readable(scope, path).await?;
        let objects = self.fs.list(&scope, &r.path).await?;
        Ok(objects
            .into_iter()
            .filter(|obj| {
                let child = path::join(&r.path, &obj.name);
                access::can_access(&scope.user, r.meta.as_ref(), &child, &scope.meta_pass)
            })
            .collect())
    }

    /// Creates the directory at `path`.
    pub async fn mkdir(&self, scope: &RequestScope, path: &str) -> GatewayResult<()> {
        let (scope, r) = self.writable(scope, path).await?;
        self.fs.make_dir(&scope, &r.path).await
    }

    /// Same as [`mkdir`](GatewayFs::mkdir).
    pub async fn mkdir_all(&self, scope: &RequestScope, path: &str) -> GatewayResult<()> {
        self.mkdir(scope, path).await
    }

    /// Removes the file or directory at `path`.
    pub async fn remove(&self, scope: &RequestScope, path: &str) -> GatewayResult<()> {
        if !scope.user.permission.can_remove() {
            return Err(GatewayError::PermissionDenied);
        }
        let (scope, r) = self.writable(scope, path).await?;
        self.fs.remove(&scope, &r.path).await
    }

    /// Same as [`remove`](GatewayFs::remove); directories are removed with their contents.
    pub async fn remove_all(&self, scope: &RequestScope, path: &str) -> GatewayResult<()> {
        self.remove(scope, path).await
    }

    /// Moves `old` to `new`. Within one directory this is a rename; across directories the object
    /// is moved first and then renamed if its name changes.
    pub async fn rename(&self, scope: &RequestScope, old: &str, new: &str) -> GatewayResult<()> {
        let perm = scope.user.permission;
        if !perm.can_rename() {
            return Err(GatewayError::PermissionDenied);
        }
        let (scope, src) = self.writable(scope, old).await?;
        let (_, dst) = self.writable(&scope, new).await?;

        let (src_dir, src_name) = path::split(&src.path);
        let (dst_dir, dst_name) = path::split(&dst.path);
        if path::path_equal(&src_dir, &dst_dir) {
            return self.fs.rename(&scope, &src.path, &dst_name).await;
        }
        if !perm.can_move() {
            return Err(GatewayError::PermissionDenied);
        }
        self.fs.move_to(&scope, &src.path, &dst_dir).await?;
        if src_name != dst_name {
            self.fs.rename(&scope, &path::join(&dst_dir, &src_name), &dst_name).await?;
        }
        Ok(())
    }

    /// Permission bits are not supported.
    pub async fn chmod(&self, scope: &RequestScope, path: &str, _mode: u32) -> GatewayResult<()> {
        self.readable(scope, path).await?;
        Err(GatewayError::NotSupport)
    }

    /// Ownership is not supported.
    pub async fn chown(&self, scope: &RequestScope, path: &str, _uid: u32, _gid: u32) -> GatewayResult<()> {
        self.readable(scope, path).await?;
        Err(GatewayError::NotSupport)
    }

    /// Timestamps cannot be set.
    pub async fn chtimes(&self, scope: &RequestScope, path: &str, _atime: SystemTime, _mtime: SystemTime) -> GatewayResult<()> {
        self.readable(scope, path).await?;
        Err(GatewayError::NotSupport)
    }

    /// Opens a transfer handle.
    ///
    /// Writes produce an [`UploadProxy`] and everything else a [`DownloadProxy`] starting at
    /// `offset`. Appending is refused with [`Error::Append`](GatewayError::Append), and so is a
    /// write at a non-zero offset.
    pub async fn get_handle(&self, scope: &RequestScope, path: &str, flags: OpenFlags, offset: u64) -> GatewayResult<Handle> {
        if flags.intersects(OpenFlags::WRITE_ONLY | OpenFlags::APPEND) {
            // takes precedence over access errors
            if flags.contains(OpenFlags::APPEND) || offset != 0 {
                return Err(GatewayError::Append);
            }
            let (scope, r) = self.writable(scope, path).await?;
            let upload = UploadProxy::create(self.fs.clone(), scope, r.path, &self.temp_dir)?;
            return Ok(Handle::Upload(upload));
        }

        let (scope, r) = self.readable(scope, path).await?;
        let args = LinkArgs {
            ip: scope.client_ip,
            header: scope.proxy_header.clone(),
        };
        let (link, obj) = self.fs.link(&scope, &r.path, args).await?;
        let stream = SeekableStream::new(obj, scope, link)?;
        Ok(Handle::Download(DownloadProxy::open(stream, offset)?))
    }
}

#[async_trait]
impl StorageBackend<GatewayUser> for GatewayFs {
    type Metadata = ObjectMeta;

    fn name(&self) -> &str {
        "ftpgate"
    }

    fn supported_features(&self) -> u32 {
        FEATURE_RESTART
    }

    #[tracing_attributes::instrument]
    async fn metadata<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P) -> Result<Self::Metadata> {
        let obj = self.stat(&self.scope(user), &path_str(path)).await.map_err(storage_error)?;
        Ok(ObjectMeta::from(&obj))
    }

    #[tracing_attributes::instrument]
    async fn list<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P) -> Result<Vec<Fileinfo<PathBuf, Self::Metadata>>>
    where
        <Self as StorageBackend<GatewayUser>>::Metadata: Metadata,
    {
        let dir = path_str(path);
        let objects = self.read_dir(&self.scope(user), &dir).await.map_err(storage_error)?;
        Ok(objects
            .iter()
            .map(|obj| Fileinfo {
                path: PathBuf::from(path::join(&dir, &obj.name)),
                metadata: ObjectMeta::from(obj),
            })
            .collect())
    }

    #[tracing_attributes::instrument]
    async fn get<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P, start_pos: u64) -> Result<Box<dyn AsyncRead + Send + Sync + Unpin>> {
        let handle = self
            .get_handle(&self.scope(user), &path_str(path), OpenFlags::empty(), start_pos)
            .await
            .map_err(storage_error)?;
        match handle {
            Handle::Download(download) => Ok(Box::new(download)),
            Handle::Upload(_) => Err(Error::from(ErrorKind::LocalError)),
        }
    }

    #[tracing_attributes::instrument(skip(input))]
    async fn put<P: AsRef<Path> + Send + Debug, R: AsyncRead + Send + Sync + Unpin + 'static>(
        &self,
        user: &GatewayUser,
        mut input: R,
        path: P,
        start_pos: u64,
    ) -> Result<u64> {
        let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE | OpenFlags::TRUNCATE;
        let handle = self
            .get_handle(&self.scope(user), &path_str(path), flags, start_pos)
            .await
            .map_err(storage_error)?;
        let Handle::Upload(mut upload) = handle else {
            return Err(Error::from(ErrorKind::LocalError));
        };
        tokio::io::copy(&mut input, &mut upload)
            .await
            .map_err(|e| storage_error(GatewayError::from_io(e)))?;
        upload.close().await.map_err(storage_error)
    }

    #[tracing_attributes::instrument]
    async fn del<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P) -> Result<()> {
        self.remove(&self.scope(user), &path_str(path)).await.map_err(storage_error)
    }

    #[tracing_attributes::instrument]
    async fn mkd<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P) -> Result<()> {
        self.mkdir(&self.scope(user), &path_str(path)).await.map_err(storage_error)
    }

    #[tracing_attributes::instrument]
    async fn rename<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, from: P, to: P) -> Result<()> {
        GatewayFs::rename(self, &self.scope(user), &path_str(from), &path_str(to))
            .await
            .map_err(storage_error)
    }

    #[tracing_attributes::instrument]
    async fn rmd<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P) -> Result<()> {
        self.remove_all(&self.scope(user), &path_str(path)).await.map_err(storage_error)
    }

    #[tracing_attributes::instrument]
    async fn cwd<P: AsRef<Path> + Send + Debug>(&self, user: &GatewayUser, path: P) -> Result<()> {
        let obj = self.stat(&self.scope(user), &path_str(path)).await.map_err(storage_error)?;
        if obj.is_dir {
            Ok(())
        } else {
            Err(Error::from(ErrorKind::PermanentFileNotAvailable))
        }
    }
}
