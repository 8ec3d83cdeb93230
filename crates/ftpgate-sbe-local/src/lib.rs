//! A [`FileSystem`] that keeps files in a directory on local disk.
//!
//! All paths are resolved through a capability handle on the root directory, so requests cannot
//! escape it through `..` or symlinks.
//!
//! ```no_run
//! use ftpgate_sbe_local::LocalStorage;
//!
//! let storage = LocalStorage::new("/srv/ftp").unwrap();
//! ```

mod cap_fs;

use async_trait::async_trait;
use cap_std::fs::{Dir, Metadata};
use chrono::{DateTime, Utc};
use ftpgate_core::fs::FileSystem;
use ftpgate_core::model::{Link, LinkArgs, Object};
use ftpgate_core::path;
use ftpgate_core::scope::RequestScope;
use ftpgate_core::stream::{BoxedReader, FileStream, Range, RangeReader};
use ftpgate_core::{Error, Result};
use futures::TryStreamExt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Name of the file an upload of `name` is written to before it is renamed into place.
fn staging_name(name: &str) -> String {
    format!(".{}.{}-{}.part", name, process::id(), TEMP_SEQ.fetch_add(1, Ordering::Relaxed))
}

fn is_staging_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('.').and_then(|n| n.strip_suffix(".part")) else {
        return false;
    };
    match rest.rsplit_once('.').and_then(|(_, tag)| tag.split_once('-')) {
        Some((pid, seq)) => {
            let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
            digits(pid) && digits(seq)
        }
        None => false,
    }
}

/// Local disk storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_fd: Arc<Dir>,
    root: PathBuf,
}

impl LocalStorage {
    /// Opens `root` as the storage root. The directory must exist.
    pub fn new<P: Into<PathBuf>>(root: P) -> io::Result<Self> {
        let root = root.into();
        let root_fd = Arc::new(Dir::open_ambient_dir(&root, cap_std::ambient_authority())?);
        Ok(LocalStorage { root_fd, root })
    }

    /// The directory this storage is rooted at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn object(&self, path: &str) -> Result<Object> {
        let meta = cap_fs::metadata(self.root_fd.clone(), relative(path)).await.map_err(map_io)?;
        Ok(to_object(&path::base_name(path), path, &meta))
    }
}

/// Maps an absolute gateway path onto a path relative to the root.
fn relative(p: &str) -> PathBuf {
    let clean = path::fix_and_clean_path(p);
    let trimmed = clean.trim_start_matches('/');
    if trimmed.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(trimmed)
    }
}

fn map_io(err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::NotFound => Error::ObjectNotFound,
        io::ErrorKind::PermissionDenied => Error::PermissionDenied,
        _ => Error::Io(err),
    }
}

fn to_object(name: &str, path: &str, meta: &Metadata) -> Object {
    let modified = meta
        .modified()
        .map(|t| DateTime::<Utc>::from(t.into_std()))
        .unwrap_or_else(|_| Utc::now());
    let obj = if meta.is_dir() {
        Object::dir(name)
    } else {
        Object::file(name, meta.len())
    };
    obj.with_path(path).with_modified(modified)
}

/// Serves byte ranges of a file below the root.
#[derive(Debug)]
struct LocalRangeReader {
    root_fd: Arc<Dir>,
    path: PathBuf,
    size: u64,
}

#[async_trait]
impl RangeReader for LocalRangeReader {
    async fn range_read(&self, range: Range) -> Result<BoxedReader> {
        let range = range.clamp(self.size)?;
        let file = cap_fs::open(self.root_fd.clone(), &self.path).await.map_err(map_io)?;
        let mut file = tokio::fs::File::from_std(file.into_std());
        file.seek(SeekFrom::Start(range.start)).await?;
        Ok(Box::new(file.take(range.length.unwrap_or_default())))
    }
}

#[async_trait]
impl FileSystem for LocalStorage {
    #[tracing_attributes::instrument(skip(self, _scope))]
    async fn get(&self, _scope: &RequestScope, path: &str) -> Result<Object> {
        self.object(path).await
    }

    #[tracing_attributes::instrument(skip(self, _scope))]
    async fn list(&self, _scope: &RequestScope, path: &str) -> Result<Vec<Object>> {
        let dir = self.object(path).await?;
        if !dir.is_dir {
            return Err(Error::ObjectNotFound);
        }
        let mut objects: Vec<Object> = cap_fs::read_dir(self.root_fd.clone(), relative(path))
            // uploads still in flight
            .try_filter(|(entry, _)| futures::future::ready(!is_staging_name(&entry.file_name().to_string_lossy())))
            .map_ok(|(entry, meta)| {
                let name = entry.file_name().to_string_lossy().into_owned();
                let child = path::join(path, &name);
                to_object(&name, &child, &meta)
            })
            .try_collect()
            .await
            .map_err(map_io)?;
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    #[tracing_attributes::instrument(skip(self, _scope, _args))]
    async fn link(&self, _scope: &RequestScope, path: &str, _args: LinkArgs) -> Result<(Link, Object)> {
        let obj = self.object(path).await?;
        if obj.is_dir {
            return Err(Error::NotSupport);
        }
        let reader = LocalRangeReader {
            root_fd: self.root_fd.clone(),
            path: relative(path),
            size: obj.size,
        };
        let mut link = Link::from_reader(Arc::new(reader));
        link.content_length = Some(obj.size);
        Ok((link, obj))
    }

    #[tracing_attributes::instrument(skip(self, _scope, stream), fields(name = %stream.obj.name))]
    async fn put_directly(&self, _scope: &RequestScope, dst_dir: &str, mut stream: FileStream) -> Result<()> {
        let dst = path::join(dst_dir, &stream.obj.name);
        let temp = path::join(dst_dir, &staging_name(&stream.obj.name));

        let file = cap_fs::create(self.root_fd.clone(), relative(&temp)).await.map_err(map_io)?;
        let mut file = tokio::fs::File::from_std(file.into_std());
        let written = async {
            let n = tokio::io::copy(&mut stream, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, io::Error>(n)
        }
        .await;
        drop(file);

        let result = match written {
            Ok(n) => cap_fs::rename(self.root_fd.clone(), relative(&temp), relative(&dst))
                .await
                .map(|_| n),
            Err(e) => Err(e),
        };
        match result {
            Ok(n) => {
                tracing::debug!(bytes = n, path = %dst, "stored file");
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = cap_fs::remove_file(self.root_fd.clone(), relative(&temp)).await {
                    tracing::warn!(error = %cleanup, "could not remove partial upload");
                }
                Err(map_io(e))
            }
        }
    }

    #[tracing_attributes::instrument(skip(self, _scope))]
    async fn make_dir(&self, _scope: &RequestScope, path: &str) -> Result<()> {
        match cap_fs::create_dir(self.root_fd.clone(), relative(path)).await {
            Ok(()) => Ok(()),
            // an existing directory is fine, an existing file is not
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => match self.object(path).await {
                Ok(obj) if obj.is_dir => Ok(()),
                _ => Err(Error::Io(err)),
            },
            Err(err) => Err(map_io(err)),
        }
    }

    #[tracing_attributes::instrument(skip(self, _scope))]
    async fn remove(&self, _scope: &RequestScope, path: &str) -> Result<()> {
        if path::fix_and_clean_path(path) == "/" {
            return Err(Error::PermissionDenied);
        }
        let obj = self.object(path).await?;
        let res = if obj.is_dir {
            cap_fs::remove_dir_all(self.root_fd.clone(), relative(path)).await
        } else {
            cap_fs::remove_file(self.root_fd.clone(), relative(path)).await
        };
        res.map_err(map_io)
    }

    #[tracing_attributes::instrument(skip(self, _scope))]
    async fn rename(&self, _scope: &RequestScope, src_path: &str, dst_name: &str) -> Result<()> {
        let dst = path::join(&path::parent(src_path), dst_name);
        cap_fs::rename(self.root_fd.clone(), relative(src_path), relative(&dst))
            .await
            .map_err(map_io)
    }

    #[tracing_attributes::instrument(skip(self, _scope))]
    async fn move_to(&self, _scope: &RequestScope, src_path: &str, dst_dir: &str) -> Result<()> {
        let dst = path::join(dst_dir, &path::base_name(src_path));
        cap_fs::rename(self.root_fd.clone(), relative(src_path), relative(&dst))
            .await
            .map_err(map_io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpgate_core::model::User;
    use ftpgate_core::stream::SeekableStream;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalStorage, RequestScope) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path()).unwrap();
        let scope = RequestScope::new(Arc::new(User::new("alice")));
        (dir, storage, scope)
    }

    async fn upload(storage: &LocalStorage, scope: &RequestScope, dir: &str, name: &str, body: &[u8]) {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), body).unwrap();
        let file = tokio::fs::File::open(tmp.path()).await.unwrap();
        let stream = FileStream::from_temp(
            Object::file(name, body.len() as u64),
            "application/octet-stream".to_string(),
            file,
            tmp.into_temp_path(),
        );
        storage.put_directly(scope, dir, stream).await.unwrap();
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative("/"), PathBuf::from("."));
        assert_eq!(relative("/a/b"), PathBuf::from("a/b"));
        assert_eq!(relative("/a/../../b"), PathBuf::from("b"));
    }

    #[tokio::test]
    async fn put_then_get_and_list() {
        let (dir, storage, scope) = setup();
        storage.make_dir(&scope, "/docs").await.unwrap();
        upload(&storage, &scope, "/docs", "hello.txt", b"hello world").await;

        let obj = storage.get(&scope, "/docs/hello.txt").await.unwrap();
        assert_eq!(obj.name, "hello.txt");
        assert_eq!(obj.size, 11);
        assert!(!obj.is_dir);

        let listed = storage.list(&scope, "/docs").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].size, obj.size);
        assert_eq!(std::fs::read(dir.path().join("docs/hello.txt")).unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn make_dir_twice() {
        let (_dir, storage, scope) = setup();
        storage.make_dir(&scope, "/docs").await.unwrap();
        storage.make_dir(&scope, "/docs").await.unwrap();
        upload(&storage, &scope, "/", "file", b"x").await;
        assert!(matches!(storage.make_dir(&scope, "/file").await, Err(Error::Io(_))));
        assert!(storage.make_dir(&scope, "/missing/child").await.unwrap_err().is_object_not_found());
    }

    #[tokio::test]
    async fn put_replaces_and_leaves_no_partial_files() {
        let (dir, storage, scope) = setup();
        upload(&storage, &scope, "/", "a.bin", b"first version").await;
        upload(&storage, &scope, "/", "a.bin", b"second").await;

        let names: Vec<String> = storage.list(&scope, "/").await.unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec!["a.bin".to_string()]);
        assert_eq!(std::fs::read(dir.path().join("a.bin")).unwrap(), b"second");
    }

    #[test]
    fn staging_names() {
        let name = staging_name("report.pdf");
        assert!(name.starts_with(".report.pdf."), "{name}");
        assert!(is_staging_name(&name));
        assert!(is_staging_name(".a.b.12-0.part"));
        assert!(!is_staging_name(".notes.part"));
        assert!(!is_staging_name(".a.12-x.part"));
        assert!(!is_staging_name("a.12-3.part"));
    }

    #[tokio::test]
    async fn uploads_in_flight_are_not_listed() {
        let (dir, storage, scope) = setup();
        upload(&storage, &scope, "/", "a.bin", b"done").await;
        std::fs::write(dir.path().join(staging_name("b.bin")), b"half").unwrap();
        std::fs::write(dir.path().join(".notes.part"), b"kept").unwrap();

        let names: Vec<String> = storage.list(&scope, "/").await.unwrap().into_iter().map(|o| o.name).collect();
        assert_eq!(names, vec![".notes.part".to_string(), "a.bin".to_string()]);
    }

    #[tokio::test]
    async fn put_into_missing_dir_fails() {
        let (_dir, storage, scope) = setup();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = tokio::fs::File::open(tmp.path()).await.unwrap();
        let stream = FileStream::from_file(Object::file("x", 0), String::new(), file);
        let err = storage.put_directly(&scope, "/nope", stream).await.unwrap_err();
        assert!(err.is_object_not_found());
    }

    #[tokio::test]
    async fn missing_objects() {
        let (_dir, storage, scope) = setup();
        assert!(storage.get(&scope, "/ghost").await.unwrap_err().is_object_not_found());
        assert!(storage.list(&scope, "/ghost").await.unwrap_err().is_object_not_found());
        assert!(storage.remove(&scope, "/ghost").await.unwrap_err().is_object_not_found());
    }

    #[tokio::test]
    async fn link_serves_ranges() {
        let (_dir, storage, scope) = setup();
        upload(&storage, &scope, "/", "abc.txt", b"abcdefghijklmnopqrstuvwxyz").await;

        let (link, obj) = storage.link(&scope, "/abc.txt", LinkArgs::default()).await.unwrap();
        assert_eq!(link.content_length, Some(26));
        let mut stream = SeekableStream::new(obj, scope.clone(), link).unwrap();
        stream.seek(SeekFrom::Start(10)).unwrap();
        let mut buf = [0u8; 5];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"klmno");

        assert!(matches!(
            storage.link(&scope, "/", LinkArgs::default()).await,
            Err(Error::NotSupport)
        ));
    }

    #[tokio::test]
    async fn rename_move_and_remove() {
        let (dir, storage, scope) = setup();
        storage.make_dir(&scope, "/in").await.unwrap();
        storage.make_dir(&scope, "/out").await.unwrap();
        upload(&storage, &scope, "/in", "a.txt", b"a").await;

        storage.rename(&scope, "/in/a.txt", "b.txt").await.unwrap();
        assert!(dir.path().join("in/b.txt").exists());

        storage.move_to(&scope, "/in/b.txt", "/out").await.unwrap();
        assert!(dir.path().join("out/b.txt").exists());
        assert!(!dir.path().join("in/b.txt").exists());

        storage.remove(&scope, "/out").await.unwrap();
        assert!(!dir.path().join("out").exists());
        assert!(matches!(storage.remove(&scope, "/").await, Err(Error::PermissionDenied)));
    }
}
