//! Browsing and unpacking archives that live in the gateway namespace.
//!
//! [`ArchiveAccess`] resolves a client path like any other operation, links the archive object
//! and hands a [`SeekableStream`] over it to the tool registered for its extension.

use crate::upload::content_type;
use ftpgate_archive::{Progress, Tool, ToolRegistry};
use ftpgate_core::access::{self, Resolved};
use ftpgate_core::fs::FileSystem;
use ftpgate_core::meta::MetaStore;
use ftpgate_core::model::{ArchiveArgs, ArchiveMeta, LinkArgs, Object};
use ftpgate_core::path;
use ftpgate_core::scope::RequestScope;
use ftpgate_core::stream::{BoxedReader, FileStream, SeekableStream};
use ftpgate_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

const SNIFF_LEN: u64 = 512;

/// Archive operations on top of a storage back-end.
#[derive(Clone, Debug)]
pub struct ArchiveAccess {
    fs: Arc<dyn FileSystem>,
    metas: Arc<dyn MetaStore>,
    tools: Arc<ToolRegistry>,
    temp_dir: PathBuf,
}

impl ArchiveAccess {
    /// Archive access with the default tools, unpacking under the system temp directory.
    pub fn new(fs: Arc<dyn FileSystem>, metas: Arc<dyn MetaStore>) -> Self {
        ArchiveAccess {
            fs,
            metas,
            tools: Arc::new(ToolRegistry::with_defaults()),
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Replaces the tool registry.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    /// Sets where archives are unpacked before their entries are stored.
    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.temp_dir = dir.into();
        self
    }

    async fn open(&self, scope: &RequestScope, archive: &str) -> Result<(Arc<dyn Tool>, Arc<SeekableStream>)> {
        if !scope.user.permission.can_read_archives() {
            return Err(Error::PermissionDenied);
        }
        let Resolved { path, meta } = access::resolve(scope, self.metas.as_ref(), archive).await?;
        let tool = self.tools.for_file(&path::base_name(&path))?;
        let scope = scope.clone().with_meta(meta);
        let args = LinkArgs {
            ip: scope.client_ip,
            header: scope.proxy_header.clone(),
        };
        let (link, obj) = self.fs.link(&scope, &path, args).await?;
        if obj.is_dir {
            return Err(Error::NotSupport);
        }
        let stream = SeekableStream::new(obj, scope, link)?;
        Ok((tool, Arc::new(stream)))
    }

    /// Comment and encryption flag of `archive`.
    #[tracing_attributes::instrument(skip(self, scope, args))]
    pub async fn meta(&self, scope: &RequestScope, archive: &str, args: &ArchiveArgs) -> Result<ArchiveMeta> {
        let (tool, stream) = self.open(scope, archive).await?;
        tool.get_meta(stream, args).await
    }

    /// The children of `args.inner_path` inside `archive`.
    #[tracing_attributes::instrument(skip(self, scope, args), fields(inner = %args.inner_path))]
    pub async fn list(&self, scope: &RequestScope, archive: &str, args: &ArchiveArgs) -> Result<Vec<Object>> {
        let (tool, stream) = self.open(scope, archive).await?;
        tool.list(stream, args).await
    }

    /// Opens the file entry `args.inner_path` and returns its bytes and uncompressed size.
    ///
    /// The archive stream stays open until the returned reader is dropped.
    #[tracing_attributes::instrument(skip(self, scope, args), fields(inner = %args.inner_path))]
    pub async fn extract(&self, scope: &RequestScope, archive: &str, args: &ArchiveArgs) -> Result<(BoxedReader, u64)> {
        let (tool, stream) = self.open(scope, archive).await?;
        tool.extract(stream, args).await
    }

    /// Unpacks `args.inner_path` of `archive` into the gateway directory `dst_dir`.
    ///
    /// Entries are unpacked into a local scratch directory first and then stored one by one,
    /// directories before their contents.
    #[tracing_attributes::instrument(skip(self, scope, args, progress), fields(inner = %args.inner_path))]
    pub async fn decompress(
        &self,
        scope: &RequestScope,
        archive: &str,
        dst_dir: &str,
        args: &ArchiveArgs,
        progress: Progress,
    ) -> Result<()> {
        if !scope.user.permission.can_decompress() {
            return Err(Error::PermissionDenied);
        }
        let dst = access::resolve_writable(scope, self.metas.as_ref(), dst_dir).await?;
        let (tool, stream) = self.open(scope, archive).await?;

        let scratch = tempfile::Builder::new().prefix("unpack-").tempdir_in(&self.temp_dir)?;
        tool.decompress(stream, scratch.path(), args, progress).await?;

        let put_scope = scope.clone().with_meta(dst.meta);
        for (rel, is_dir) in walk(scratch.path()).await? {
            let target = path::join(&dst.path, &rel);
            if is_dir {
                match self.fs.get(&put_scope, &target).await {
                    Ok(obj) if obj.is_dir => continue,
                    _ => self.fs.make_dir(&put_scope, &target).await?,
                }
                continue;
            }
            let stream = local_file_stream(&scratch.path().join(&rel)).await?;
            self.fs.put_directly(&put_scope, &path::parent(&target), stream).await?;
        }
        tracing::debug!(dst = %dst.path, "archive unpacked");
        Ok(())
    }
}

// Every entry below `root` as a `/` separated relative path, parents first.
async fn walk(root: &Path) -> Result<Vec<(String, bool)>> {
    let mut found = Vec::new();
    let mut pending = vec![PathBuf::new()];
    while let Some(rel) = pending.pop() {
        let mut dir = tokio::fs::read_dir(root.join(&rel)).await?;
        while let Some(entry) = dir.next_entry().await? {
            let child = rel.join(entry.file_name());
            let is_dir = entry.file_type().await?.is_dir();
            if is_dir {
                pending.push(child.clone());
            }
            found.push((child, is_dir));
        }
    }
    found.sort();
    Ok(found
        .into_iter()
        .map(|(rel, is_dir)| {
            let rel = rel.iter().map(|c| c.to_string_lossy()).collect::<Vec<_>>().join("/");
            (rel, is_dir)
        })
        .collect())
}

async fn local_file_stream(local: &Path) -> Result<FileStream> {
    let mut file = File::open(local).await?;
    let size = file.metadata().await?.len();
    let mut head = Vec::new();
    (&mut file).take(SNIFF_LEN).read_to_end(&mut head).await?;
    file.rewind().await?;

    let name = local.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let mimetype = content_type(&name, &head);
    Ok(FileStream::from_file(Object::file(name, size), mimetype, file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpgate_core::meta::MetaList;
    use ftpgate_core::model::{Permission, User};
    use ftpgate_sbe_local::LocalStorage;
    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Write};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn archive() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        zip.add_directory("sub/", opts).unwrap();
        zip.add_directory("sub/nested/", opts).unwrap();
        for (name, body) in [("top.txt", "top"), ("sub/a.txt", "alpha"), ("sub/nested/b.txt", "bravo")] {
            zip.start_file(name, opts).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    struct Fixture {
        root: tempfile::TempDir,
        scratch: tempfile::TempDir,
        access: ArchiveAccess,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("out")).unwrap();
        std::fs::write(root.path().join("bundle.zip"), archive()).unwrap();
        std::fs::write(root.path().join("notes.txt"), "plain").unwrap();
        let fs = Arc::new(LocalStorage::new(root.path()).unwrap());
        let access = ArchiveAccess::new(fs, Arc::new(MetaList::default())).with_temp_dir(scratch.path());
        Fixture { root, scratch, access }
    }

    fn scope(permission: Permission) -> RequestScope {
        let mut user = User::new("u");
        user.permission = permission;
        RequestScope::new(Arc::new(user))
    }

    fn archive_reader() -> RequestScope {
        scope(Permission::READ_ARCHIVES)
    }

    fn unpacker() -> RequestScope {
        scope(Permission::READ_ARCHIVES | Permission::DECOMPRESS | Permission::FTP_MANAGE | Permission::WRITE)
    }

    fn names(objects: &[Object]) -> Vec<String> {
        let mut names: Vec<String> = objects.iter().map(|o| o.name.clone()).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn lists_and_extracts() {
        let f = fixture();
        let top = f.access.list(&archive_reader(), "/bundle.zip", &ArchiveArgs::default()).await.unwrap();
        assert_eq!(names(&top), vec!["sub", "top.txt"]);

        let (mut reader, size) = f
            .access
            .extract(&archive_reader(), "/bundle.zip", &ArchiveArgs::new("/sub/a.txt"))
            .await
            .unwrap();
        let mut body = String::new();
        reader.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "alpha");
        assert_eq!(size, 5);

        let meta = f.access.meta(&archive_reader(), "/bundle.zip", &ArchiveArgs::default()).await.unwrap();
        assert!(!meta.encrypted);
    }

    #[tokio::test]
    async fn needs_archive_permission_and_a_known_extension() {
        let f = fixture();
        let err = f.access.list(&scope(Permission::empty()), "/bundle.zip", &ArchiveArgs::default()).await;
        assert!(matches!(err, Err(Error::PermissionDenied)));
        let err = f.access.list(&archive_reader(), "/notes.txt", &ArchiveArgs::default()).await;
        assert!(matches!(err, Err(Error::NotSupport)));
        let err = f.access.list(&archive_reader(), "/../bundle.zip", &ArchiveArgs::default()).await;
        assert!(matches!(err, Err(Error::PermissionDenied)));
    }

    #[tokio::test]
    async fn decompresses_into_the_namespace() {
        let f = fixture();
        f.access
            .decompress(&unpacker(), "/bundle.zip", "/out", &ArchiveArgs::new("/sub"), Arc::new(|_| {}))
            .await
            .unwrap();

        let out = f.root.path().join("out");
        assert_eq!(std::fs::read_to_string(out.join("sub/a.txt")).unwrap(), "alpha");
        assert_eq!(std::fs::read_to_string(out.join("sub/nested/b.txt")).unwrap(), "bravo");
        assert!(!out.join("top.txt").exists());
        // scratch space is cleaned up
        assert_eq!(std::fs::read_dir(f.scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn decompress_needs_write_access() {
        let f = fixture();
        let err = f
            .access
            .decompress(&archive_reader(), "/bundle.zip", "/out", &ArchiveArgs::default(), Arc::new(|_| {}))
            .await;
        assert!(matches!(err, Err(Error::PermissionDenied)));

        let no_write = scope(Permission::READ_ARCHIVES | Permission::DECOMPRESS);
        let err = f
            .access
            .decompress(&no_write, "/bundle.zip", "/out", &ArchiveArgs::default(), Arc::new(|_| {}))
            .await;
        assert!(matches!(err, Err(Error::PermissionDenied)));
    }
}
