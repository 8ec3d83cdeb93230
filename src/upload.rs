//! The write side of a file transfer.
//!
//! Uploads are buffered into a temporary file and handed to the storage back-end in one piece
//! when the transfer closes, so a broken transfer never leaves a partial file behind.

use chrono::Utc;
use ftpgate_core::fs::FileSystem;
use ftpgate_core::model::Object;
use ftpgate_core::path;
use ftpgate_core::scope::RequestScope;
use ftpgate_core::stream::FileStream;
use ftpgate_core::{Error, Result};
use std::fmt;
use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf};

const SNIFF_LEN: usize = 512;

/// Guesses the content type of a file from its first bytes and its name.
pub fn content_type(name: &str, head: &[u8]) -> String {
    if let Some(kind) = infer::get(head) {
        return kind.mime_type().to_string();
    }
    if let Some(guess) = mime_guess::from_path(name).first() {
        return guess.to_string();
    }
    let is_text = !head.is_empty()
        && match std::str::from_utf8(head) {
            Ok(_) => true,
            // a multi-byte character cut off at the end of the sniffed bytes
            Err(e) => e.error_len().is_none(),
        };
    if is_text {
        mime::TEXT_PLAIN_UTF_8.to_string()
    } else {
        mime::APPLICATION_OCTET_STREAM.to_string()
    }
}

/// A write-only transfer handle that commits on [`close`](UploadProxy::close).
pub struct UploadProxy {
    fs: Arc<dyn FileSystem>,
    scope: RequestScope,
    path: String,
    file: Option<File>,
    temp: Option<TempPath>,
}

impl UploadProxy {
    /// Starts an upload to `path`, buffering into a new temporary file under `temp_dir`.
    pub fn create(fs: Arc<dyn FileSystem>, scope: RequestScope, path: String, temp_dir: &Path) -> Result<Self> {
        let temp = tempfile::Builder::new().prefix("file-").tempfile_in(temp_dir)?;
        let (file, temp) = temp.into_parts();
        Ok(UploadProxy {
            fs,
            scope,
            path,
            file: Some(File::from_std(file)),
            temp: Some(temp),
        })
    }

    /// The gateway path the upload is committed to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Uploads cannot be read.
    pub fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(Error::NotSupport)
    }

    /// Uploads cannot seek.
    pub fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::NotSupport)
    }

    /// Hands the buffered bytes to the storage back-end and returns how many there were. A
    /// second call does nothing and returns zero.
    #[tracing_attributes::instrument(skip(self), fields(path = %self.path))]
    pub async fn close(&mut self) -> Result<u64> {
        let (Some(mut file), Some(temp)) = (self.file.take(), self.temp.take()) else {
            return Ok(0);
        };
        file.flush().await?;
        let size = file.stream_position().await?;
        file.rewind().await?;

        let mut head = Vec::with_capacity(SNIFF_LEN);
        (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut head).await?;
        file.rewind().await?;

        let name = path::base_name(&self.path);
        let mimetype = content_type(&name, &head);
        let obj = Object::file(name, size).with_modified(Utc::now());
        let stream = FileStream::from_temp(obj, mimetype, file, temp);

        self.fs.put_directly(&self.scope, &path::parent(&self.path), stream).await?;
        tracing::debug!(size, "upload committed");
        Ok(size)
    }

    /// Whether the upload was closed.
    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    fn file(&mut self) -> io::Result<&mut File> {
        self.file.as_mut().ok_or_else(|| io::Error::other("upload is closed"))
    }
}

impl AsyncWrite for UploadProxy {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut().file() {
            Ok(file) => Pin::new(file).poll_write(cx, buf),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file() {
            Ok(file) => Pin::new(file).poll_flush(cx),
            Err(e) => Poll::Ready(Err(e)),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut().file.as_mut() {
            Some(file) => Pin::new(file).poll_flush(cx),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl AsyncRead for UploadProxy {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(Error::NotSupport.into()))
    }
}

impl fmt::Debug for UploadProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadProxy")
            .field("path", &self.path)
            .field("temp", &self.temp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ftpgate_core::model::{Link, LinkArgs, User};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct Recorder {
        puts: Mutex<Vec<(String, Object, String, Vec<u8>, bool)>>,
    }

    #[async_trait]
    impl FileSystem for Recorder {
        async fn get(&self, _: &RequestScope, _: &str) -> Result<Object> {
            Err(Error::ObjectNotFound)
        }

        async fn list(&self, _: &RequestScope, _: &str) -> Result<Vec<Object>> {
            Ok(Vec::new())
        }

        async fn link(&self, _: &RequestScope, _: &str, _: LinkArgs) -> Result<(Link, Object)> {
            Err(Error::NotImplement)
        }

        async fn put_directly(&self, _: &RequestScope, dst_dir: &str, mut stream: FileStream) -> Result<()> {
            let temp_exists = stream.temp_path().is_some_and(|p| p.exists());
            let mut body = Vec::new();
            stream.read_to_end(&mut body).await?;
            self.puts.lock().unwrap().push((
                dst_dir.to_string(),
                stream.obj.clone(),
                stream.mimetype.clone(),
                body,
                temp_exists,
            ));
            Ok(())
        }

        async fn make_dir(&self, _: &RequestScope, _: &str) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, _: &RequestScope, _: &str) -> Result<()> {
            Ok(())
        }

        async fn rename(&self, _: &RequestScope, _: &str, _: &str) -> Result<()> {
            Ok(())
        }

        async fn move_to(&self, _: &RequestScope, _: &str, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn upload(fs: Arc<Recorder>, dir: &Path, path: &str) -> UploadProxy {
        let scope = RequestScope::new(Arc::new(User::new("u")));
        UploadProxy::create(fs, scope, path.to_string(), dir).unwrap()
    }

    #[tokio::test]
    async fn commits_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let fs = Arc::new(Recorder::default());
        let mut up = upload(fs.clone(), dir.path(), "/docs/notes.txt");
        up.write_all(b"# hello\n").await.unwrap();
        up.write_all(b"world\n").await.unwrap();
        assert_eq!(up.close().await.unwrap(), 14);

        let puts = fs.puts.lock().unwrap();
        let (dst, obj, mime, body, temp_existed) = &puts[0];
        assert_eq!(dst, "/docs");
        assert_eq!(obj.name, "notes.txt");
        assert_eq!(obj.size, 14);
        assert_eq!(mime, "text/plain");
        assert_eq!(body, b"# hello\nworld\n");
        assert!(temp_existed);
        // the temp file is gone once the stream was consumed
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn empty_upload_and_double_close() {
        let dir = tempfile::tempdir().unwrap();
        let fs = Arc::new(Recorder::default());
        let mut up = upload(fs.clone(), dir.path(), "/empty");
        assert_eq!(up.close().await.unwrap(), 0);
        assert_eq!(up.close().await.unwrap(), 0);
        assert!(up.is_closed());
        assert_eq!(fs.puts.lock().unwrap().len(), 1);
        assert!(up.write_all(b"late").await.is_err());
    }

    #[tokio::test]
    async fn reads_and_seeks_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut up = upload(Arc::new(Recorder::default()), dir.path(), "/x");
        assert!(matches!(up.seek(SeekFrom::Start(0)), Err(Error::NotSupport)));
        assert!(matches!(UploadProxy::read(&mut up, &mut [0u8; 1]), Err(Error::NotSupport)));
        let err = AsyncReadExt::read(&mut up, &mut [0u8; 1]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn dropped_upload_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut up = upload(Arc::new(Recorder::default()), dir.path(), "/x");
        up.write_all(b"partial").await.unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        drop(up);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[rstest]
    #[case("a.png", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".as_slice(), "image/png")]
    #[case("a.bin", b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".as_slice(), "image/png")]
    #[case("page.html", b"<p>hi</p>".as_slice(), "text/html")]
    #[case("noext", "grüße".as_bytes(), "text/plain; charset=utf-8")]
    #[case("noext", b"\x01\xc3\x28\x01".as_slice(), "application/octet-stream")]
    #[case("noext", b"".as_slice(), "application/octet-stream")]
    fn sniffing(#[case] name: &str, #[case] head: &[u8], #[case] expected: &str) {
        assert_eq!(content_type(name, head), expected);
    }
}
