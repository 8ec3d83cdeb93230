use crate::model::Object;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, ReadBuf};

/// A file being handed to a storage back-end together with its description.
///
/// When the bytes were buffered into a temporary file the stream owns that file; it is deleted
/// when the stream is dropped unless a back-end takes it over with [`FileStream::take_temp`].
#[derive(Debug)]
pub struct FileStream {
    /// Name, size and modification time of the file to store.
    pub obj: Object,
    /// The detected content type.
    pub mimetype: String,
    file: File,
    temp: Option<TempPath>,
}

impl FileStream {
    /// A stream over a temporary file. `file` must be positioned at the start.
    pub fn from_temp(obj: Object, mimetype: String, file: File, temp: TempPath) -> Self {
        FileStream {
            obj,
            mimetype,
            file,
            temp: Some(temp),
        }
    }

    /// A stream over any other open file.
    pub fn from_file(obj: Object, mimetype: String, file: File) -> Self {
        FileStream {
            obj,
            mimetype,
            file,
            temp: None,
        }
    }

    /// Where the temporary file lives, if the stream is backed by one.
    pub fn temp_path(&self) -> Option<&Path> {
        self.temp.as_deref()
    }

    /// Takes ownership of the temporary file. The caller becomes responsible for it.
    pub fn take_temp(&mut self) -> Option<TempPath> {
        self.temp.take()
    }
}

impl AsyncRead for FileStream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.file).poll_read(cx, buf)
    }
}
