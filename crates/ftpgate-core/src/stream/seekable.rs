use super::http::HttpRangeReader;
use super::range::{BoxedReader, Range, RangeReader};
use crate::errs::{Error, Result};
use crate::model::{Link, Object};
use crate::scope::RequestScope;
use futures::future::BoxFuture;
use std::fmt;
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

/// Random access over a resource whose native interface is a ranged read.
///
/// The stream knows the total size up front. Sequential [`read`](SeekableStream::read)s reuse
/// one open reader; a [`seek`](SeekableStream::seek) drops it and the next read opens a new one
/// at the cursor. [`range_read`](SeekableStream::range_read) hands out independent readers and
/// only needs a shared reference.
pub struct SeekableStream {
    obj: Object,
    scope: RequestScope,
    size: u64,
    source: Arc<dyn RangeReader>,
    reader: Option<BoxedReader>,
    cursor: u64,
    closed: bool,
}

impl SeekableStream {
    /// Wraps a link to the bytes of `obj`.
    ///
    /// A native range reader on the link is used as is. Otherwise the link URL is fetched with
    /// ranged GET requests carrying the link headers.
    pub fn new(obj: Object, scope: RequestScope, link: Link) -> Result<Self> {
        let size = link.content_length.unwrap_or(obj.size);
        let source: Arc<dyn RangeReader> = match (link.range_reader, link.url) {
            (Some(reader), _) => reader,
            (None, Some(url)) => Arc::new(HttpRangeReader::new(url, link.header)),
            (None, None) => return Err(Error::Other(format!("link for {} has neither a url nor a reader", obj.name))),
        };
        Ok(SeekableStream {
            obj,
            scope,
            size,
            source,
            reader: None,
            cursor: 0,
            closed: false,
        })
    }

    /// The total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The object the bytes belong to.
    pub fn object(&self) -> &Object {
        &self.obj
    }

    /// The current read position.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Opens a fresh reader over `range`, bounded by the stream size.
    ///
    /// Fails with [`Error::NotSupport`] when the range starts past the end and with
    /// [`Error::Canceled`] when the request scope is cancelled first.
    pub async fn range_read(&self, range: Range) -> Result<BoxedReader> {
        self.range_read_owned(range).await
    }

    /// Like [`range_read`](SeekableStream::range_read), but the returned future does not borrow
    /// the stream and can be spawned.
    pub fn range_read_owned(&self, range: Range) -> BoxFuture<'static, Result<BoxedReader>> {
        let closed = self.closed;
        let size = self.size;
        let source = self.source.clone();
        let cancel = self.scope.cancellation().clone();
        Box::pin(async move {
            if closed {
                return Err(Error::Other("stream is closed".to_string()));
            }
            let range = range.clamp(size)?;
            if range.length == Some(0) {
                let empty: BoxedReader = Box::new(tokio::io::empty());
                return Ok(empty);
            }
            match cancel.run_until_cancelled(source.range_read(range)).await {
                Some(result) => result,
                None => Err(Error::Canceled),
            }
        })
    }

    /// Reads from the cursor into `buf`, returning the number of bytes read. Zero means the end
    /// was reached.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.cursor >= self.size || buf.is_empty() {
            return Ok(0);
        }
        if self.reader.is_none() {
            let reader = self.range_read(Range::to_end(self.cursor)).await?;
            self.reader = Some(reader);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };
        let n = reader.read(buf).await?;
        self.cursor += n as u64;
        Ok(n)
    }

    /// Moves the cursor and returns the new position.
    ///
    /// Positions before the start fail with [`Error::InvalidSeek`] and positions past the end
    /// with [`Error::NotSupport`]. A failed seek leaves the cursor unchanged.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.cursor) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.size) + i128::from(delta),
        };
        if target < 0 {
            return Err(Error::InvalidSeek("negative position"));
        }
        if target > i128::from(self.size) {
            return Err(Error::NotSupport);
        }
        self.reader = None;
        self.cursor = target as u64;
        Ok(self.cursor)
    }

    /// Releases the open reader. Later calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::trace!(name = %self.obj.name, "closing seekable stream");
            self.reader = None;
            self.closed = true;
        }
    }

    /// Whether [`close`](SeekableStream::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl fmt::Debug for SeekableStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeekableStream")
            .field("obj", &self.obj)
            .field("size", &self.size)
            .field("cursor", &self.cursor)
            .field("closed", &self.closed)
            .finish()
    }
}
