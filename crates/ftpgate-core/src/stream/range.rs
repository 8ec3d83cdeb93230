use crate::errs::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;
use tokio::io::AsyncRead;

/// The reader type handed out by range reads.
pub type BoxedReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// A byte range of a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    /// Offset of the first byte.
    pub start: u64,
    /// Number of bytes, or `None` for everything from `start` to the end.
    pub length: Option<u64>,
}

impl Range {
    /// `length` bytes starting at `start`.
    pub fn new(start: u64, length: u64) -> Self {
        Range { start, length: Some(length) }
    }

    /// Everything from `start` to the end.
    pub fn to_end(start: u64) -> Self {
        Range { start, length: None }
    }

    /// The value of an HTTP `Range` header requesting this range.
    pub fn header_value(&self) -> String {
        match self.length {
            Some(len) if len > 0 => format!("bytes={}-{}", self.start, self.start + len - 1),
            _ => format!("bytes={}-", self.start),
        }
    }

    /// Bounds the range by a resource of `size` bytes. A start beyond the end is rejected with
    /// [`Error::NotSupport`].
    pub fn clamp(self, size: u64) -> Result<Range> {
        if self.start > size {
            return Err(Error::NotSupport);
        }
        let available = size - self.start;
        Ok(Range {
            start: self.start,
            length: Some(self.length.map_or(available, |len| len.min(available))),
        })
    }
}

/// A source that can produce a fresh reader for any byte range of a resource.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Returns a reader positioned at `range.start` that yields at most `range.length` bytes.
    async fn range_read(&self, range: Range) -> Result<BoxedReader>;
}

/// Serves ranges of an in-memory buffer.
#[derive(Clone, Debug)]
pub struct BytesRangeReader(Bytes);

impl BytesRangeReader {
    /// Wraps `bytes`.
    pub fn new<B: Into<Bytes>>(bytes: B) -> Self {
        BytesRangeReader(bytes.into())
    }
}

#[async_trait]
impl RangeReader for BytesRangeReader {
    async fn range_read(&self, range: Range) -> Result<BoxedReader> {
        let range = range.clamp(self.0.len() as u64)?;
        let start = range.start as usize;
        let end = start + range.length.unwrap_or_default() as usize;
        Ok(Box::new(Cursor::new(self.0.slice(start..end))))
    }
}
