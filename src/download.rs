//! The read side of a file transfer.

use ftpgate_core::stream::{BoxedReader, Range, SeekableStream};
use ftpgate_core::{Error, Result};
use std::fmt;
use std::future::Future;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::task::JoinHandle;

enum ReadState {
    Idle,
    Opening(JoinHandle<Result<BoxedReader>>),
    Reading(BoxedReader),
}

impl ReadState {
    fn reset(&mut self) {
        if let ReadState::Opening(handle) = self {
            handle.abort();
        }
        *self = ReadState::Idle;
    }
}

/// A read-only transfer handle over a [`SeekableStream`].
///
/// Reads continue from a cursor through one open range reader. A seek drops that reader; the
/// next read opens a new one at the cursor and runs to the end of the file.
pub struct DownloadProxy {
    stream: SeekableStream,
    state: ReadState,
    cursor: u64,
    closed: bool,
}

impl DownloadProxy {
    /// A proxy over `stream` positioned at `offset`.
    pub fn open(stream: SeekableStream, offset: u64) -> Result<Self> {
        let mut proxy = DownloadProxy {
            stream,
            state: ReadState::Idle,
            cursor: 0,
            closed: false,
        };
        proxy.seek(SeekFrom::Start(offset))?;
        Ok(proxy)
    }

    /// The total size of the file.
    pub fn size(&self) -> u64 {
        self.stream.size()
    }

    /// The offset the next read starts at.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Moves the cursor and returns the new position. On failure the cursor stays where it was.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let size = self.stream.size();
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.cursor) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(size) + i128::from(delta),
        };
        if target < 0 {
            return Err(Error::InvalidSeek("negative position"));
        }
        if target > i128::from(size) {
            return Err(Error::NotSupport);
        }
        self.state.reset();
        self.cursor = target as u64;
        Ok(self.cursor)
    }

    /// Downloads cannot be written to.
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(Error::NotSupport)
    }

    /// Releases the stream. Later calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.state.reset();
            self.stream.close();
            self.closed = true;
        }
    }

    /// Whether [`close`](DownloadProxy::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl AsyncRead for DownloadProxy {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                ReadState::Idle => {
                    if this.closed {
                        return Poll::Ready(Err(io::Error::other("download is closed")));
                    }
                    if this.cursor >= this.stream.size() || buf.remaining() == 0 {
                        return Poll::Ready(Ok(()));
                    }
                    let open = this.stream.range_read_owned(Range::to_end(this.cursor));
                    this.state = ReadState::Opening(tokio::spawn(open));
                }
                ReadState::Opening(handle) => {
                    let opened = ready!(Pin::new(handle).poll(cx));
                    match opened {
                        Ok(Ok(reader)) => this.state = ReadState::Reading(reader),
                        Ok(Err(err)) => {
                            this.state = ReadState::Idle;
                            return Poll::Ready(Err(err.into()));
                        }
                        Err(join) => {
                            this.state = ReadState::Idle;
                            return Poll::Ready(Err(io::Error::other(join)));
                        }
                    }
                }
                ReadState::Reading(reader) => {
                    let before = buf.filled().len();
                    ready!(Pin::new(reader).poll_read(cx, buf))?;
                    this.cursor += (buf.filled().len() - before) as u64;
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

impl AsyncWrite for DownloadProxy {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(Error::NotSupport.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.get_mut().close();
        Poll::Ready(Ok(()))
    }
}

impl Drop for DownloadProxy {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for DownloadProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadProxy")
            .field("stream", &self.stream)
            .field("cursor", &self.cursor)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
