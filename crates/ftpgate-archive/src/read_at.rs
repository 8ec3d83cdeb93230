use ftpgate_core::stream::{Range, SeekableStream};
use ftpgate_core::{Error, Result};
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;

const WINDOW: u64 = 64 * 1024;

/// A blocking [`Read`] + [`Seek`] view over a [`SeekableStream`].
///
/// Bytes are fetched with range reads through the runtime `Handle`, one window at a time, so
/// it must only be used from a blocking thread such as one started with
/// [`spawn_blocking`](tokio::task::spawn_blocking).
pub struct ReadAtSeeker {
    stream: Arc<SeekableStream>,
    handle: Handle,
    pos: u64,
    window_start: u64,
    window: Vec<u8>,
}

impl ReadAtSeeker {
    /// Reads `stream` using `handle` to drive its range reads.
    pub fn new(stream: Arc<SeekableStream>, handle: Handle) -> Self {
        ReadAtSeeker {
            stream,
            handle,
            pos: 0,
            window_start: 0,
            window: Vec::new(),
        }
    }

    fn fill(&mut self, start: u64) -> io::Result<()> {
        let stream = self.stream.clone();
        let mut window = std::mem::take(&mut self.window);
        window.clear();
        self.window = self.handle.block_on(async move {
            let mut reader = stream.range_read(Range::new(start, WINDOW)).await?;
            reader.read_to_end(&mut window).await?;
            Ok::<_, Error>(window)
        })?;
        self.window_start = start;
        Ok(())
    }
}

impl Read for ReadAtSeeker {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.pos >= self.stream.size() {
            return Ok(0);
        }
        let window_end = self.window_start + self.window.len() as u64;
        if self.pos < self.window_start || self.pos >= window_end {
            self.fill(self.pos)?;
        }
        let offset = (self.pos - self.window_start) as usize;
        let n = (self.window.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&self.window[offset..offset + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for ReadAtSeeker {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::Current(delta) => i128::from(self.pos) + i128::from(delta),
            SeekFrom::End(delta) => i128::from(self.stream.size()) + i128::from(delta),
        };
        if target < 0 {
            return Err(Error::InvalidSeek("negative position").into());
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

/// Runs blocking archive work off the async worker threads.
pub(crate) async fn asyncify<F, T>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(res) => res,
        Err(_) => Err(Error::Other("background task failed".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpgate_core::model::{Link, Object, User};
    use ftpgate_core::scope::RequestScope;
    use ftpgate_core::stream::BytesRangeReader;
    use pretty_assertions::assert_eq;

    #[tokio::test(flavor = "multi_thread")]
    async fn reads_across_windows() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 253) as u8).collect();
        let expected = data.clone();
        let stream = SeekableStream::new(
            Object::file("big.bin", data.len() as u64),
            RequestScope::new(Arc::new(User::new("u"))),
            Link::from_reader(Arc::new(BytesRangeReader::new(data))),
        )
        .unwrap();
        let handle = Handle::current();

        let (tail, all) = tokio::task::spawn_blocking(move || {
            let mut reader = ReadAtSeeker::new(Arc::new(stream), handle);
            reader.seek(SeekFrom::End(-10)).unwrap();
            let mut tail = Vec::new();
            reader.read_to_end(&mut tail).unwrap();

            reader.seek(SeekFrom::Start(0)).unwrap();
            let mut all = Vec::new();
            reader.read_to_end(&mut all).unwrap();
            (tail, all)
        })
        .await
        .unwrap();

        assert_eq!(tail, expected[expected.len() - 10..].to_vec());
        assert_eq!(all.len(), expected.len());
        assert!(all == expected);
    }
}
