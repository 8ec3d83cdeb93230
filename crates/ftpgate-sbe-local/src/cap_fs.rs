//! Async wrappers around the blocking calls of a capability-based root directory.
//!
//! Every call is resolved relative to the root `Dir`, so paths cannot reach outside it.

use std::{io, path::Path, sync::Arc};

use cap_std::fs::{Dir, DirEntry, File, Metadata};
use tokio::{sync::mpsc, task::spawn_blocking};
use tokio_stream::wrappers::ReceiverStream;

async fn asyncify<F, T>(f: F) -> io::Result<T>
where
    F: FnOnce() -> io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match spawn_blocking(f).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::other("background task failed")),
    }
}

pub async fn create_dir(root: Arc<Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.create_dir(path)).await
}

pub async fn open(root: Arc<Dir>, path: impl AsRef<Path>) -> io::Result<File> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.open(path)).await
}

/// Creates a file, truncating any existing one.
pub async fn create(root: Arc<Dir>, path: impl AsRef<Path>) -> io::Result<File> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.create(path)).await
}

/// Streams the entries of a directory together with their metadata.
pub fn read_dir(root: Arc<Dir>, path: impl AsRef<Path>) -> ReceiverStream<io::Result<(DirEntry, Metadata)>> {
    const CHUNKSIZE: usize = 32;

    let path = path.as_ref().to_owned();
    let (tx, rx) = mpsc::channel(CHUNKSIZE);
    tokio::spawn(spawn_blocking(move || match root.read_dir(path) {
        Ok(entries) => {
            for entry in entries {
                let item = entry.and_then(|entry| entry.metadata().map(|meta| (entry, meta)));
                if tx.blocking_send(item).is_err() {
                    return;
                }
            }
        }
        Err(e) => {
            let _ = tx.blocking_send(Err(e));
        }
    }));
    ReceiverStream::new(rx)
}

pub async fn remove_file(root: Arc<Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.remove_file(path)).await
}

pub async fn remove_dir_all(root: Arc<Dir>, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.remove_dir_all(path)).await
}

/// Renames within the root, replacing `to` if it is a file.
pub async fn rename(root: Arc<Dir>, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
    let from = from.as_ref().to_owned();
    let to = to.as_ref().to_owned();

    asyncify(move || root.rename(from, &root, to)).await
}

pub async fn metadata(root: Arc<Dir>, path: impl AsRef<Path>) -> io::Result<Metadata> {
    let path = path.as_ref().to_owned();
    asyncify(move || root.metadata(path)).await
}
