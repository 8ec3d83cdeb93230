use crate::names::decode_name;
use crate::read_at::{ReadAtSeeker, asyncify};
use crate::{Progress, Tool};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate, Utc};
use ftpgate_core::model::{ArchiveArgs, ArchiveMeta, Object};
use ftpgate_core::path;
use ftpgate_core::stream::{BoxedReader, SeekableStream};
use ftpgate_core::{Error, Result};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::io::StreamReader;
use zip::ZipArchive;
use zip::result::ZipError;

type Archive = ZipArchive<ReadAtSeeker>;

const CHUNK_SIZE: usize = 64 * 1024;
const CHANNEL_DEPTH: usize = 8;

/// Reads ZIP archives, including entries encrypted with ZipCrypto or AES.
#[derive(Clone, Copy, Debug, Default)]
pub struct ZipTool;

fn zip_err(err: ZipError) -> Error {
    match err {
        ZipError::InvalidPassword => Error::WrongPassword,
        ZipError::UnsupportedArchive(msg) if msg == ZipError::PASSWORD_REQUIRED => Error::WrongPassword,
        ZipError::FileNotFound => Error::ObjectNotFound,
        ZipError::Io(e) => Error::from_io(e),
        other => Error::Archive(other.to_string()),
    }
}

fn open_archive(stream: Arc<SeekableStream>, handle: Handle) -> Result<Archive> {
    ZipArchive::new(ReadAtSeeker::new(stream, handle)).map_err(zip_err)
}

/// An entry's metadata, read without decrypting or inflating it.
struct EntryInfo {
    index: usize,
    name: String,
    size: u64,
    is_dir: bool,
    encrypted: bool,
    modified: DateTime<Utc>,
}

impl EntryInfo {
    fn to_object(&self) -> Object {
        let trimmed = self.name.trim_end_matches('/');
        let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
        Object {
            id: String::new(),
            path: format!("/{}", trimmed),
            name: name.to_string(),
            size: if self.is_dir { 0 } else { self.size },
            modified: self.modified,
            is_dir: self.is_dir,
        }
    }
}

fn to_utc(dt: Option<zip::DateTime>) -> DateTime<Utc> {
    dt.and_then(|dt| {
        NaiveDate::from_ymd_opt(i32::from(dt.year()), u32::from(dt.month()), u32::from(dt.day()))?.and_hms_opt(
            u32::from(dt.hour()),
            u32::from(dt.minute()),
            u32::from(dt.second()),
        )
    })
    .map(|naive| naive.and_utc())
    .unwrap_or_default()
}

fn entries(archive: &mut Archive) -> Result<Vec<EntryInfo>> {
    (0..archive.len())
        .map(|index| {
            let file = archive.by_index_raw(index).map_err(zip_err)?;
            let name = decode_name(file.name_raw(), file.name());
            Ok(EntryInfo {
                index,
                is_dir: file.is_dir() || name.ends_with('/'),
                size: file.size(),
                encrypted: file.encrypted(),
                modified: to_utc(file.last_modified()),
                name,
            })
        })
        .collect()
}

/// Opens and drops the first encrypted entry so a bad password fails before anything is
/// returned.
fn verify_password(archive: &mut Archive, entries: &[EntryInfo], password: &str) -> Result<()> {
    if let Some(entry) = entries.iter().find(|e| e.encrypted) {
        archive.by_index_decrypt(entry.index, password.as_bytes()).map_err(zip_err)?;
    }
    Ok(())
}

/// The directory part of an entry name with a trailing slash, `./` for top level entries.
fn parent_dir(name: &str) -> String {
    match name.trim_end_matches('/').rsplit_once('/') {
        Some((dir, _)) => format!("{}/", dir),
        None => "./".to_string(),
    }
}

/// Places an entry name under `out_dir`, refusing names that climb out of it.
fn safe_join(out_dir: &Path, name: &str) -> Result<PathBuf> {
    let rel = path::normalize(name)?;
    Ok(out_dir.join(rel.trim_start_matches('/')))
}

fn write_entry(archive: &mut Archive, entry: &EntryInfo, rel_name: &str, out_dir: &Path, password: &str) -> Result<()> {
    let target = safe_join(out_dir, rel_name)?;
    if entry.is_dir || rel_name.is_empty() {
        fs::create_dir_all(&target)?;
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = if entry.encrypted {
        archive.by_index_decrypt(entry.index, password.as_bytes())
    } else {
        archive.by_index(entry.index)
    }
    .map_err(zip_err)?;
    let mut out = fs::File::create(&target)?;
    io::copy(&mut file, &mut out).map_err(Error::from_io)?;
    tracing::trace!(entry = %entry.name, target = %target.display(), "decompressed entry");
    Ok(())
}

fn list_entries(archive: &mut Archive, args: &ArchiveArgs) -> Result<Vec<Object>> {
    let entries = entries(archive)?;
    verify_password(archive, &entries, &args.password)?;

    let inner = args.inner_path.trim_matches('/');
    if inner.is_empty() {
        return Ok(entries
            .iter()
            .filter(|e| !e.name.trim_end_matches('/').contains('/'))
            .map(EntryInfo::to_object)
            .collect());
    }

    let inner = format!("{}/", inner);
    let mut exists = false;
    let mut children = Vec::new();
    for entry in &entries {
        if entry.name == inner {
            exists = true;
        }
        if parent_dir(&entry.name) == inner {
            children.push(entry.to_object());
        }
    }
    if !exists {
        return Err(Error::ObjectNotFound);
    }
    Ok(children)
}

fn decompress_entries(archive: &mut Archive, out_dir: &Path, args: &ArchiveArgs, progress: &Progress) -> Result<()> {
    let entries = entries(archive)?;
    let password = args.password.as_str();
    let inner = args.inner_path.trim_matches('/');

    if inner.is_empty() {
        let total = entries.len();
        for (i, entry) in entries.iter().enumerate() {
            write_entry(archive, entry, &entry.name, out_dir, password)?;
            progress((i + 1) as f64 * 100.0 / total as f64);
        }
        return Ok(());
    }

    if let Some(entry) = entries.iter().find(|e| e.name == inner) {
        write_entry(archive, entry, &path::base_name(inner), out_dir, password)?;
        progress(100.0);
        return Ok(());
    }

    let prefix = format!("{}/", inner);
    let subtree: Vec<&EntryInfo> = entries.iter().filter(|e| e.name.starts_with(&prefix)).collect();
    if subtree.is_empty() {
        return Err(Error::ObjectNotFound);
    }
    let base_dir = out_dir.join(path::base_name(inner));
    let mut created_base_dir = false;
    for (i, entry) in subtree.iter().enumerate() {
        if !created_base_dir {
            fs::create_dir(&base_dir)?;
            created_base_dir = true;
        }
        write_entry(archive, entry, &entry.name[prefix.len()..], &base_dir, password)?;
        progress((i + 1) as f64 * 100.0 / subtree.len() as f64);
    }
    Ok(())
}

#[async_trait]
impl Tool for ZipTool {
    fn accepted_extensions(&self) -> &'static [&'static str] {
        &[".zip"]
    }

    #[tracing_attributes::instrument(skip_all)]
    async fn get_meta(&self, stream: Arc<SeekableStream>, _args: &ArchiveArgs) -> Result<ArchiveMeta> {
        let handle = Handle::current();
        asyncify(move || {
            let mut archive = open_archive(stream, handle)?;
            let encrypted = entries(&mut archive)?.iter().any(|e| e.encrypted);
            let comment = decode_name(archive.comment(), &String::from_utf8_lossy(archive.comment()));
            Ok(ArchiveMeta { comment, encrypted })
        })
        .await
    }

    #[tracing_attributes::instrument(skip_all, fields(inner_path = %args.inner_path))]
    async fn list(&self, stream: Arc<SeekableStream>, args: &ArchiveArgs) -> Result<Vec<Object>> {
        let handle = Handle::current();
        let args = args.clone();
        asyncify(move || {
            let mut archive = open_archive(stream, handle)?;
            list_entries(&mut archive, &args)
        })
        .await
    }

    #[tracing_attributes::instrument(skip_all, fields(inner_path = %args.inner_path))]
    async fn extract(&self, stream: Arc<SeekableStream>, args: &ArchiveArgs) -> Result<(BoxedReader, u64)> {
        let handle = Handle::current();
        let inner = args.inner_path.trim_start_matches('/').to_string();
        let password = args.password.clone();
        let (opened_tx, opened_rx) = oneshot::channel::<Result<u64>>();
        let (tx, rx) = mpsc::channel::<io::Result<Bytes>>(CHANNEL_DEPTH);

        tokio::task::spawn_blocking(move || {
            let opened = open_archive(stream, handle).and_then(|mut archive| {
                let entry = entries(&mut archive)?
                    .into_iter()
                    .find(|e| e.name == inner && !e.is_dir)
                    .ok_or(Error::ObjectNotFound)?;
                Ok((archive, entry))
            });
            let (mut archive, entry) = match opened {
                Ok(found) => found,
                Err(err) => {
                    let _ = opened_tx.send(Err(err));
                    return;
                }
            };
            let file = if entry.encrypted {
                archive.by_index_decrypt(entry.index, password.as_bytes())
            } else {
                archive.by_index(entry.index)
            };
            let mut file = match file {
                Ok(file) => file,
                Err(err) => {
                    let _ = opened_tx.send(Err(zip_err(err)));
                    return;
                }
            };
            if opened_tx.send(Ok(entry.size)).is_err() {
                return;
            }

            let mut buf = vec![0u8; CHUNK_SIZE];
            loop {
                match file.read(&mut buf) {
                    Ok(0) => return,
                    Ok(n) => {
                        if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                            return;
                        }
                    }
                    Err(err) => {
                        let _ = tx.blocking_send(Err(err));
                        return;
                    }
                }
            }
        });

        let size = opened_rx.await.map_err(|_| Error::Other("archive reader stopped".to_string()))??;
        Ok((Box::new(StreamReader::new(ReceiverStream::new(rx))), size))
    }

    #[tracing_attributes::instrument(skip_all, fields(inner_path = %args.inner_path, out_dir = %out_dir.display()))]
    async fn decompress(&self, stream: Arc<SeekableStream>, out_dir: &Path, args: &ArchiveArgs, progress: Progress) -> Result<()> {
        let handle = Handle::current();
        let out_dir = out_dir.to_path_buf();
        let args = args.clone();
        asyncify(move || {
            let mut archive = open_archive(stream, handle)?;
            decompress_entries(&mut archive, &out_dir, &args, &progress)
        })
        .await
    }
}
