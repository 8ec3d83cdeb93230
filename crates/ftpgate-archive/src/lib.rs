//! Browsing and extracting archives stored behind the gateway.
//!
//! An archive tool works on a [`SeekableStream`] over the archive object and never needs the
//! whole archive locally. Tools are looked up by file extension in a [`ToolRegistry`].
//!
//! ```no_run
//! # async fn doc(stream: std::sync::Arc<ftpgate_core::stream::SeekableStream>) -> ftpgate_core::Result<()> {
//! use ftpgate_archive::ToolRegistry;
//! use ftpgate_core::model::ArchiveArgs;
//!
//! let registry = ToolRegistry::with_defaults();
//! let tool = registry.for_file("photos.zip")?;
//! let entries = tool.list(stream, &ArchiveArgs::new("/2024")).await?;
//! # Ok(())
//! # }
//! ```

mod names;
mod read_at;
mod zipfile;

pub use read_at::ReadAtSeeker;
pub use zipfile::ZipTool;

use async_trait::async_trait;
use ftpgate_core::model::{ArchiveArgs, ArchiveMeta, Object};
use ftpgate_core::stream::{BoxedReader, SeekableStream};
use ftpgate_core::{Error, Result};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Receives the percentage of work done, from 0 to 100.
pub type Progress = Arc<dyn Fn(f64) + Send + Sync>;

/// A handler for one archive format.
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    /// File extensions this tool accepts, lower case with a leading dot.
    fn accepted_extensions(&self) -> &'static [&'static str];

    /// Reads the archive comment and whether any entry is encrypted.
    async fn get_meta(&self, stream: Arc<SeekableStream>, args: &ArchiveArgs) -> Result<ArchiveMeta>;

    /// Lists the immediate children of `args.inner_path`.
    async fn list(&self, stream: Arc<SeekableStream>, args: &ArchiveArgs) -> Result<Vec<Object>>;

    /// Opens the file entry at `args.inner_path`, returning its bytes and uncompressed size.
    async fn extract(&self, stream: Arc<SeekableStream>, args: &ArchiveArgs) -> Result<(BoxedReader, u64)>;

    /// Writes the entries at or below `args.inner_path` into `out_dir`.
    async fn decompress(&self, stream: Arc<SeekableStream>, out_dir: &Path, args: &ArchiveArgs, progress: Progress) -> Result<()>;
}

/// Archive tools keyed by the extensions they accept.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        ToolRegistry::default()
    }

    /// A registry holding every tool this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(ZipTool));
        registry
    }

    /// Registers `tool` for each of its extensions, replacing earlier registrations.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        for ext in tool.accepted_extensions() {
            self.tools.insert(ext.to_ascii_lowercase(), tool.clone());
        }
    }

    /// The tool for an extension such as `.zip` or `zip`.
    pub fn get(&self, ext: &str) -> Result<Arc<dyn Tool>> {
        let ext = ext.to_ascii_lowercase();
        let key = if ext.starts_with('.') { ext } else { format!(".{}", ext) };
        self.tools.get(&key).cloned().ok_or(Error::NotSupport)
    }

    /// The tool for a file name, matching the longest registered extension.
    pub fn for_file(&self, name: &str) -> Result<Arc<dyn Tool>> {
        let name = name.to_ascii_lowercase();
        self.tools
            .iter()
            .filter(|(ext, _)| name.ends_with(ext.as_str()))
            .max_by_key(|(ext, _)| ext.len())
            .map(|(_, tool)| tool.clone())
            .ok_or(Error::NotSupport)
    }

    /// Every registered extension, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut exts: Vec<String> = self.tools.keys().cloned().collect();
        exts.sort();
        exts
    }
}
