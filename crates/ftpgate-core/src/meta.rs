//! Lookup of the meta that governs a path.

use crate::errs::{Error, Result};
use crate::model::Meta;
use crate::path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

/// Persistence of metas.
#[async_trait]
pub trait MetaStore: Send + Sync + Debug {
    /// Returns the meta attached exactly to `path`, or [`Error::MetaNotFound`].
    async fn get_meta_by_path(&self, path: &str) -> Result<Meta>;
}

/// Finds the meta attached to `path` or to its closest ancestor.
///
/// Returns [`Error::MetaNotFound`] when no ancestor up to `/` carries one. Any other store
/// failure ends the walk.
pub async fn nearest_meta(store: &dyn MetaStore, path: &str) -> Result<Meta> {
    let mut current = path::fix_and_clean_path(path);
    loop {
        match store.get_meta_by_path(&current).await {
            Ok(meta) => return Ok(meta),
            Err(Error::MetaNotFound) if current != "/" => current = path::parent(&current),
            Err(e) => return Err(e),
        }
    }
}

/// Like [`nearest_meta`] but maps "no meta" to `None`.
pub async fn nearest_meta_opt(store: &dyn MetaStore, path: &str) -> Result<Option<Meta>> {
    match nearest_meta(store, path).await {
        Ok(meta) => Ok(Some(meta)),
        Err(Error::MetaNotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// An in-memory [`MetaStore`] keyed by cleaned path.
#[derive(Debug, Default)]
pub struct MetaList {
    metas: HashMap<String, Meta>,
}

impl MetaList {
    /// Builds the store from a list of metas.
    pub fn new(metas: Vec<Meta>) -> Self {
        let metas = metas
            .into_iter()
            .map(|m| (path::fix_and_clean_path(&m.path), m))
            .collect();
        MetaList { metas }
    }

    /// Reads a JSON array of metas.
    pub fn from_json(json: &str) -> Result<Self> {
        let metas: Vec<Meta> = serde_json::from_str(json).map_err(|e| Error::Other(format!("could not parse metas: {}", e)))?;
        Ok(MetaList::new(metas))
    }

    /// Reads a JSON array of metas from a file.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let json = std::fs::read_to_string(file)?;
        MetaList::from_json(&json)
    }
}

#[async_trait]
impl MetaStore for MetaList {
    async fn get_meta_by_path(&self, path: &str) -> Result<Meta> {
        self.metas.get(&path::fix_and_clean_path(path)).cloned().ok_or(Error::MetaNotFound)
    }
}
