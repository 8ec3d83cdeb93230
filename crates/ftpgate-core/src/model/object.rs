use chrono::{DateTime, Utc};

/// A snapshot of a file or directory as reported by a storage back-end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Object {
    /// Driver private identifier. Empty when the driver addresses by path.
    pub id: String,
    /// Driver private path of the object.
    pub path: String,
    /// The base name.
    pub name: String,
    /// Size in bytes. Zero for directories.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
    /// Whether this is a directory.
    pub is_dir: bool,
}

impl Object {
    /// A file object with the given name and size, modified now.
    pub fn file<N: Into<String>>(name: N, size: u64) -> Self {
        Object {
            id: String::new(),
            path: String::new(),
            name: name.into(),
            size,
            modified: Utc::now(),
            is_dir: false,
        }
    }

    /// A directory object with the given name, modified now.
    pub fn dir<N: Into<String>>(name: N) -> Self {
        Object {
            is_dir: true,
            ..Object::file(name, 0)
        }
    }

    /// Sets the driver private path.
    pub fn with_path<P: Into<String>>(mut self, path: P) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the modification time.
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = modified;
        self
    }
}
