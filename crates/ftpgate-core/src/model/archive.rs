/// Archive level metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArchiveMeta {
    /// The archive comment.
    pub comment: String,
    /// Whether any entry is encrypted.
    pub encrypted: bool,
}

/// Arguments for archive operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveArgs {
    /// A `/` separated path inside the archive. `/` is the archive root.
    pub inner_path: String,
    /// Password for encrypted entries. May be empty.
    pub password: String,
}

impl Default for ArchiveArgs {
    fn default() -> Self {
        ArchiveArgs {
            inner_path: "/".to_string(),
            password: String::new(),
        }
    }
}

impl ArchiveArgs {
    /// Arguments addressing `inner_path` with no password.
    pub fn new<P: Into<String>>(inner_path: P) -> Self {
        ArchiveArgs {
            inner_path: inner_path.into(),
            password: String::new(),
        }
    }

    /// Sets the password.
    pub fn with_password<P: Into<String>>(mut self, password: P) -> Self {
        self.password = password.into();
        self
    }
}
