use serde::{Deserialize, Serialize};

/// A policy annotation attached to a directory. It applies to the directory itself and,
/// depending on the `*_sub` flags, to everything below it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    /// The directory this meta is attached to.
    pub path: String,
    /// Password required to access the directory. Empty means none.
    pub password: String,
    /// The password also guards sub directories.
    pub p_sub: bool,
    /// Grants write access regardless of user permission.
    pub write: bool,
    /// The write grant also applies to sub directories.
    pub w_sub: bool,
    /// Newline separated regular expressions matched against base names to hide.
    pub hide: String,
    /// The hide rules also apply to sub directories.
    pub h_sub: bool,
}
