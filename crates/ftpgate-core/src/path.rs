//! Helpers for the `/` separated virtual paths of the gateway namespace.
//!
//! Virtual paths are always absolute once cleaned. They never touch the local filesystem, so
//! these functions work on strings rather than [`std::path::Path`].

use crate::errs::{Error, Result};

/// Cleans a path lexically. `.` segments and duplicate slashes are dropped and `..` climbs one
/// segment, stopping at the root. The result always starts with `/`.
pub fn fix_and_clean_path(p: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for seg in p.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Cleans a path like [`fix_and_clean_path`] but refuses `..` segments that climb above the
/// root.
pub fn normalize(p: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    for seg in p.split(['/', '\\']) {
        match seg {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(Error::PermissionDenied);
                }
            }
            s => segments.push(s),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Places a cleaned absolute path under `base`.
pub fn join_base_path(base: &str, rel: &str) -> String {
    fix_and_clean_path(&format!("{}/{}", base, rel))
}

/// Whether two paths name the same location once cleaned.
pub fn path_equal(a: &str, b: &str) -> bool {
    fix_and_clean_path(a) == fix_and_clean_path(b)
}

/// Whether `p` is `base` or lies below it.
pub fn is_sub_path(base: &str, p: &str) -> bool {
    let base = fix_and_clean_path(base);
    let p = fix_and_clean_path(p);
    if base == "/" {
        return true;
    }
    p == base || p.strip_prefix(&base).is_some_and(|rest| rest.starts_with('/'))
}

/// The parent directory. The parent of `/` is `/`.
pub fn parent(p: &str) -> String {
    split(p).0
}

/// The last segment, or `/` for the root.
pub fn base_name(p: &str) -> String {
    let p = fix_and_clean_path(p);
    match p.rsplit_once('/') {
        Some((_, "")) | None => "/".to_string(),
        Some((_, name)) => name.to_string(),
    }
}

/// Splits a path into its parent directory and base name.
pub fn split(p: &str) -> (String, String) {
    let p = fix_and_clean_path(p);
    match p.rsplit_once('/') {
        Some((_, "")) | None => ("/".to_string(), String::new()),
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((dir, name)) => (dir.to_string(), name.to_string()),
    }
}

/// Joins a name onto a directory.
pub fn join(dir: &str, name: &str) -> String {
    fix_and_clean_path(&format!("{}/{}", dir, name))
}
