//! Access checks run before every path operation.

use crate::errs::{Error, Result};
use crate::meta::{MetaStore, nearest_meta_opt};
use crate::model::{Meta, User};
use crate::path;
use crate::scope::RequestScope;
use regex::Regex;

/// Whether a meta attached at `meta_path` governs `req_path`.
fn applies(meta_path: &str, req_path: &str, apply_sub: bool) -> bool {
    path::path_equal(meta_path, req_path) || (apply_sub && path::is_sub_path(meta_path, req_path))
}

fn is_hidden(meta: &Meta, req_path: &str) -> bool {
    let name = path::base_name(req_path);
    meta.hide
        .lines()
        .map(str::trim)
        .filter(|rule| !rule.is_empty())
        .filter_map(|rule| match Regex::new(rule) {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::warn!(meta = %meta.path, rule, %err, "ignoring invalid hide rule");
                None
            }
        })
        .any(|re| re.is_match(&name))
}

/// Whether `user` may read `req_path` under `meta`, given the folder password the client
/// supplied.
///
/// Hide rules of a meta that governs the parent directory make matching names invisible to
/// users that cannot see hidden objects. A meta password guards the meta's own directory and,
/// with `p_sub`, everything below it.
pub fn can_access(user: &User, meta: Option<&Meta>, req_path: &str, password: &str) -> bool {
    let hidden = meta.is_some_and(|meta| {
        !user.permission.can_see_hides()
            && !meta.hide.is_empty()
            && applies(&meta.path, &path::parent(req_path), meta.h_sub)
            && is_hidden(meta, req_path)
    });
    if hidden {
        return false;
    }
    if user.permission.can_access_without_password() {
        return true;
    }
    let Some(meta) = meta else {
        return true;
    };
    if meta.password.is_empty() {
        return true;
    }
    if !path::path_equal(&meta.path, req_path) && !meta.p_sub {
        return true;
    }
    meta.password == password
}

/// Whether `meta` grants write access to `dir` by itself.
pub fn can_write(meta: Option<&Meta>, dir: &str) -> bool {
    match meta {
        Some(meta) => meta.write && (meta.w_sub || path::path_equal(&meta.path, dir)),
        None => false,
    }
}

/// A path that passed its access check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    /// The absolute path in the gateway namespace.
    pub path: String,
    /// The meta governing the path, if any.
    pub meta: Option<Meta>,
}

/// Joins `req_path` onto the scope user's base path, finds its nearest meta and checks read
/// access.
pub async fn resolve(scope: &RequestScope, metas: &dyn MetaStore, req_path: &str) -> Result<Resolved> {
    let path = scope.user.join_path(req_path)?;
    let meta = nearest_meta_opt(metas, &path).await?;
    if !can_access(&scope.user, meta.as_ref(), &path, &scope.meta_pass) {
        tracing::debug!(user = %scope.user.username, %path, "read access denied");
        return Err(Error::PermissionDenied);
    }
    Ok(Resolved { path, meta })
}

/// Like [`resolve`] but additionally requires write access to the parent directory.
///
/// Write access is granted to users that may both manage over FTP and write, or by a meta on
/// the parent directory that grants it.
pub async fn resolve_writable(scope: &RequestScope, metas: &dyn MetaStore, req_path: &str) -> Result<Resolved> {
    let path = scope.user.join_path(req_path)?;
    let dir = path::parent(&path);
    let meta = nearest_meta_opt(metas, &dir).await?;
    let perm = scope.user.permission;
    let readable = can_access(&scope.user, meta.as_ref(), &path, &scope.meta_pass);
    let writable = (perm.can_ftp_manage() && perm.can_write()) || can_write(meta.as_ref(), &dir);
    if !(readable && writable) {
        tracing::debug!(user = %scope.user.username, %path, readable, writable, "write access denied");
        return Err(Error::PermissionDenied);
    }
    Ok(Resolved { path, meta })
}
