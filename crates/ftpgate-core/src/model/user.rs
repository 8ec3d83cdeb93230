use crate::errs::{Error, Result};
use crate::path;
use bitflags::bitflags;
use derive_more::Display;
use serde::{Deserialize, Serialize};

bitflags! {
    /// The capabilities granted to a user.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Permission: u32 {
        /// May see objects hidden by a meta's hide rules.
        const SEE_HIDES = 1 << 0;
        /// May enter password protected folders without the password.
        const ACCESS_WITHOUT_PASSWORD = 1 << 1;
        /// May add offline download tasks.
        const ADD_OFFLINE_DOWNLOAD = 1 << 2;
        /// May create and upload.
        const WRITE = 1 << 3;
        /// May rename.
        const RENAME = 1 << 4;
        /// May move between directories.
        const MOVE = 1 << 5;
        /// May copy.
        const COPY = 1 << 6;
        /// May remove.
        const REMOVE = 1 << 7;
        /// May read over WebDAV.
        const WEBDAV_READ = 1 << 8;
        /// May manage over WebDAV.
        const WEBDAV_MANAGE = 1 << 9;
        /// May log in over FTP.
        const FTP_ACCESS = 1 << 10;
        /// May manage over FTP.
        const FTP_MANAGE = 1 << 11;
        /// May browse inside archives.
        const READ_ARCHIVES = 1 << 12;
        /// May decompress archives.
        const DECOMPRESS = 1 << 13;

        /// Bits 0 through 9, the set granted to the admin by bootstrap.
        const BASIC = 0x3FF;
    }
}

impl Permission {
    /// May see hidden objects.
    pub fn can_see_hides(self) -> bool {
        self.contains(Permission::SEE_HIDES)
    }

    /// May skip folder passwords.
    pub fn can_access_without_password(self) -> bool {
        self.contains(Permission::ACCESS_WITHOUT_PASSWORD)
    }

    /// May write.
    pub fn can_write(self) -> bool {
        self.contains(Permission::WRITE)
    }

    /// May rename.
    pub fn can_rename(self) -> bool {
        self.contains(Permission::RENAME)
    }

    /// May move.
    pub fn can_move(self) -> bool {
        self.contains(Permission::MOVE)
    }

    /// May remove.
    pub fn can_remove(self) -> bool {
        self.contains(Permission::REMOVE)
    }

    /// May log in over FTP.
    pub fn can_ftp_access(self) -> bool {
        self.contains(Permission::FTP_ACCESS)
    }

    /// May manage over FTP.
    pub fn can_ftp_manage(self) -> bool {
        self.contains(Permission::FTP_MANAGE)
    }

    /// May browse archives.
    pub fn can_read_archives(self) -> bool {
        self.contains(Permission::READ_ARCHIVES)
    }

    /// May decompress archives.
    pub fn can_decompress(self) -> bool {
        self.contains(Permission::DECOMPRESS)
    }
}

/// The role of a user account.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular account.
    #[default]
    #[display("general")]
    General,
    /// The anonymous guest account.
    #[display("guest")]
    Guest,
    /// The administrator.
    #[display("admin")]
    Admin,
}

/// A gateway account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric identifier.
    #[serde(default)]
    pub id: u64,
    /// Login name.
    pub username: String,
    /// The directory all of this user's paths are relative to.
    #[serde(default = "root_path")]
    pub base_path: String,
    /// The account role.
    #[serde(default)]
    pub role: Role,
    /// Disabled accounts cannot log in.
    #[serde(default)]
    pub disabled: bool,
    /// Granted capabilities, stored as the raw bit mask.
    #[serde(default, with = "permission_bits")]
    pub permission: Permission,
}

mod permission_bits {
    use super::Permission;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(p: &Permission, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(p.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Permission, D::Error> {
        u32::deserialize(d).map(Permission::from_bits_truncate)
    }
}

fn root_path() -> String {
    "/".to_string()
}

impl User {
    /// A general user rooted at `/` without any permission.
    pub fn new<N: Into<String>>(username: N) -> Self {
        User {
            id: 0,
            username: username.into(),
            base_path: root_path(),
            role: Role::General,
            disabled: false,
            permission: Permission::empty(),
        }
    }

    /// Whether this is the admin account.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether this is the guest account.
    pub fn is_guest(&self) -> bool {
        self.role == Role::Guest
    }

    /// Joins a client supplied path onto the base path. Fails with
    /// [`Error::PermissionDenied`] when the client path climbs above its root.
    pub fn join_path(&self, req_path: &str) -> Result<String> {
        let rel = path::normalize(req_path).map_err(|_| Error::PermissionDenied)?;
        Ok(path::join_base_path(&self.base_path, &rel))
    }
}
