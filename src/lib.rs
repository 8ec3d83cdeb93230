//! ftpgate is an FTP front-end for a multi-backend file gateway, built on [libunftp].
//!
//! The gateway presents heterogeneous storage back-ends as one namespace. This crate adapts that
//! namespace to libunftp's [`StorageBackend`](unftp_core::storage::StorageBackend) so FTP clients
//! can browse it, download with restart offsets and upload with an atomic commit.
//!
//! ```no_run
//! use ftpgate::{GatewayFs, JsonFileAuthenticator, JsonUserStore, ServerExt};
//! use ftpgate_core::meta::MetaList;
//! use ftpgate_sbe_local::LocalStorage;
//! use libunftp::ServerBuilder;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Arc::new(LocalStorage::new("/srv/ftp")?);
//! let gateway = GatewayFs::new(storage, Arc::new(MetaList::default()));
//! let users = Arc::new(JsonUserStore::from_file("users.json")?);
//! let auth = Arc::new(JsonFileAuthenticator::from_file("users.json")?);
//!
//! let server = ServerBuilder::with_gateway(gateway, auth, users).build()?;
//! server.listen("127.0.0.1:2121").await?;
//! # Ok(())
//! # }
//! ```
//!
//! [libunftp]: https://docs.rs/libunftp

pub mod archive;
pub mod auth;
pub mod download;
pub mod ext;
pub mod metadata;
pub mod options;
pub mod upload;
pub mod users;
pub mod vfs;

pub use archive::ArchiveAccess;
pub use auth::{GatewayUser, GatewayUserProvider, JsonFileAuthenticator};
pub use ext::ServerExt;
pub use users::JsonUserStore;
pub use vfs::{GatewayFs, Handle, OpenFlags};
