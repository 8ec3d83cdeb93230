//! The data model shared by storage back-ends and front-ends.

mod archive;
mod link;
mod meta;
mod object;
mod user;

pub use archive::{ArchiveArgs, ArchiveMeta};
pub use link::{Link, LinkArgs};
pub use meta::Meta;
pub use object::Object;
pub use user::{Permission, Role, User};
