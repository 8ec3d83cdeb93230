//! Core types and contracts shared by the ftpgate crates.
//!
//! The gateway presents many storage drivers as one namespace. This crate holds the pieces every
//! front-end needs to take part in that namespace:
//!
//! - [`model`]: the uniform [`Object`](model::Object), [`User`](model::User),
//!   [`Meta`](model::Meta) and [`Link`](model::Link) types.
//! - [`fs`]: the [`FileSystem`](fs::FileSystem) contract implemented by storage back-ends.
//! - [`meta`] and [`access`]: nearest-meta lookup and the read/write permission checks that run
//!   before every path access.
//! - [`stream`]: a [`SeekableStream`](stream::SeekableStream) giving random access over a
//!   resource whose native interface is a ranged GET.
//! - [`scope`]: the per-request [`RequestScope`](scope::RequestScope).

pub mod access;
pub mod bootstrap;
pub mod errs;
pub mod fs;
pub mod meta;
pub mod model;
pub mod path;
pub mod scope;
pub mod store;
pub mod stream;

pub use errs::{Error, Result};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
