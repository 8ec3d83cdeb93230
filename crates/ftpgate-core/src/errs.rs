//! The error vocabulary used at the boundary between the gateway and its front-ends.

use crate::BoxError;
use std::io;
use thiserror::Error;

/// Result type used throughout the gateway crates.
pub type Result<T> = std::result::Result<T, Error>;

/// The errors a gateway operation can end with. Front-ends translate these into protocol
/// replies, so the variant chosen determines what the client sees.
#[derive(Debug, Error)]
pub enum Error {
    /// The operation exists in the contract but this implementation does not provide it.
    #[error("not implement")]
    NotImplement,
    /// The operation is deliberately unsupported.
    #[error("not support")]
    NotSupport,
    /// No object exists at the requested path.
    #[error("object not found")]
    ObjectNotFound,
    /// The user may not access the path in the requested way.
    #[error("permission denied")]
    PermissionDenied,
    /// No meta applies to the path. Callers looking up the nearest meta treat this as "no meta".
    #[error("meta not found")]
    MetaNotFound,
    /// The password supplied for an encrypted archive does not open it.
    #[error("wrong archive password")]
    WrongPassword,
    /// Appending to an existing object was requested.
    #[error("append")]
    Append,
    /// A seek resolved to a position before the start of the stream.
    #[error("invalid seek: {0}")]
    InvalidSeek(&'static str),
    /// The request scope was cancelled while the operation was in flight.
    #[error("operation canceled")]
    Canceled,
    /// Fetching bytes from the remote origin failed.
    #[error("transport error")]
    Transport(#[source] BoxError),
    /// A local I/O operation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The archive could not be read.
    #[error("archive error: {0}")]
    Archive(String),
    /// Any other failure, described by its message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wraps a transport-level failure.
    pub fn transport<E>(error: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error::Transport(error.into())
    }

    /// Recovers an error that travelled through an [`io::Error`], for example across a
    /// `std::io::Read` implementation. Other I/O errors are wrapped as [`Error::Io`].
    pub fn from_io(err: io::Error) -> Error {
        if !err.get_ref().is_some_and(|inner| inner.is::<Error>()) {
            return Error::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            _ => Error::Other("I/O error lost its source".to_string()),
        }
    }

    /// Whether this error means the object does not exist.
    pub fn is_object_not_found(&self) -> bool {
        match self {
            Error::ObjectNotFound => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        let kind = match err {
            Error::Io(e) => return e,
            Error::NotSupport | Error::NotImplement | Error::Append => io::ErrorKind::Unsupported,
            Error::ObjectNotFound => io::ErrorKind::NotFound,
            Error::PermissionDenied | Error::WrongPassword => io::ErrorKind::PermissionDenied,
            Error::InvalidSeek(_) => io::ErrorKind::InvalidInput,
            Error::Canceled => io::ErrorKind::Interrupted,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn io_conversion_keeps_kind() {
        let e: io::Error = Error::NotSupport.into();
        assert_eq!(e.kind(), io::ErrorKind::Unsupported);

        let e: io::Error = Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)).into();
        assert_eq!(e.kind(), io::ErrorKind::BrokenPipe);

        let e: io::Error = Error::PermissionDenied.into();
        assert_eq!(e.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn errors_survive_an_io_round_trip() {
        let e: io::Error = Error::WrongPassword.into();
        assert!(matches!(Error::from_io(e), Error::WrongPassword));

        let e = io::Error::from(io::ErrorKind::UnexpectedEof);
        assert!(matches!(Error::from_io(e), Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn append_reads_as_append() {
        assert_eq!(Error::Append.to_string(), "append");
    }
}
