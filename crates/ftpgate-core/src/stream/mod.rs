//! Byte streams flowing between front-ends and storage back-ends.

mod file_stream;
mod http;
mod range;
mod seekable;

pub use file_stream::FileStream;
pub use http::HttpRangeReader;
pub use range::{BoxedReader, BytesRangeReader, Range, RangeReader};
pub use seekable::SeekableStream;
