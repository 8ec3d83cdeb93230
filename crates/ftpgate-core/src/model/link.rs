use crate::stream::RangeReader;
use hyper::HeaderMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

/// A short lived capability to read the bytes of an object.
///
/// A link either names a URL to fetch with ranged GET requests or carries a [`RangeReader`]
/// the driver serves bytes through directly.
#[derive(Clone, Default)]
pub struct Link {
    /// Where to fetch the bytes.
    pub url: Option<String>,
    /// Headers to send with each request to `url`.
    pub header: HeaderMap,
    /// A native range capable reader. Preferred over `url` when present.
    pub range_reader: Option<Arc<dyn RangeReader>>,
    /// Declared content length. Overrides the object size when set.
    pub content_length: Option<u64>,
}

impl Link {
    /// A link fetched over HTTP.
    pub fn from_url<U: Into<String>>(url: U) -> Self {
        Link {
            url: Some(url.into()),
            ..Link::default()
        }
    }

    /// A link served by a native range reader.
    pub fn from_reader(reader: Arc<dyn RangeReader>) -> Self {
        Link {
            range_reader: Some(reader),
            ..Link::default()
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("url", &self.url)
            .field("header", &self.header)
            .field("range_reader", &self.range_reader.is_some())
            .field("content_length", &self.content_length)
            .finish()
    }
}

/// Per request inputs for link resolution.
#[derive(Clone, Debug, Default)]
pub struct LinkArgs {
    /// The address of the client the link is made for.
    pub ip: Option<IpAddr>,
    /// Headers forwarded from the client.
    pub header: HeaderMap,
}
