use super::range::{BoxedReader, Range, RangeReader};
use crate::errs::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::prelude::*;
use http_body_util::{BodyExt, Empty};
use hyper::{HeaderMap, Method, Request, StatusCode, Uri, header};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use lazy_static::lazy_static;
use std::fmt;
use tokio::io::AsyncReadExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;

type HttpClient = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

lazy_static! {
    static ref HTTP_CLIENT: std::io::Result<HttpClient> = create_http_client();
}

fn create_http_client() -> std::io::Result<HttpClient> {
    let https = HttpsConnectorBuilder::new().with_native_roots()?.https_or_http().enable_http1().build();
    Ok(Client::builder(TokioExecutor::new()).build(https))
}

fn http_client() -> Result<&'static HttpClient> {
    HTTP_CLIENT.as_ref().map_err(|e| Error::transport(format!("could not create http client: {}", e)))
}

/// A non-success response from an origin.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "HTTP error - status: {}", self.status)
    }
}

impl std::error::Error for HttpError {}

/// Reads byte ranges of a URL with ranged GET requests.
///
/// Every range read issues a fresh request carrying the configured headers and a `Range`
/// header. Origins that ignore the `Range` header and answer `200 OK` are tolerated: the
/// leading bytes are read and discarded.
#[derive(Clone, Debug)]
pub struct HttpRangeReader {
    url: String,
    header: HeaderMap,
}

impl HttpRangeReader {
    /// Reads from `url`, sending `header` with every request.
    pub fn new<U: Into<String>>(url: U, header: HeaderMap) -> Self {
        HttpRangeReader { url: url.into(), header }
    }
}

#[async_trait]
impl RangeReader for HttpRangeReader {
    async fn range_read(&self, range: Range) -> Result<BoxedReader> {
        let uri: Uri = self.url.parse().map_err(Error::transport)?;
        let mut request = Request::builder().method(Method::GET).uri(uri);
        for (name, value) in &self.header {
            request = request.header(name, value);
        }
        let request = request
            .header(header::RANGE, range.header_value())
            .body(Empty::<Bytes>::new())
            .map_err(Error::transport)?;

        let response = http_client()?.request(request).await.map_err(Error::transport)?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %self.url, %status, "range request failed");
            return Err(match status.as_u16() {
                404 | 410 => Error::ObjectNotFound,
                401 | 403 => Error::PermissionDenied,
                _ => Error::transport(HttpError { status }),
            });
        }

        let mut reader: BoxedReader = Box::new(
            response
                .into_body()
                .into_data_stream()
                .map_err(std::io::Error::other)
                .into_async_read()
                .compat(),
        );

        if status == StatusCode::OK && range.start > 0 {
            let skipped = tokio::io::copy(&mut (&mut reader).take(range.start), &mut tokio::io::sink()).await?;
            if skipped < range.start {
                return Err(Error::transport(format!("origin body ended after {} bytes, wanted offset {}", skipped, range.start)));
            }
        }

        Ok(match range.length {
            Some(len) => Box::new(reader.take(len)),
            None => reader,
        })
    }
}
