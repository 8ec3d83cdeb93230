//! Per request state passed from a front-end down to the storage layer.

use crate::model::{Meta, User};
use hyper::HeaderMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a storage operation may need to know about the request it serves.
///
/// A front-end builds one scope per call. Cloning is cheap; the user is shared and the
/// cancellation token clones share their cancelled state.
#[derive(Clone, Debug)]
pub struct RequestScope {
    /// The authenticated user.
    pub user: Arc<User>,
    /// The meta resolved for the request path, if any.
    pub meta: Option<Meta>,
    /// Folder password supplied by the client.
    pub meta_pass: String,
    /// Headers forwarded to origins when links are fetched.
    pub proxy_header: HeaderMap,
    /// Address of the client, when the front-end knows it.
    pub client_ip: Option<IpAddr>,
    cancel: CancellationToken,
}

impl RequestScope {
    /// A scope for `user` with no meta, password or headers.
    pub fn new(user: Arc<User>) -> Self {
        RequestScope {
            user,
            meta: None,
            meta_pass: String::new(),
            proxy_header: HeaderMap::new(),
            client_ip: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the resolved meta.
    pub fn with_meta(mut self, meta: Option<Meta>) -> Self {
        self.meta = meta;
        self
    }

    /// Sets the folder password.
    pub fn with_meta_pass<P: Into<String>>(mut self, meta_pass: P) -> Self {
        self.meta_pass = meta_pass.into();
        self
    }

    /// Sets the forwarded headers.
    pub fn with_proxy_header(mut self, header: HeaderMap) -> Self {
        self.proxy_header = header;
        self
    }

    /// Sets the client address.
    pub fn with_client_ip(mut self, ip: Option<IpAddr>) -> Self {
        self.client_ip = ip;
        self
    }

    /// Sets the cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// The token that is cancelled when the request is abandoned.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Abandons the request.
    pub fn cancel(&self) {
        self.cancel.cancel()
    }
}
