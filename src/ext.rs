//! Builder conveniences for serving the gateway.

use crate::auth::{GatewayUser, GatewayUserProvider};
use crate::options::Options;
use crate::vfs::GatewayFs;
use ftpgate_core::store::UserStore;
use libunftp::ServerBuilder;
use unftp_core::auth::Authenticator;
use std::sync::Arc;

/// Extension trait purely for construction convenience.
pub trait ServerExt: Sized {
    /// Create a new server builder serving `gateway`, authenticating with `authenticator` and
    /// looking accounts up in `users`.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use ftpgate::{GatewayFs, JsonFileAuthenticator, JsonUserStore, ServerExt};
    /// use ftpgate_core::meta::MetaList;
    /// use ftpgate_sbe_local::LocalStorage;
    /// use libunftp::ServerBuilder;
    /// use std::sync::Arc;
    ///
    /// let gateway = GatewayFs::new(Arc::new(LocalStorage::new("/srv/ftp").unwrap()), Arc::new(MetaList::default()));
    /// let auth = Arc::new(JsonFileAuthenticator::from_file("users.json").unwrap());
    /// let users = Arc::new(JsonUserStore::from_file("users.json").unwrap());
    /// let builder = ServerBuilder::with_gateway(gateway, auth, users);
    /// ```
    fn with_gateway(
        gateway: GatewayFs,
        authenticator: Arc<dyn Authenticator + Send + Sync>,
        users: Arc<dyn UserStore>,
    ) -> ServerBuilder<GatewayFs, GatewayUser> {
        ServerBuilder::with_authenticator(Box::new(move || gateway.clone()), authenticator)
            .user_detail_provider(Arc::new(GatewayUserProvider::new(users)))
    }

    /// Applies the greeting, passive port range and idle timeout of `options`.
    fn options(self, options: &Options) -> Self;
}

impl ServerExt for ServerBuilder<GatewayFs, GatewayUser> {
    fn options(self, options: &Options) -> Self {
        self.greeting(options.greeting)
            .passive_ports(options.passive_ports.clone())
            .idle_session_timeout(options.idle_session_timeout)
    }
}
