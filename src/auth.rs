//! Authentication of FTP sessions against the users file.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use ftpgate_core::model::User;
use ftpgate_core::store::UserStore;
use unftp_core::auth::{AuthenticationError, Authenticator, Credentials, Principal, UserDetail, UserDetailError, UserDetailProvider};
use ring::{
    digest::SHA512_OUTPUT_LEN,
    pbkdf2::{PBKDF2_HMAC_SHA512, verify},
};
use serde::Deserialize;
use std::{
    collections::{BTreeSet, HashMap},
    fmt, fs, io,
    num::NonZeroU32,
    path::Path,
    sync::Arc,
    time::Duration,
};
use tokio::time::sleep;

#[derive(Deserialize, Clone, Debug)]
struct AccountCredentials {
    username: String,
    pbkdf2_salt: String,
    pbkdf2_key: String,
    pbkdf2_iter: NonZeroU32,
}

#[derive(Clone)]
struct Password {
    pbkdf2_salt: String,
    pbkdf2_key: [u8; SHA512_OUTPUT_LEN],
    pbkdf2_iter: NonZeroU32,
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Password").field("pbkdf2_iter", &self.pbkdf2_iter).finish_non_exhaustive()
    }
}

/// [`Authenticator`] that verifies passwords against PBKDF2 keys stored in the users file.
///
/// Each account carries a salt, an iteration count and the base64 encoded HMAC-SHA512 key
/// derived from the password. Other fields of the users file are ignored here.
///
/// ```json
/// [
///   {
///     "username": "alice",
///     "pbkdf2_salt": "thisisabadsalt",
///     "pbkdf2_key": "<<BASE_64_KDF>>",
///     "pbkdf2_iter": 500000
///   }
/// ]
/// ```
#[derive(Clone, Debug)]
pub struct JsonFileAuthenticator {
    db: HashMap<String, Password>,
}

impl JsonFileAuthenticator {
    /// Reads the credentials from a users file.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self, Box<dyn std::error::Error>> {
        let json: String = fs::read_to_string(filename)?;
        JsonFileAuthenticator::from_json(json)
    }

    /// Reads the credentials from a JSON string. Salts must be unique.
    pub fn from_json<T: Into<String>>(json: T) -> Result<Self, Box<dyn std::error::Error>> {
        let accounts: Vec<AccountCredentials> = serde_json::from_str(&json.into())?;
        let salts: BTreeSet<&str> = accounts.iter().map(|c| c.pbkdf2_salt.as_str()).collect();
        if accounts.len() != salts.len() {
            return Err(Box::new(io::Error::new(io::ErrorKind::InvalidData, "pbkdf2 salts must be unique")));
        }
        let mut db = HashMap::with_capacity(accounts.len());
        for account in accounts {
            let key: [u8; SHA512_OUTPUT_LEN] = STANDARD.decode(&account.pbkdf2_key)?.try_into().map_err(|_| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("pbkdf2 key of {} is not {} bytes long", account.username, SHA512_OUTPUT_LEN),
                )
            })?;
            db.insert(
                account.username,
                Password {
                    pbkdf2_salt: account.pbkdf2_salt,
                    pbkdf2_key: key,
                    pbkdf2_iter: account.pbkdf2_iter,
                },
            );
        }
        Ok(JsonFileAuthenticator { db })
    }
}

#[async_trait]
impl Authenticator for JsonFileAuthenticator {
    #[tracing_attributes::instrument(skip(creds))]
    async fn authenticate(&self, username: &str, creds: &Credentials) -> Result<Principal, AuthenticationError> {
        let Some(c) = self.db.get(username) else {
            sleep(Duration::from_millis(1500)).await;
            return Err(AuthenticationError::BadUser);
        };
        let Some(password) = creds.password.as_deref() else {
            return Err(AuthenticationError::BadPassword);
        };
        match verify(PBKDF2_HMAC_SHA512, c.pbkdf2_iter, c.pbkdf2_salt.as_bytes(), password.as_bytes(), &c.pbkdf2_key) {
            Ok(()) => Ok(Principal {
                username: username.to_string(),
            }),
            Err(_) => Err(AuthenticationError::BadPassword),
        }
    }
}

/// The user of an FTP session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayUser {
    /// The gateway account.
    pub user: Arc<User>,
    /// Folder password presented for the session.
    pub meta_pass: String,
}

impl GatewayUser {
    /// A session user without a folder password.
    pub fn new(user: User) -> Self {
        GatewayUser {
            user: Arc::new(user),
            meta_pass: String::new(),
        }
    }

    /// Sets the folder password presented for the session.
    pub fn with_meta_pass<P: Into<String>>(mut self, meta_pass: P) -> Self {
        self.meta_pass = meta_pass.into();
        self
    }
}

impl UserDetail for GatewayUser {
    fn account_enabled(&self) -> bool {
        !self.user.disabled
    }
}

impl fmt::Display for GatewayUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user.username)
    }
}

/// Looks up the account of an authenticated principal.
///
/// Disabled accounts and accounts without FTP access are refused.
#[derive(Debug)]
pub struct GatewayUserProvider {
    store: Arc<dyn UserStore>,
}

impl GatewayUserProvider {
    /// A provider reading accounts from `store`.
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        GatewayUserProvider { store }
    }
}

#[async_trait]
impl UserDetailProvider for GatewayUserProvider {
    type User = GatewayUser;

    async fn provide_user_detail(&self, principal: &Principal) -> Result<GatewayUser, UserDetailError> {
        let user = self
            .store
            .get_user_by_name(&principal.username)
            .await
            .map_err(|e| UserDetailError::Generic(format!("failed to find user {}: {}", principal.username, e)))?;
        if user.disabled {
            tracing::info!(username = %user.username, "refused disabled user");
            return Err(UserDetailError::Generic(format!("user {} is disabled", user.username)));
        }
        if !user.permission.can_ftp_access() {
            tracing::info!(username = %user.username, "refused user without ftp access");
            return Err(UserDetailError::Generic(format!("user {} may not use ftp", user.username)));
        }
        Ok(GatewayUser::new(user))
    }
}
