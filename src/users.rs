//! Accounts kept in a JSON users file.

use async_trait::async_trait;
use ftpgate_core::model::User;
use ftpgate_core::store::UserStore;
use ftpgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct Account {
    #[serde(flatten)]
    user: User,
    // credentials and anything else the store does not interpret
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// A [`UserStore`] over the users file.
///
/// The file is a JSON array of accounts. Updates are written back when the store was loaded
/// from a file; fields the store does not know about, such as credentials, are kept.
#[derive(Debug)]
pub struct JsonUserStore {
    accounts: RwLock<Vec<Account>>,
    file: Option<PathBuf>,
}

impl JsonUserStore {
    /// Loads the accounts of a users file.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let json = fs::read_to_string(&filename)?;
        let mut store = JsonUserStore::from_json(json)?;
        store.file = Some(filename.as_ref().to_path_buf());
        Ok(store)
    }

    /// Loads accounts from a JSON string. Updates are kept in memory only.
    pub fn from_json<T: Into<String>>(json: T) -> std::result::Result<Self, Box<dyn std::error::Error>> {
        let accounts: Vec<Account> = serde_json::from_str(&json.into())?;
        Ok(JsonUserStore {
            accounts: RwLock::new(accounts),
            file: None,
        })
    }

    async fn find<F: Fn(&User) -> bool>(&self, pred: F) -> Result<User> {
        let accounts = self.accounts.read().await;
        accounts
            .iter()
            .map(|a| &a.user)
            .find(|&u| pred(u))
            .cloned()
            .ok_or(Error::ObjectNotFound)
    }
}

#[async_trait]
impl UserStore for JsonUserStore {
    async fn get_user_by_name(&self, username: &str) -> Result<User> {
        self.find(|u| u.username == username).await
    }

    async fn get_admin(&self) -> Result<User> {
        self.find(User::is_admin).await
    }

    #[tracing_attributes::instrument(skip(self), fields(username = %user.username))]
    async fn update_user(&self, user: &User) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .iter_mut()
            .find(|a| a.user.id == user.id && a.user.username == user.username)
            .ok_or(Error::ObjectNotFound)?;
        account.user = user.clone();

        if let Some(file) = &self.file {
            let json = serde_json::to_string_pretty(&*accounts).map_err(|e| Error::Other(e.to_string()))?;
            tokio::fs::write(file, json).await?;
            tracing::debug!(file = %file.display(), "users file written");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftpgate_core::model::{Permission, Role};
    use pretty_assertions::assert_eq;

    const USERS: &str = r#"[
  {"id": 1, "username": "admin", "role": "admin", "pbkdf2_salt": "s1", "pbkdf2_key": "k1", "pbkdf2_iter": 5000},
  {"id": 2, "username": "bob", "base_path": "/home/bob", "permission": 1032}
]"#;

    #[tokio::test]
    async fn lookups() {
        let store = JsonUserStore::from_json(USERS).unwrap();
        let bob = store.get_user_by_name("bob").await.unwrap();
        assert_eq!(bob.base_path, "/home/bob");
        assert_eq!(bob.permission, Permission::FTP_ACCESS | Permission::WRITE);
        assert_eq!(store.get_admin().await.unwrap().role, Role::Admin);
        assert!(store.get_user_by_name("eve").await.unwrap_err().is_object_not_found());
    }

    #[tokio::test]
    async fn updates_keep_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("users.json");
        std::fs::write(&file, USERS).unwrap();
        let store = JsonUserStore::from_file(&file).unwrap();

        let mut admin = store.get_admin().await.unwrap();
        admin.permission = Permission::BASIC;
        store.update_user(&admin).await.unwrap();
        assert_eq!(store.get_admin().await.unwrap().permission, Permission::BASIC);

        let written: Vec<Value> = serde_json::from_str(&std::fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(written[0]["permission"], 0x3FF);
        assert_eq!(written[0]["pbkdf2_salt"], "s1");
        assert_eq!(written[0]["pbkdf2_iter"], 5000);

        let stranger = User::new("stranger");
        assert!(store.update_user(&stranger).await.unwrap_err().is_object_not_found());
    }
}
