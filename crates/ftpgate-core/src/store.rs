//! Persistence of user accounts.

use crate::errs::Result;
use crate::model::User;
use async_trait::async_trait;
use std::fmt::Debug;

/// Looks up and updates user accounts.
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Returns the user with the given login name, or
    /// [`Error::ObjectNotFound`](crate::Error::ObjectNotFound).
    async fn get_user_by_name(&self, username: &str) -> Result<User>;

    /// Returns the admin account.
    async fn get_admin(&self) -> Result<User>;

    /// Replaces the stored account with the same id.
    async fn update_user(&self, user: &User) -> Result<()>;
}
