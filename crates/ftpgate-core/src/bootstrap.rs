//! One-off fixes applied to persisted state before the gateway starts serving.

use crate::model::Permission;
use crate::store::UserStore;

/// Grants the admin the basic permission bits when none of them is set.
///
/// Accounts created before those bits existed carry none of them and would otherwise be locked
/// out of everything. Failures are logged and do not abort start-up.
pub async fn grant_admin_permissions(store: &dyn UserStore) {
    let mut admin = match store.get_admin().await {
        Ok(admin) => admin,
        Err(err) => {
            tracing::error!(%err, "could not load the admin user");
            return;
        }
    };
    if admin.permission.intersects(Permission::BASIC) {
        return;
    }
    admin.permission |= Permission::BASIC;
    match store.update_user(&admin).await {
        Ok(()) => tracing::info!(user = %admin.username, "granted basic permissions to admin"),
        Err(err) => tracing::error!(user = %admin.username, %err, "could not update the admin user"),
    }
}
