//! Rotate a console user's password on every server.

use std::sync::Arc;

use cdp_client::ClientFactory;
use cdp_domain::error::{Error, Result};
use cdp_domain::{ProtocolVersion, ServerDescriptor};

use crate::dispatch::VersionDispatcher;

pub struct ChangePassword {
    factory: Arc<dyn ClientFactory>,
    username: String,
    new_password: String,
}

impl ChangePassword {
    pub fn new(factory: Arc<dyn ClientFactory>, username: &str, new_password: &str) -> Self {
        Self {
            factory,
            username: username.to_owned(),
            new_password: new_password.to_owned(),
        }
    }

    /// Parse the `user:newpass` argument form.
    pub fn parse_credentials(arg: &str) -> Result<(String, String)> {
        match arg.split_once(':') {
            Some((user, pass)) if !user.is_empty() => Ok((user.to_owned(), pass.to_owned())),
            _ => Err(Error::Config(format!(
                "expected <username>:<new password>, got {arg:?}"
            ))),
        }
    }

    /// CDP2 has no user API: its handler reports `false` without a call.
    pub fn dispatcher(self: Arc<Self>, workers: usize) -> VersionDispatcher<bool> {
        VersionDispatcher::new()
            .workers(workers)
            .on(&[ProtocolVersion::V2], |_| async { Ok(false) })
            .on(
                &[ProtocolVersion::V3, ProtocolVersion::V4, ProtocolVersion::V5],
                move |s| {
                    let op = self.clone();
                    async move { op.handle_v3(&s).await }
                },
            )
    }

    /// Update every user named `username`. Returns whether any matched.
    pub async fn handle_v3(&self, server: &ServerDescriptor) -> Result<bool> {
        let client = self.factory.cdp(server)?;
        let users = client.users().await?;
        tracing::info!(server = %server.hostname, "checking users");

        let mut updated = false;
        for mut user in users
            .get_users()
            .await?
            .into_iter()
            .filter(|u| u.username == self.username)
        {
            tracing::info!(user = %user.username, id = ?user.id, "updating user");
            user.password = Some(self.new_password.clone());
            users.update_user(&user).await?;
            updated = true;
        }
        Ok(updated)
    }
}
