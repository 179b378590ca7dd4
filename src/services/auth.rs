//! Authentication flows and the authorization policy.
//!
//! Login fails closed: an unknown username and a wrong password are
//! indistinguishable to callers, which map both to the same generic
//! authentication error.

use anyhow::Result;

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store};
use crate::entities::users::{self, Role};
use crate::services::credentials;
use crate::services::google::GoogleClaims;

/// Authorization policy for mutating a resource: administrators may act
/// on anything, everyone else only on what they own.
#[must_use]
pub const fn can_modify(caller_role: Role, caller_id: i32, owner_id: i32) -> bool {
    matches!(caller_role, Role::Admin) || caller_id == owner_id
}

pub struct Registration {
    pub username: String,
    pub display_name: String,
    pub password: String,
    pub avatar: Option<String>,
}

pub struct AuthService {
    store: Store,
    security: SecurityConfig,
}

impl AuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig) -> Self {
        Self { store, security }
    }

    /// Create a local account. A session token is minted up front so the
    /// caller is signed in by the returned row.
    pub async fn register(&self, registration: Registration) -> Result<users::Model> {
        let new = NewUser {
            username: registration.username,
            display_name: registration.display_name,
            avatar: registration.avatar,
            password: registration.password,
            role: Role::User,
            google_id: None,
            token: Some(credentials::mint_token()),
        };

        self.store.create_user(new, &self.security).await
    }

    /// Validate username+password. On success a fresh token is minted and
    /// persisted; on any miss the result is `None` with no further detail.
    pub async fn login(&self, username: &str, password: &str) -> Result<Option<users::Model>> {
        let Some(user) = self.store.verify_user_password(username, password).await? else {
            return Ok(None);
        };

        let token = credentials::mint_token();
        let user = self.store.set_user_token(user.id, &token).await?;

        Ok(Some(user))
    }

    /// Clear the session the token belongs to. A token that no longer
    /// resolves is a no-op, which keeps logout idempotent.
    pub async fn logout(&self, token: &str) -> Result<()> {
        if let Some(user) = self.store.get_user_by_token(token).await? {
            self.store.clear_user_token(user.id).await?;
        }

        Ok(())
    }

    /// Look up or create the account linked to a verified Google identity,
    /// then mint a fresh session token. First-time registration and login
    /// are indistinguishable to the caller.
    pub async fn google_login(&self, claims: GoogleClaims) -> Result<users::Model> {
        let user = match self.store.get_user_by_google_id(&claims.subject).await? {
            Some(user) => user,
            None => {
                let display_name = claims.name.unwrap_or_else(|| claims.email.clone());

                // The random password satisfies the always-hashed
                // invariant; nobody ever learns it, so the credential is
                // unusable for local login.
                let new = NewUser {
                    username: claims.email,
                    display_name,
                    avatar: claims.picture,
                    password: credentials::mint_token(),
                    role: Role::User,
                    google_id: Some(claims.subject),
                    token: None,
                };

                self.store.create_user(new, &self.security).await?
            }
        };

        let token = credentials::mint_token();
        self.store.set_user_token(user.id, &token).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admins_may_modify_anything() {
        assert!(can_modify(Role::Admin, 1, 1));
        assert!(can_modify(Role::Admin, 1, 2));
    }

    #[test]
    fn users_may_modify_only_their_own() {
        assert!(can_modify(Role::User, 7, 7));
        assert!(!can_modify(Role::User, 7, 8));
    }
}
