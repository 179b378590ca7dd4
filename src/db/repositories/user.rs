use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users::{self, Role};
use crate::services::credentials;

/// Input for creating a user. Carries the plaintext password; the
/// repository hashes it before anything touches the database, so a raw
/// password can never be persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub password: String,
    pub role: Role,
    pub google_id: Option<String>,
    pub token: Option<String>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Create a user, hashing the password on the way in.
    /// Argon2 is CPU-intensive, so hashing runs in a blocking task.
    pub async fn create(&self, new: NewUser, security: &SecurityConfig) -> Result<users::Model> {
        let password = new.password.clone();
        let security = security.clone();
        let password_hash =
            task::spawn_blocking(move || credentials::hash_password(&password, &security))
                .await
                .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new.username),
            display_name: Set(new.display_name),
            avatar: Set(new.avatar),
            password_hash: Set(password_hash),
            role: Set(new.role),
            google_id: Set(new.google_id),
            token: Set(new.token),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        active.insert(&self.conn).await.context("Failed to insert user")
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")
    }

    pub async fn get_by_google_id(&self, google_id: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::GoogleId.eq(google_id))
            .one(&self.conn)
            .await
            .context("Failed to query user by Google id")
    }

    /// Resolve a session token to its user. A cleared or unknown token
    /// resolves to `None`.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Token.eq(token))
            .one(&self.conn)
            .await
            .context("Failed to query user by token")
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        Ok(self.get_by_username(username).await?.is_some())
    }

    /// Check credentials against the stored hash. Fails closed: an
    /// unknown username and a wrong password both come back as `None`.
    pub async fn verify_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<users::Model>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid =
            task::spawn_blocking(move || credentials::verify_password(&password, &password_hash))
                .await
                .context("Password verification task panicked")??;

        Ok(is_valid.then_some(user))
    }

    /// Overwrite the session token, returning the updated row.
    pub async fn set_token(&self, id: i32, token: &str) -> Result<users::Model> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for token update")?
            .ok_or_else(|| anyhow::anyhow!("User not found: {id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.token = Set(Some(token.to_string()));
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to persist session token")
    }

    pub async fn clear_token(&self, id: i32) -> Result<()> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for logout")?;

        let Some(user) = user else {
            return Ok(());
        };

        let mut active: users::ActiveModel = user.into();
        active.token = Set(None);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active
            .update(&self.conn)
            .await
            .context("Failed to clear session token")?;

        Ok(())
    }

    pub async fn clear(&self) -> Result<u64> {
        let res = users::Entity::delete_many()
            .exec(&self.conn)
            .await
            .context("Failed to clear users")?;
        Ok(res.rows_affected)
    }
}
