use anyhow::Result;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::entities::{images, users};

pub mod migrator;
pub mod repositories;

pub use repositories::user::NewUser;

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        ensure_sqlite_file(db_url)?;

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;
        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database ready, migrations applied (pool {min_connections}-{max_connections})"
        );

        Ok(Self { conn })
    }

    fn user_repo(&self) -> repositories::user::UserRepository {
        repositories::user::UserRepository::new(self.conn.clone())
    }

    fn image_repo(&self) -> repositories::image::ImageRepository {
        repositories::image::ImageRepository::new(self.conn.clone())
    }

    // ========== Users ==========

    pub async fn create_user(
        &self,
        new: NewUser,
        security: &SecurityConfig,
    ) -> Result<users::Model> {
        self.user_repo().create(new, security).await
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<users::Model>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn get_user_by_google_id(&self, google_id: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_google_id(google_id).await
    }

    pub async fn get_user_by_token(&self, token: &str) -> Result<Option<users::Model>> {
        self.user_repo().get_by_token(token).await
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        self.user_repo().username_taken(username).await
    }

    pub async fn verify_user_password(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<users::Model>> {
        self.user_repo().verify_password(username, password).await
    }

    pub async fn set_user_token(&self, id: i32, token: &str) -> Result<users::Model> {
        self.user_repo().set_token(id, token).await
    }

    pub async fn clear_user_token(&self, id: i32) -> Result<()> {
        self.user_repo().clear_token(id).await
    }

    pub async fn clear_users(&self) -> Result<u64> {
        self.user_repo().clear().await
    }

    // ========== Images ==========

    pub async fn add_image(
        &self,
        author_id: i32,
        title: &str,
        path: &str,
    ) -> Result<images::Model> {
        self.image_repo().create(author_id, title, path).await
    }

    pub async fn get_image(&self, id: i32) -> Result<Option<images::Model>> {
        self.image_repo().get(id).await
    }

    pub async fn get_image_with_author(
        &self,
        id: i32,
    ) -> Result<Option<(images::Model, Option<users::Model>)>> {
        self.image_repo().get_with_author(id).await
    }

    pub async fn list_images(
        &self,
        author_id: Option<i32>,
    ) -> Result<Vec<(images::Model, Option<users::Model>)>> {
        self.image_repo().list(author_id).await
    }

    pub async fn remove_image(&self, id: i32) -> Result<bool> {
        self.image_repo().remove(id).await
    }

    pub async fn clear_images(&self) -> Result<u64> {
        self.image_repo().clear().await
    }
}

/// SQLx will not create the database file on its own.
fn ensure_sqlite_file(db_url: &str) -> Result<()> {
    if db_url.contains(":memory:") {
        return Ok(());
    }

    let path = Path::new(db_url.trim_start_matches("sqlite:"));
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    if !path.exists() {
        std::fs::File::create(path)?;
    }

    Ok(())
}
