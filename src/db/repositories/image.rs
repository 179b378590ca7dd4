use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::{images, users};

pub struct ImageRepository {
    conn: DatabaseConnection,
}

impl ImageRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, author_id: i32, title: &str, path: &str) -> Result<images::Model> {
        let active = images::ActiveModel {
            author_id: Set(author_id),
            title: Set(title.to_string()),
            path: Set(path.to_string()),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert image")
    }

    pub async fn get(&self, id: i32) -> Result<Option<images::Model>> {
        images::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query image by ID")
    }

    pub async fn get_with_author(
        &self,
        id: i32,
    ) -> Result<Option<(images::Model, Option<users::Model>)>> {
        images::Entity::find_by_id(id)
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query image with author")
    }

    /// List images, newest last, optionally restricted to one author.
    pub async fn list(
        &self,
        author_id: Option<i32>,
    ) -> Result<Vec<(images::Model, Option<users::Model>)>> {
        let mut query = images::Entity::find()
            .find_also_related(users::Entity)
            .order_by_asc(images::Column::Id);

        if let Some(author_id) = author_id {
            query = query.filter(images::Column::AuthorId.eq(author_id));
        }

        query.all(&self.conn).await.context("Failed to list images")
    }

    /// Delete by id; `false` when no row matched.
    pub async fn remove(&self, id: i32) -> Result<bool> {
        let res = images::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete image")?;

        Ok(res.rows_affected > 0)
    }

    pub async fn clear(&self) -> Result<u64> {
        let res = images::Entity::delete_many()
            .exec(&self.conn)
            .await
            .context("Failed to clear images")?;
        Ok(res.rows_affected)
    }
}
