use serde::Serialize;

use crate::entities::{images, users};

/// Outward user representation. Built from the entity by hand so the
/// password hash and Google id can never leak through serialization.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: i32,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub role: users::Role,
    pub token: Option<String>,
}

impl From<users::Model> for UserDto {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            display_name: model.display_name,
            avatar: model.avatar,
            role: model.role,
            token: model.token,
        }
    }
}

/// Pruned author embedded in image listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorDto {
    pub id: i32,
    pub display_name: String,
}

impl From<users::Model> for AuthorDto {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            display_name: model.display_name,
        }
    }
}

/// Single-image representation; the author stays a bare id.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDto {
    pub id: i32,
    pub author: i32,
    pub title: String,
    pub image: String,
}

impl From<images::Model> for ImageDto {
    fn from(model: images::Model) -> Self {
        Self {
            id: model.id,
            author: model.author_id,
            title: model.title,
            image: model.path,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageListItemDto {
    pub id: i32,
    pub author: Option<AuthorDto>,
    pub title: String,
    pub image: String,
}

impl From<(images::Model, Option<users::Model>)> for ImageListItemDto {
    fn from((image, author): (images::Model, Option<users::Model>)) -> Self {
        Self {
            id: image.id,
            author: author.map(AuthorDto::from),
            title: image.title,
            image: image.path,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImageListDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub images: Vec<ImageListItemDto>,
}

/// `{user}` wrapper used by the session endpoints.
#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub user: Option<UserDto>,
}
