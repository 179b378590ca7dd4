use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::Principal;
use super::types::{ImageDto, ImageListDto, ImageListItemDto};
use super::validation::{self, UploadedFile, field_text, file_field};
use super::{ApiError, AppState};
use crate::services::auth::can_modify;
use crate::services::uploads::UploadKind;

#[derive(Deserialize)]
pub struct ListQuery {
    pub author: Option<String>,
}

/// POST /images
/// Upload an image (multipart: title, image). The file is checked against
/// the `image/*` gate before anything is written to disk or the database.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageDto>), ApiError> {
    let mut title = String::new();
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("body", "malformed form data"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = field_text(field).await?,
            "image" => file = file_field(field).await?,
            _ => {}
        }
    }

    let file = validation::validate_image_upload(&title, file)?;

    let path = state
        .uploads()
        .save(UploadKind::Images, &file.content_type, &file.bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Image write failed: {e}")))?;

    let image = state
        .store()
        .add_image(principal.id, &title, &path)
        .await
        .map_err(|e| ApiError::Internal(format!("Image insert failed: {e}")))?;

    tracing::info!(image_id = image.id, user_id = principal.id, "Image uploaded");

    Ok((StatusCode::CREATED, Json(image.into())))
}

/// GET /images?author=<id>
/// A malformed author id fails before any query runs. A well-formed but
/// unknown author still filters (to an empty list) under a generic label.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ImageListDto>, ApiError> {
    let author_id = validation::parse_author_filter(query.author.as_deref())?;

    let title = match author_id {
        None => None,
        Some(id) => Some(
            state
                .store()
                .get_user_by_id(id)
                .await
                .map_err(|e| ApiError::Internal(format!("Author lookup failed: {e}")))?
                .map_or_else(|| "Unknown author".to_string(), |user| user.display_name),
        ),
    };

    let images = state
        .store()
        .list_images(author_id)
        .await
        .map_err(|e| ApiError::Internal(format!("Image listing failed: {e}")))?
        .into_iter()
        .map(ImageListItemDto::from)
        .collect();

    Ok(Json(ImageListDto { title, images }))
}

/// GET /images/{id}
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ImageDto>, ApiError> {
    let image = state
        .store()
        .get_image(id)
        .await
        .map_err(|e| ApiError::Internal(format!("Image lookup failed: {e}")))?
        .ok_or(ApiError::NotFound)?;

    Ok(Json(image.into()))
}

/// DELETE /images/{id}
/// Existence is checked before authorization, so a missing image is 404
/// even for callers who could not have deleted it.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Principal(principal): Principal,
    Path(id): Path<i32>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (image, author) = state
        .store()
        .get_image_with_author(id)
        .await
        .map_err(|e| ApiError::Internal(format!("Image lookup failed: {e}")))?
        .ok_or(ApiError::NotFound)?;

    let author =
        author.ok_or_else(|| ApiError::Internal(format!("Image {} has no author row", image.id)))?;

    if !can_modify(principal.role, principal.id, author.id) {
        return Err(ApiError::Forbidden);
    }

    state
        .store()
        .remove_image(image.id)
        .await
        .map_err(|e| ApiError::Internal(format!("Image delete failed: {e}")))?;

    tracing::info!(image_id = image.id, user_id = principal.id, "Image deleted");

    Ok(Json(serde_json::Value::Null))
}
