use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::bearer_token;
use super::types::{SessionDto, UserDto};
use super::validation::{self, UploadedFile, field_text, file_field};
use super::{ApiError, AppState};
use crate::services::auth::Registration;
use crate::services::google::VerifyError;
use crate::services::uploads::UploadKind;

/// Fields are optional so that missing and null values reach the falsy
/// check below instead of failing deserialization with a different shape.
#[derive(Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct GoogleCredentialRequest {
    #[serde(default)]
    pub credential: Option<String>,
}

/// POST /users
/// Register a local account (multipart: username, password, displayName,
/// optional avatar image). Field errors are collected and reported
/// together; nothing is persisted or written to disk until they all pass.
pub async fn register(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    let mut username = String::new();
    let mut password = String::new();
    let mut display_name = String::new();
    let mut avatar: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("body", "malformed form data"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "username" => username = field_text(field).await?,
            "password" => password = field_text(field).await?,
            "displayName" => display_name = field_text(field).await?,
            "avatar" => avatar = file_field(field).await?,
            _ => {}
        }
    }

    let mut errors =
        validation::validate_registration(&username, &password, &display_name, avatar.as_ref());

    if errors.is_empty()
        && state
            .store()
            .username_taken(&username)
            .await
            .map_err(|e| ApiError::Internal(format!("Username lookup failed: {e}")))?
    {
        errors.push((
            "username".to_string(),
            "username is already taken".to_string(),
        ));
    }

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let avatar_path = match avatar {
        Some(file) => Some(
            state
                .uploads()
                .save(UploadKind::Avatars, &file.content_type, &file.bytes)
                .await
                .map_err(|e| ApiError::Internal(format!("Avatar write failed: {e}")))?,
        ),
        None => None,
    };

    let user = state
        .auth()
        .register(Registration {
            username,
            display_name,
            password,
            avatar: avatar_path,
        })
        .await
        .map_err(|e| ApiError::Internal(format!("Registration failed: {e}")))?;

    tracing::info!(user_id = user.id, "User registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /users/sessions
/// Empty credentials are rejected with the same generic envelope as a
/// failed credential check, so the response shape never reveals which
/// part was wrong.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionDto>, ApiError> {
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    if username.is_empty() || password.is_empty() {
        return Err(ApiError::Authentication);
    }

    let user = state
        .auth()
        .login(&username, &password)
        .await
        .map_err(|e| ApiError::Internal(format!("Login failed: {e}")))?
        .ok_or(ApiError::Authentication)?;

    Ok(Json(SessionDto {
        user: Some(user.into()),
    }))
}

/// DELETE /users/sessions
/// Requires a bearer token; a token that no longer resolves is treated as
/// already logged out, so repeated calls all succeed.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionDto>, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Authentication)?;

    state
        .auth()
        .logout(&token)
        .await
        .map_err(|e| ApiError::Internal(format!("Logout failed: {e}")))?;

    Ok(Json(SessionDto { user: None }))
}

/// POST /users/google
/// Verify a Google ID token and sign the caller in, creating the account
/// on first contact.
pub async fn google_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GoogleCredentialRequest>,
) -> Result<Json<SessionDto>, ApiError> {
    let credential = payload.credential.unwrap_or_default();

    if credential.is_empty() {
        return Err(ApiError::validation(
            "credential",
            "credential should not be empty",
        ));
    }

    let claims = state
        .google()
        .verify(&credential)
        .await
        .map_err(|e| match e {
            VerifyError::Rejected => ApiError::Authentication,
            VerifyError::Unavailable(msg) => ApiError::Internal(msg),
        })?;

    let user = state
        .auth()
        .google_login(claims)
        .await
        .map_err(|e| ApiError::Internal(format!("Google login failed: {e}")))?;

    Ok(Json(SessionDto {
        user: Some(user.into()),
    }))
}
