//! Request input checks for the multipart endpoints.
//!
//! Everything here runs before any disk write or database row, so a
//! rejected request leaves no trace.

use axum::body::Bytes;
use axum::extract::multipart::Field;

use super::ApiError;
use crate::services::uploads;

/// A file field pulled out of a multipart body, held in memory until
/// validation has passed.
pub struct UploadedFile {
    pub content_type: String,
    pub bytes: Bytes,
}

pub async fn field_text(field: Field<'_>) -> Result<String, ApiError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|_| ApiError::validation(name, "malformed form data"))
}

/// Read a file field into memory. An empty field with no filename (a form
/// submitted without choosing a file) counts as absent.
pub async fn file_field(field: Field<'_>) -> Result<Option<UploadedFile>, ApiError> {
    let name = field.name().unwrap_or_default().to_string();
    let file_name = field.file_name().unwrap_or_default().to_string();
    let content_type = field.content_type().unwrap_or_default().to_string();

    let bytes = field
        .bytes()
        .await
        .map_err(|_| ApiError::validation(name, "malformed form data"))?;

    if file_name.is_empty() && bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(UploadedFile {
        content_type,
        bytes,
    }))
}

/// Field checks for registration. The avatar is optional but must pass
/// the image gate when present.
pub fn validate_registration(
    username: &str,
    password: &str,
    display_name: &str,
    avatar: Option<&UploadedFile>,
) -> Vec<(String, String)> {
    let mut errors = Vec::new();

    if username.is_empty() {
        errors.push((
            "username".to_string(),
            "username should not be empty".to_string(),
        ));
    }
    if password.is_empty() {
        errors.push((
            "password".to_string(),
            "password should not be empty".to_string(),
        ));
    } else if password.chars().count() < 4 {
        errors.push((
            "password".to_string(),
            "password must be at least 4 characters".to_string(),
        ));
    }
    if display_name.is_empty() {
        errors.push((
            "displayName".to_string(),
            "displayName should not be empty".to_string(),
        ));
    }
    if let Some(file) = avatar
        && !uploads::is_image(&file.content_type)
    {
        errors.push(("avatar".to_string(), "avatar must be an image".to_string()));
    }

    errors
}

/// Field checks for an image upload. On success the returned file has
/// passed the `image/*` gate.
pub fn validate_image_upload(
    title: &str,
    file: Option<UploadedFile>,
) -> Result<UploadedFile, ApiError> {
    let mut errors = Vec::new();

    if title.is_empty() {
        errors.push(("title".to_string(), "title should not be empty".to_string()));
    }

    match file {
        Some(file) if uploads::is_image(&file.content_type) => {
            if errors.is_empty() {
                Ok(file)
            } else {
                Err(ApiError::Validation(errors))
            }
        }
        _ => {
            errors.push(("image".to_string(), "image must be an image".to_string()));
            Err(ApiError::Validation(errors))
        }
    }
}

/// `?author=` must look like an id before it is allowed anywhere near a
/// query; an empty value means no filter.
pub fn parse_author_filter(raw: Option<&str>) -> Result<Option<i32>, ApiError> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<i32>()
            .map(Some)
            .map_err(|_| ApiError::validation("author", "author must be a valid id")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(content_type: &str) -> UploadedFile {
        UploadedFile {
            content_type: content_type.to_string(),
            bytes: Bytes::from_static(b"data"),
        }
    }

    #[test]
    fn registration_collects_one_error_per_field() {
        let errors = validate_registration("", "", "", None);
        let fields: Vec<&str> = errors.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, ["username", "password", "displayName"]);
    }

    #[test]
    fn short_passwords_and_bad_avatars_are_rejected() {
        let errors = validate_registration("ann", "abc", "Ann", Some(&file("text/plain")));
        let fields: Vec<&str> = errors.iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, ["password", "avatar"]);

        assert!(validate_registration("ann", "abcd", "Ann", Some(&file("image/png"))).is_empty());
    }

    #[test]
    fn image_upload_requires_title_and_image_type() {
        assert!(validate_image_upload("Sunset", Some(file("image/jpeg"))).is_ok());
        assert!(validate_image_upload("Sunset", Some(file("text/plain"))).is_err());
        assert!(validate_image_upload("Sunset", None).is_err());
        assert!(validate_image_upload("", Some(file("image/jpeg"))).is_err());
    }

    #[test]
    fn author_filter_parses_or_rejects_before_any_query() {
        assert_eq!(parse_author_filter(None).unwrap(), None);
        assert_eq!(parse_author_filter(Some("")).unwrap(), None);
        assert_eq!(parse_author_filter(Some("42")).unwrap(), Some(42));
        assert!(parse_author_filter(Some("not-an-id")).is_err());
        assert!(parse_author_filter(Some("5e9f8f8f8f8f8f8f8f8f8f8f")).is_err());
    }
}
