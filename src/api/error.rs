use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Errors crossing the API boundary. Every variant maps to one entry of
/// the wire taxonomy and serializes as `{type, error|errors}`.
///
/// Authentication deliberately carries no detail: a missing user, a wrong
/// password and an empty credential all produce the identical envelope.
#[derive(Debug)]
pub enum ApiError {
    Validation(Vec<(String, String)>),

    Authentication,

    Forbidden,

    NotFound,

    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(errors) => write!(f, "Validation error: {} field(s)", errors.len()),
            Self::Authentication => write!(f, "Invalid username or password"),
            Self::Forbidden => write!(f, "Forbidden"),
            Self::NotFound => write!(f, "Not found"),
            Self::Internal(msg) => write!(f, "Internal error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Validation(errors) => {
                let mut fields = serde_json::Map::new();
                for (field, message) in errors {
                    fields.insert(field.clone(), json!(message));
                }
                (
                    StatusCode::BAD_REQUEST,
                    json!({ "type": "ValidationError", "errors": fields }),
                )
            }
            Self::Authentication => (
                StatusCode::UNAUTHORIZED,
                envelope("AuthenticationError", "Invalid username or password"),
            ),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                envelope("ForbiddenError", "Forbidden"),
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                envelope("NotFoundError", "Not found"),
            ),
            Self::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    envelope("UnknownError", "An internal error occurred"),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

fn envelope(kind: &str, message: &str) -> serde_json::Value {
    json!({
        "type": kind,
        "error": { "name": kind, "message": message },
    })
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![(field.into(), message.into())])
    }
}
