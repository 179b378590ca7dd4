use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::entities::users;

/// The authenticated caller, resolved from `Authorization: Bearer <token>`
/// by looking the token up on the users table. Add it as a handler
/// argument to require authentication for that route.
pub struct Principal(pub users::Model);

impl FromRequestParts<Arc<AppState>> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Authentication)?;

        let user = state
            .store()
            .get_user_by_token(&token)
            .await
            .map_err(|e| ApiError::Internal(format!("Token lookup failed: {e}")))?
            .ok_or(ApiError::Authentication)?;

        tracing::Span::current().record("user_id", user.id);

        Ok(Self(user))
    }
}

/// Extract the bearer token from the Authorization header.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?.to_str().ok()?;
    let token = auth_header.strip_prefix("Bearer ")?.trim();

    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_bearer_tokens() {
        assert_eq!(
            bearer_token(&headers_with("Bearer abc123")),
            Some("abc123".to_string())
        );
        assert_eq!(bearer_token(&headers_with("Bearer   padded  ")), Some("padded".to_string()));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers_with("Basic abc123")), None);
        assert_eq!(bearer_token(&headers_with("Bearer ")), None);
    }
}
