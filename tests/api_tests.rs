use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use galleria::api::{self, AppState};
use galleria::config::Config;
use galleria::db::NewUser;
use galleria::entities::users::Role;
use galleria::services::{GoogleClaims, IdentityVerifier, VerifyError};

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

/// Credential the stub verifier accepts.
const GOOD_CREDENTIAL: &str = "good-google-credential";

struct StubVerifier;

#[async_trait::async_trait]
impl IdentityVerifier for StubVerifier {
    async fn verify(&self, credential: &str) -> Result<GoogleClaims, VerifyError> {
        if credential == GOOD_CREDENTIAL {
            Ok(GoogleClaims {
                subject: "google-sub-1".to_string(),
                email: "pat@example.com".to_string(),
                name: Some("Pat Doe".to_string()),
                picture: None,
            })
        } else {
            Err(VerifyError::Rejected)
        }
    }
}

async fn spawn_app() -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // A single pooled connection keeps every query on the same in-memory db.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    config.general.public_path = std::env::temp_dir()
        .join(format!("galleria-test-{}", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned();
    // Cheap hashing so the suite stays fast.
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = api::create_app_state_with_verifier(config, Arc::new(StubVerifier), None)
        .await
        .expect("Failed to create app state");

    (api::router(state.clone()), state)
}

// ============================================================================
// Request helpers
// ============================================================================

fn multipart_text(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

fn multipart_file(body: &mut Vec<u8>, name: &str, filename: &str, content_type: &str, data: &[u8]) {
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(b"\r\n");
}

fn multipart_close(body: &mut Vec<u8>) {
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
}

async fn json_of(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
}

async fn register(app: &Router, username: &str, password: &str, display_name: &str) -> (StatusCode, serde_json::Value) {
    let mut body = Vec::new();
    multipart_text(&mut body, "username", username);
    multipart_text(&mut body, "password", password);
    multipart_text(&mut body, "displayName", display_name);
    multipart_close(&mut body);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    (status, json_of(response).await)
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users/sessions")
                .header("Content-Type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    (status, json_of(response).await)
}

async fn upload_image(
    app: &Router,
    token: &str,
    title: &str,
    file: Option<(&str, &str, &[u8])>,
) -> (StatusCode, serde_json::Value) {
    let mut body = Vec::new();
    multipart_text(&mut body, "title", title);
    if let Some((filename, content_type, data)) = file {
        multipart_file(&mut body, "image", filename, content_type, data);
    }
    multipart_close(&mut body);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/images")
                .header("Authorization", format!("Bearer {token}"))
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    (status, json_of(response).await)
}

async fn delete_image(app: &Router, token: &str, id: i64) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/images/{id}"))
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    (status, json_of(response).await)
}

fn token_of(session_body: &serde_json::Value) -> String {
    session_body["user"]["token"].as_str().unwrap().to_string()
}

fn uploaded_file_count(state: &AppState) -> usize {
    let mut count = 0;
    for kind in ["avatars", "images"] {
        let dir = state.uploads().public_root().join(kind);
        if let Ok(entries) = std::fs::read_dir(dir) {
            count += entries.count();
        }
    }
    count
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn register_then_login_round_trip() {
    let (app, _state) = spawn_app().await;

    let (status, body) = register(&app, "alice", "secret1", "Alice A").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["displayName"], "Alice A");
    assert_eq!(body["role"], "user");
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    // The password never appears in any outward representation.
    assert!(body.get("password").is_none());
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("googleId").is_none());

    let (status, body) = login(&app, "alice", "secret1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert!(body["user"].get("password").is_none());
}

#[tokio::test]
async fn register_validates_fields_before_side_effects() {
    let (app, state) = spawn_app().await;

    // Missing everything: field-keyed errors, one per field.
    let (status, body) = register(&app, "", "", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
    assert!(body["errors"]["username"].is_string());
    assert!(body["errors"]["password"].is_string());
    assert!(body["errors"]["displayName"].is_string());

    // Too-short password.
    let (status, body) = register(&app, "bob", "abc", "Bob B").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["password"].is_string());

    // Duplicate username.
    let (status, _) = register(&app, "carol", "secret1", "Carol C").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = register(&app, "carol", "secret2", "Carol Again").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]["username"].is_string());

    // None of the failures wrote anything to disk.
    assert_eq!(uploaded_file_count(&state), 0);
}

#[tokio::test]
async fn non_image_avatar_is_rejected_and_not_written() {
    let (app, state) = spawn_app().await;

    let mut body = Vec::new();
    multipart_text(&mut body, "username", "dave");
    multipart_text(&mut body, "password", "secret1");
    multipart_text(&mut body, "displayName", "Dave D");
    multipart_file(&mut body, "avatar", "notes.txt", "text/plain", b"not an image");
    multipart_close(&mut body);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/users")
                .header(
                    "Content-Type",
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_of(response).await;
    assert_eq!(body["type"], "ValidationError");
    assert_eq!(body["errors"]["avatar"], "avatar must be an image");

    assert_eq!(uploaded_file_count(&state), 0);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let (app, _state) = spawn_app().await;

    let (status, _) = register(&app, "erin", "secret1", "Erin E").await;
    assert_eq!(status, StatusCode::CREATED);

    let (wrong_pw_status, wrong_pw_body) = login(&app, "erin", "wrong-password").await;
    let (no_user_status, no_user_body) = login(&app, "nobody", "whatever").await;
    let (empty_status, empty_body) = login(&app, "", "").await;

    assert_eq!(wrong_pw_status, StatusCode::UNAUTHORIZED);
    assert_eq!(no_user_status, StatusCode::UNAUTHORIZED);
    assert_eq!(empty_status, StatusCode::UNAUTHORIZED);

    // Same type, same message, byte-identical envelopes.
    assert_eq!(wrong_pw_body, no_user_body);
    assert_eq!(wrong_pw_body, empty_body);
    assert_eq!(wrong_pw_body["type"], "AuthenticationError");
}

#[tokio::test]
async fn each_login_rotates_the_token() {
    let (app, _state) = spawn_app().await;

    register(&app, "fred", "secret1", "Fred F").await;

    let (_, first) = login(&app, "fred", "secret1").await;
    let (_, second) = login(&app, "fred", "secret1").await;

    assert_ne!(token_of(&first), token_of(&second));
}

#[tokio::test]
async fn logout_is_idempotent() {
    let (app, _state) = spawn_app().await;

    register(&app, "gina", "secret1", "Gina G").await;
    let (_, session) = login(&app, "gina", "secret1").await;
    let token = token_of(&session);

    let logout = |token: String| {
        let app = app.clone();
        async move {
            let response = app
                .oneshot(
                    Request::builder()
                        .method("DELETE")
                        .uri("/users/sessions")
                        .header("Authorization", format!("Bearer {token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let status = response.status();
            (status, json_of(response).await)
        }
    };

    let (status, body) = logout(token.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"].is_null());

    // Second logout with the now-cleared token is a no-op, not an error.
    let (status, body) = logout(token.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["user"].is_null());

    // The cleared token no longer authenticates anything else.
    let (status, _) = upload_image(&app, &token, "After logout", Some(("a.png", "image/png", b"x"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // No token at all is still an authentication failure.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/users/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn image_upload_requires_auth_and_valid_fields() {
    let (app, state) = spawn_app().await;

    register(&app, "hank", "secret1", "Hank H").await;
    let (_, session) = login(&app, "hank", "secret1").await;
    let token = token_of(&session);

    // No token.
    let (status, _) = upload_image(&app, "bogus-token", "Sunset", Some(("s.png", "image/png", b"png-bytes"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Wrong content type: rejected, nothing written.
    let (status, body) =
        upload_image(&app, &token, "Sunset", Some(("s.txt", "text/plain", b"nope"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["image"], "image must be an image");
    assert_eq!(uploaded_file_count(&state), 0);

    // Missing file.
    let (status, body) = upload_image(&app, &token, "Sunset", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["image"], "image must be an image");

    // Missing title.
    let (status, body) =
        upload_image(&app, &token, "", Some(("s.png", "image/png", b"png-bytes"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"]["title"], "title should not be empty");
    assert_eq!(uploaded_file_count(&state), 0);

    // Valid upload: record stores the public path, file lands on disk.
    let (status, body) =
        upload_image(&app, &token, "Sunset", Some(("s.png", "image/png", b"png-bytes"))).await;
    assert_eq!(status, StatusCode::CREATED);
    let public_path = body["image"].as_str().unwrap();
    assert!(public_path.starts_with("/uploads/images/"));
    assert_eq!(uploaded_file_count(&state), 1);

    // And the file is served back at its public path.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(public_path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"png-bytes");
}

#[tokio::test]
async fn listing_filters_by_author_and_labels_the_result() {
    let (app, _state) = spawn_app().await;

    let (_, ivy) = register(&app, "ivy", "secret1", "Ivy I").await;
    let ivy_id = ivy["id"].as_i64().unwrap();
    let ivy_token = ivy["token"].as_str().unwrap().to_string();
    let (_, jack) = register(&app, "jack", "secret1", "Jack J").await;
    let jack_token = jack["token"].as_str().unwrap().to_string();

    upload_image(&app, &ivy_token, "Ivy one", Some(("a.png", "image/png", b"a"))).await;
    upload_image(&app, &ivy_token, "Ivy two", Some(("b.png", "image/png", b"b"))).await;
    upload_image(&app, &jack_token, "Jack one", Some(("c.png", "image/png", b"c"))).await;

    // Unfiltered: all three, no title label, authors pruned to id + name.
    let (status, body) = get_json(&app, "/images").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("title").is_none());
    let images = body["images"].as_array().unwrap();
    assert_eq!(images.len(), 3);
    let author = &images[0]["author"];
    assert!(author["id"].is_number());
    assert!(author["displayName"].is_string());
    assert!(author.get("username").is_none());
    assert!(author.get("role").is_none());
    assert!(author.get("token").is_none());

    // Filtered by a known author.
    let (status, body) = get_json(&app, &format!("/images?author={ivy_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Ivy I");
    assert_eq!(body["images"].as_array().unwrap().len(), 2);

    // Malformed author id: validation failure.
    let (status, body) = get_json(&app, "/images?author=not-an-id").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
    assert!(body["errors"]["author"].is_string());

    // Well-formed but unknown author: empty list under a generic label.
    let (status, body) = get_json(&app, "/images?author=999999").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Unknown author");
    assert_eq!(body["images"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn single_image_fetch_keeps_the_author_bare() {
    let (app, _state) = spawn_app().await;

    let (_, kim) = register(&app, "kim", "secret1", "Kim K").await;
    let token = kim["token"].as_str().unwrap().to_string();

    let (_, image) = upload_image(&app, &token, "Lone", Some(("l.png", "image/png", b"l"))).await;
    let id = image["id"].as_i64().unwrap();

    let (status, body) = get_json(&app, &format!("/images/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Lone");
    assert!(body["author"].is_number());

    let (status, body) = get_json(&app, "/images/424242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["type"], "NotFoundError");
}

#[tokio::test]
async fn deletion_is_owner_or_admin_only() {
    let (app, state) = spawn_app().await;

    let (_, lena) = register(&app, "lena", "secret1", "Lena L").await;
    let lena_token = lena["token"].as_str().unwrap().to_string();
    let (_, mona) = register(&app, "mona", "secret1", "Mona M").await;
    let mona_token = mona["token"].as_str().unwrap().to_string();

    let (_, image) =
        upload_image(&app, &lena_token, "Lena's", Some(("x.png", "image/png", b"x"))).await;
    let id = image["id"].as_i64().unwrap();

    // A different non-admin user: forbidden, record intact.
    assert_eq!(delete_image(&app, &mona_token, id).await, StatusCode::FORBIDDEN);
    let (status, _) = get_json(&app, &format!("/images/{id}")).await;
    assert_eq!(status, StatusCode::OK);

    // Missing image beats authorization: 404 even for a non-owner.
    assert_eq!(delete_image(&app, &mona_token, 424242).await, StatusCode::NOT_FOUND);

    // The owner may delete.
    assert_eq!(delete_image(&app, &lena_token, id).await, StatusCode::OK);
    let (status, _) = get_json(&app, &format!("/images/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // An admin may delete anyone's image.
    let (_, image) =
        upload_image(&app, &lena_token, "Lena's 2", Some(("y.png", "image/png", b"y"))).await;
    let id = image["id"].as_i64().unwrap();

    state
        .store()
        .create_user(
            NewUser {
                username: "root".to_string(),
                display_name: "Root R".to_string(),
                avatar: None,
                password: "secret1".to_string(),
                role: Role::Admin,
                google_id: None,
                token: Some("admin-session-token".to_string()),
            },
            &state.config().security,
        )
        .await
        .unwrap();

    assert_eq!(
        delete_image(&app, "admin-session-token", id).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn google_login_creates_then_reuses_the_account() {
    let (app, _state) = spawn_app().await;

    let google = |credential: &str| {
        let app = app.clone();
        let body = serde_json::json!({ "credential": credential }).to_string();
        async move {
            let response = app
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/users/google")
                        .header("Content-Type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            let status = response.status();
            (status, json_of(response).await)
        }
    };

    // First contact creates the account from the verified claims.
    let (status, body) = google(GOOD_CREDENTIAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "pat@example.com");
    assert_eq!(body["user"]["displayName"], "Pat Doe");
    let first_id = body["user"]["id"].as_i64().unwrap();
    let first_token = token_of(&body);

    // Second login reuses it and rotates the token.
    let (status, body) = google(GOOD_CREDENTIAL).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"].as_i64().unwrap(), first_id);
    assert_ne!(token_of(&body), first_token);

    // The minted random password is unusable for local login.
    let (status, _) = login(&app, "pat@example.com", "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A rejected credential is an authentication failure.
    let (status, body) = google("tampered-credential").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["type"], "AuthenticationError");

    // An empty credential is a validation failure, caught before the verifier.
    let (status, body) = google("").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["type"], "ValidationError");
}
