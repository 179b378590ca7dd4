use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, IdentityVerifier, UploadStore};
use crate::state::SharedState;

pub mod auth;
mod error;
mod images;
mod observability;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.shared.store
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.shared.auth
    }

    #[must_use]
    pub fn google(&self) -> &Arc<dyn IdentityVerifier> {
        &self.shared.google
    }

    #[must_use]
    pub fn uploads(&self) -> &UploadStore {
        &self.shared.uploads
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::new(config).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

/// Same as [`create_app_state_from_config`] with a caller-chosen identity
/// verifier; tests use this to stub Google out.
pub async fn create_app_state_with_verifier(
    config: Config,
    verifier: Arc<dyn IdentityVerifier>,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let shared = Arc::new(SharedState::with_verifier(config, verifier).await?);
    Ok(create_app_state(shared, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let uploads_root = state.uploads().public_root();
    let server = &state.config().server;
    let cors = cors_layer(&server.cors_allowed_origins);
    // The multipart endpoints get their own body cap; everything else
    // keeps axum's default.
    let upload_limit = DefaultBodyLimit::max(server.max_upload_bytes);

    let api_router = Router::new()
        .route("/users", post(users::register).layer(upload_limit.clone()))
        .route("/users/sessions", post(users::login).delete(users::logout))
        .route("/users/google", post(users::google_login))
        .route(
            "/images",
            get(images::list)
                .post(images::create)
                .layer(upload_limit),
        )
        .route("/images/{id}", get(images::get).delete(images::delete))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    Router::new()
        .merge(api_router)
        .nest_service(
            "/uploads",
            tower_http::services::ServeDir::new(uploads_root),
        )
        .layer(cors.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers))
        .layer(middleware::from_fn(observability::track_requests))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new().allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|s| s.parse().ok()).collect();
    CorsLayer::new().allow_origin(origins)
}
