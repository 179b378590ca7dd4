use std::sync::Arc;

use crate::config::Config;
use crate::db::Store;
use crate::services::{AuthService, GoogleVerifier, IdentityVerifier, UploadStore};

/// Everything constructed once at process start and shared by the API.
/// Services are explicit fields; handlers reach them through
/// [`crate::api::AppState`].
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<AuthService>,

    pub google: Arc<dyn IdentityVerifier>,

    pub uploads: Arc<UploadStore>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("Galleria/1.0")
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {e}"))?;

        let google: Arc<dyn IdentityVerifier> = Arc::new(GoogleVerifier::new(
            config.google.client_id.clone(),
            config.google.certs_url.clone(),
            http,
        ));

        Self::with_verifier(config, google).await
    }

    /// Construction seam for tests: same wiring, caller-chosen verifier.
    pub async fn with_verifier(
        config: Config,
        google: Arc<dyn IdentityVerifier>,
    ) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let uploads = Arc::new(UploadStore::new(&config.general.public_path));
        uploads.ensure_dirs().await?;

        let auth = Arc::new(AuthService::new(store.clone(), config.security.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            auth,
            google,
            uploads,
        })
    }
}
