//! Google ID-token verification.
//!
//! The verifier sits behind a trait so the API layer depends on the
//! capability, not on Google: tests plug in a stub, production uses
//! [`GoogleVerifier`], which validates RS256 signatures against Google's
//! published JWKS and checks audience and issuer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

/// Identity attributes extracted from a verified token.
#[derive(Debug, Clone)]
pub struct GoogleClaims {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token failed verification or lacks a usable identity.
    #[error("identity token rejected")]
    Rejected,

    /// The verifier itself could not do its job (key fetch failed).
    #[error("identity verifier unavailable: {0}")]
    Unavailable(String),
}

#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<GoogleClaims, VerifyError>;
}

/// Raw claims of a Google ID token. Audience, issuer and expiry are
/// enforced by the JWT validation, not read from here.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize, Clone)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

struct CachedKeys {
    fetched_at: Instant,
    keys: HashMap<String, Jwk>,
}

/// How long a fetched JWKS is trusted before refetching. Google rotates
/// keys on the order of days, so an hour is comfortably fresh.
const KEYS_TTL: Duration = Duration::from_secs(60 * 60);

pub struct GoogleVerifier {
    client_id: String,
    certs_url: String,
    http: reqwest::Client,
    cache: RwLock<Option<CachedKeys>>,
}

impl GoogleVerifier {
    #[must_use]
    pub fn new(client_id: String, certs_url: String, http: reqwest::Client) -> Self {
        Self {
            client_id,
            certs_url,
            http,
            cache: RwLock::new(None),
        }
    }

    async fn key_for(&self, kid: &str) -> Result<Jwk, VerifyError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < KEYS_TTL
                && let Some(key) = cached.keys.get(kid)
            {
                return Ok(key.clone());
            }
        }

        // Cache miss or stale entry: refetch. A kid we still don't know
        // after a fresh fetch means the token wasn't signed by Google.
        let set: JwkSet = self
            .http
            .get(&self.certs_url)
            .send()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("JWKS fetch failed: {e}")))?
            .json()
            .await
            .map_err(|e| VerifyError::Unavailable(format!("JWKS parse failed: {e}")))?;

        let keys: HashMap<String, Jwk> =
            set.keys.into_iter().map(|k| (k.kid.clone(), k)).collect();
        let key = keys.get(kid).cloned();

        *self.cache.write().await = Some(CachedKeys {
            fetched_at: Instant::now(),
            keys,
        });

        key.ok_or(VerifyError::Rejected)
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, credential: &str) -> Result<GoogleClaims, VerifyError> {
        let header = decode_header(credential).map_err(|_| VerifyError::Rejected)?;
        let kid = header.kid.ok_or(VerifyError::Rejected)?;

        let jwk = self.key_for(&kid).await?;
        let key =
            DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|_| VerifyError::Rejected)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_issuer(&["accounts.google.com", "https://accounts.google.com"]);

        let data =
            decode::<IdTokenClaims>(credential, &key, &validation).map_err(|_| VerifyError::Rejected)?;

        let claims = data.claims;
        let email = claims.email.ok_or(VerifyError::Rejected)?;

        Ok(GoogleClaims {
            subject: claims.sub,
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}
