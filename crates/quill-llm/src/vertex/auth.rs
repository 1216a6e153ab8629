//! OAuth2 access tokens for Vertex AI.
//!
//! Either a static bearer token supplied by the operator, or a service-account
//! key exchanged for a short-lived token through a signed RS256 JWT.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::LlmError;

const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub enum VertexAuth {
    Static(String),
    ServiceAccount(ServiceAccountAuth),
}

impl fmt::Debug for VertexAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("VertexAuth::Static(<redacted>)"),
            Self::ServiceAccount(sa) => {
                f.debug_tuple("VertexAuth::ServiceAccount").field(sa).finish()
            }
        }
    }
}

impl VertexAuth {
    /// Return a bearer token valid for at least another minute.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Auth`] when the key cannot be read, parsed, signed or exchanged.
    pub async fn token(&self) -> Result<String, LlmError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(sa) => sa.token().await,
        }
    }
}

#[derive(Clone)]
pub struct ServiceAccountAuth {
    key_path: PathBuf,
    client: reqwest::Client,
    cached: Arc<RwLock<Option<CachedToken>>>,
}

impl fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("key_path", &self.key_path)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountAuth {
    /// # Errors
    ///
    /// Returns [`LlmError::Auth`] if the key file does not exist.
    pub fn new(key_path: impl Into<PathBuf>) -> Result<Self, LlmError> {
        let key_path = key_path.into();
        if !key_path.exists() {
            return Err(LlmError::Auth(format!(
                "service account key not found: {}",
                key_path.display()
            )));
        }
        Ok(Self {
            key_path,
            client: crate::http::client_with_timeout(Duration::from_secs(30)),
            cached: Arc::new(RwLock::new(None)),
        })
    }

    async fn token(&self) -> Result<String, LlmError> {
        {
            let guard = self.cached.read().await;
            if let Some(cached) = guard.as_ref()
                && cached.expires_at > Instant::now() + REFRESH_MARGIN
            {
                return Ok(cached.access_token.clone());
            }
        }

        let access_token = self.refresh().await?;
        *self.cached.write().await = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at: Instant::now() + TOKEN_LIFETIME,
        });
        Ok(access_token)
    }

    async fn refresh(&self) -> Result<String, LlmError> {
        let raw = tokio::fs::read_to_string(&self.key_path)
            .await
            .map_err(|e| {
                LlmError::Auth(format!(
                    "failed to read service account key {}: {e}",
                    self.key_path.display()
                ))
            })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| LlmError::Auth(format!("invalid service account key: {e}")))?;

        let jwt = signed_assertion(&key, unix_now()?)?;

        tracing::debug!(token_uri = %key.token_uri, "exchanging service account assertion");
        let response = self
            .client
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("token exchange failed {status}: {body}");
            return Err(LlmError::Auth(format!("token exchange failed ({status})")));
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

fn unix_now() -> Result<u64, LlmError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| LlmError::Auth(format!("system clock before epoch: {e}")))
}

fn signed_assertion(key: &ServiceAccountKey, now: u64) -> Result<String, LlmError> {
    let claims = serde_json::json!({
        "iss": key.client_email,
        "scope": CLOUD_PLATFORM_SCOPE,
        "aud": key.token_uri,
        "iat": now,
        "exp": now + 3600,
    });

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    let signing_input = format!("{header}.{payload}");

    let private_key = key.private_key.replace("\\n", "\n");
    let pem = pem::parse(&private_key)
        .map_err(|e| LlmError::Auth(format!("failed to parse private key PEM: {e}")))?;
    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(pem.contents())
        .map_err(|e| LlmError::Auth(format!("failed to load private key: {e}")))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            signing_input.as_bytes(),
            &mut signature,
        )
        .map_err(|e| LlmError::Auth(format!("failed to sign assertion: {e}")))?;

    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(&signature)
    ))
}
