//! Yandex Cloud credential acquisition.
//!
//! # Responsibilities
//! - Read service account authorized keys (`iam.json`)
//! - Exchange a signed PS256 JWT for an IAM token
//! - Fetch tokens for the instance service account from the metadata service
//! - Cache tokens until shortly before they expire
//!
//! # Design Decisions
//! - The key file is read when the client is built, so a broken key fails
//!   reconfiguration instead of every later refresh
//! - Token exchange happens lazily on first use

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::provider::{ProviderError, ProviderResult};

pub const IAM_TOKEN_ENDPOINT: &str = "https://iam.api.cloud.yandex.net/iam/v1/tokens";
pub const METADATA_TOKEN_ENDPOINT: &str =
    "http://169.254.169.254/computeMetadata/v1/instance/service-accounts/default/token";

/// Lifetime of the JWT presented to the IAM endpoint.
const JWT_LIFETIME: Duration = Duration::from_secs(3600);
/// IAM tokens live 12h; refresh well before that.
const IAM_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
/// Tokens are treated as expired this long before their real expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Where credentials come from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CredentialSource {
    /// Service account attached to the VM, via the metadata service.
    #[default]
    InstanceServiceAccount,
    /// Service account authorized key file.
    ServiceAccountKey(PathBuf),
    /// Pre-issued IAM token, used as-is.
    IamToken(String),
}

/// Contents of a service account authorized key file.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub id: String,
    pub service_account_id: String,
    pub private_key: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> ProviderResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Credentials(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ProviderError::Credentials(format!("malformed key file {}: {}", path.display(), e))
        })
    }

    /// PEM body of the private key, without the leading notice line.
    fn private_key_pem(&self) -> &str {
        match self.private_key.find("-----BEGIN") {
            Some(start) => &self.private_key[start..],
            None => &self.private_key,
        }
    }

    /// Build the PS256 JWT the IAM endpoint exchanges for a token.
    pub fn signed_jwt(&self, audience: &str) -> ProviderResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let claims = JwtClaims {
            iss: &self.service_account_id,
            aud: audience,
            iat: now,
            exp: now + JWT_LIFETIME.as_secs(),
        };

        let mut header = Header::new(Algorithm::PS256);
        header.kid = Some(self.id.clone());

        let key = EncodingKey::from_rsa_pem(self.private_key_pem().as_bytes())
            .map_err(|e| ProviderError::Credentials(format!("invalid private key: {}", e)))?;

        jsonwebtoken::encode(&header, &claims, &key)
            .map_err(|e| ProviderError::Credentials(format!("failed to sign JWT: {}", e)))
    }
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("id", &self.id)
            .field("service_account_id", &self.service_account_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Serialize)]
struct IamTokenRequest<'a> {
    jwt: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IamTokenResponse {
    iam_token: String,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

enum TokenSource {
    Key(ServiceAccountKey),
    Instance,
    Static(String),
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Key(key) => f.debug_tuple("Key").field(key).finish(),
            TokenSource::Instance => f.write_str("Instance"),
            TokenSource::Static(_) => f.write_str("Static(<redacted>)"),
        }
    }
}

/// Token issuer bound to one credential source.
pub struct Credentials {
    source: TokenSource,
    http: reqwest::Client,
    iam_endpoint: String,
    metadata_endpoint: String,
    cache: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("source", &self.source)
            .field("iam_endpoint", &self.iam_endpoint)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Resolve a credential source. Reads the key file for key-based sources.
    pub fn new(source: &CredentialSource, http: reqwest::Client) -> ProviderResult<Self> {
        let source = match source {
            CredentialSource::ServiceAccountKey(path) => {
                TokenSource::Key(ServiceAccountKey::from_file(path)?)
            }
            CredentialSource::InstanceServiceAccount => TokenSource::Instance,
            CredentialSource::IamToken(token) => TokenSource::Static(token.clone()),
        };

        Ok(Self {
            source,
            http,
            iam_endpoint: IAM_TOKEN_ENDPOINT.to_string(),
            metadata_endpoint: METADATA_TOKEN_ENDPOINT.to_string(),
            cache: Mutex::new(None),
        })
    }

    /// Override the IAM token exchange endpoint.
    pub fn with_iam_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.iam_endpoint = endpoint.into();
        self
    }

    /// Override the instance metadata token endpoint.
    pub fn with_metadata_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = endpoint.into();
        self
    }

    /// Return a valid IAM token, fetching a new one when the cached one is stale.
    pub async fn token(&self) -> ProviderResult<String> {
        let key = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Key(key) => Some(key),
            TokenSource::Instance => None,
        };

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if Instant::now() + EXPIRY_MARGIN < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let fresh = match key {
            Some(key) => self.exchange_key(key).await?,
            None => self.fetch_instance_token().await?,
        };

        tracing::debug!("IAM token refreshed");
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    async fn exchange_key(&self, key: &ServiceAccountKey) -> ProviderResult<CachedToken> {
        let jwt = key.signed_jwt(IAM_TOKEN_ENDPOINT)?;
        let response = self
            .http
            .post(&self.iam_endpoint)
            .json(&IamTokenRequest { jwt: &jwt })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Credentials(format!(
                "IAM token exchange failed with {}: {}",
                status, body
            )));
        }

        let token: IamTokenResponse = response.json().await?;
        Ok(CachedToken {
            value: token.iam_token,
            expires_at: Instant::now() + IAM_TOKEN_LIFETIME,
        })
    }

    async fn fetch_instance_token(&self) -> ProviderResult<CachedToken> {
        let response = self
            .http
            .get(&self.metadata_endpoint)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Credentials(format!(
                "metadata service returned {}",
                status
            )));
        }

        let token: MetadataTokenResponse = response.json().await?;
        let lifetime = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(IAM_TOKEN_LIFETIME);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
