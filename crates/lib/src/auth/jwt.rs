//! Inbound request validation: the channel signs each activity POST with an RS256 JWT.
//!
//! Signing keys come from the OpenID metadata documents (Bot Framework channels, or
//! Azure AD for the emulator) and are cached per source.

use crate::auth::AuthError;
use crate::config::AppCredentials;
use crate::schema::Activity;
use base64::Engine;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const BOT_FRAMEWORK_OPENID_METADATA: &str =
    "https://login.botframework.com/v1/.well-known/openidconfiguration";
pub const EMULATOR_OPENID_METADATA: &str =
    "https://login.microsoftonline.com/common/v2.0/.well-known/openid-configuration";
pub const BOT_FRAMEWORK_ISSUER: &str = "https://api.botframework.com";

/// Issuers of tokens minted for the Bot Framework Emulator (v1 and v2 endpoints, two tenants).
const EMULATOR_ISSUERS: [&str; 4] = [
    "https://sts.windows.net/d6d49420-f39b-4df7-a1dc-d59a935871db/",
    "https://login.microsoftonline.com/d6d49420-f39b-4df7-a1dc-d59a935871db/v2.0",
    "https://sts.windows.net/f8cdef31-a31e-4b4a-93e4-5f571e91255a/",
    "https://login.microsoftonline.com/f8cdef31-a31e-4b4a-93e4-5f571e91255a/v2.0",
];

const KEY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Minimum age of the cached key set before an unknown `kid` may trigger a refetch.
const MIN_KEY_REFRESH: Duration = Duration::from_secs(5 * 60);
const CLOCK_SKEW_SECS: u64 = 300;

/// Claims the bridge reads from a validated token.
#[derive(Debug, Clone, Deserialize)]
pub struct BotClaims {
    pub iss: String,
    #[serde(default, rename = "serviceurl", alias = "serviceUrl")]
    pub service_url: Option<String>,
    #[serde(default)]
    pub appid: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenIdConfiguration {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct JsonWebKeySet {
    #[serde(default)]
    keys: Vec<JsonWebKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonWebKey {
    #[serde(default)]
    kid: Option<String>,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

struct CachedKeys {
    keys: Vec<JsonWebKey>,
    fetched_at: Instant,
}

struct KeySource {
    metadata_url: String,
    cache: Mutex<Option<CachedKeys>>,
}

impl KeySource {
    fn new(metadata_url: impl Into<String>) -> Self {
        Self {
            metadata_url: metadata_url.into(),
            cache: Mutex::new(None),
        }
    }
}

fn find_key<'a>(keys: &'a [JsonWebKey], kid: &str) -> Option<&'a JsonWebKey> {
    keys.iter().find(|k| k.kid.as_deref() == Some(kid))
}

fn decoding_key(key: &JsonWebKey) -> Result<DecodingKey, AuthError> {
    if key.kty != "RSA" {
        return Err(AuthError::InvalidToken(format!(
            "unsupported signing key type {}",
            key.kty
        )));
    }
    match (key.n.as_deref(), key.e.as_deref()) {
        (Some(n), Some(e)) => DecodingKey::from_rsa_components(n, e)
            .map_err(|e| AuthError::InvalidToken(e.to_string())),
        _ => Err(AuthError::InvalidToken(
            "signing key has no RSA components".to_string(),
        )),
    }
}

/// Issuer read from the payload before the signature is checked; only used to pick the key source.
fn unverified_issuer(token: &str) -> Result<String, AuthError> {
    #[derive(Deserialize)]
    struct IssuerOnly {
        #[serde(default)]
        iss: Option<String>,
    }
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| AuthError::InvalidToken("malformed jwt".to_string()))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|_| AuthError::InvalidToken("malformed jwt payload".to_string()))?;
    let claims: IssuerOnly = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::InvalidToken("malformed jwt payload".to_string()))?;
    claims
        .iss
        .ok_or_else(|| AuthError::InvalidToken("token has no issuer".to_string()))
}

/// Validates the Authorization header of inbound activity requests.
pub struct JwtValidator {
    credentials: Arc<AppCredentials>,
    client: reqwest::Client,
    channel_keys: KeySource,
    emulator_keys: KeySource,
    key_cache_ttl: Duration,
    min_key_refresh: Duration,
}

impl JwtValidator {
    pub fn new(credentials: Arc<AppCredentials>) -> Self {
        Self::with_metadata_urls(
            credentials,
            BOT_FRAMEWORK_OPENID_METADATA,
            EMULATOR_OPENID_METADATA,
        )
    }

    pub fn with_metadata_urls(
        credentials: Arc<AppCredentials>,
        channel_metadata_url: impl Into<String>,
        emulator_metadata_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            client: reqwest::Client::new(),
            channel_keys: KeySource::new(channel_metadata_url),
            emulator_keys: KeySource::new(emulator_metadata_url),
            key_cache_ttl: KEY_CACHE_TTL,
            min_key_refresh: MIN_KEY_REFRESH,
        }
    }

    /// Authenticate one inbound request. `Ok(None)` means anonymous access, allowed only when auth is
    /// disabled and no header was sent.
    pub async fn authenticate(
        &self,
        auth_header: &str,
        activity: &Activity,
    ) -> Result<Option<BotClaims>, AuthError> {
        let header = auth_header.trim();
        if header.is_empty() {
            if self.credentials.auth_disabled() {
                return Ok(None);
            }
            return Err(AuthError::MissingToken);
        }
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .ok_or_else(|| AuthError::InvalidToken("not a bearer token".to_string()))?;

        let jwt_header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if jwt_header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                jwt_header.alg
            )));
        }
        let kid = jwt_header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token has no key id".to_string()))?;

        let issuer = unverified_issuer(token)?;
        let from_emulator = EMULATOR_ISSUERS.contains(&issuer.as_str());
        let (source, issuers): (&KeySource, Vec<&str>) = if from_emulator {
            (&self.emulator_keys, EMULATOR_ISSUERS.to_vec())
        } else {
            (&self.channel_keys, vec![BOT_FRAMEWORK_ISSUER])
        };
        let key = self.signing_key(source, &kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&issuers);
        validation.set_audience(&[self.credentials.app_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;
        let data = decode::<BotClaims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if !from_emulator {
            let claimed = data
                .claims
                .service_url
                .as_deref()
                .ok_or_else(|| AuthError::InvalidToken("token has no serviceurl claim".to_string()))?;
            if activity.service_url.as_deref() != Some(claimed) {
                return Err(AuthError::InvalidToken(format!(
                    "serviceurl claim {} does not match activity",
                    claimed
                )));
            }
        }
        Ok(Some(data.claims))
    }

    /// Key for `kid`. The key set is refetched when the cache is stale, or when `kid` is unknown and
    /// the cache is older than the minimum refresh interval (key rotation).
    async fn signing_key(&self, source: &KeySource, kid: &str) -> Result<DecodingKey, AuthError> {
        let mut guard = source.cache.lock().await;
        if let Some(cached) = guard.as_ref() {
            let age = cached.fetched_at.elapsed();
            if age < self.key_cache_ttl {
                if let Some(key) = find_key(&cached.keys, kid) {
                    return decoding_key(key);
                }
                if age < self.min_key_refresh {
                    return Err(AuthError::InvalidToken(format!("unknown signing key {}", kid)));
                }
            }
        }
        let keys = self.fetch_keys(&source.metadata_url).await?;
        let key = find_key(&keys, kid)
            .ok_or_else(|| AuthError::InvalidToken(format!("unknown signing key {}", kid)))
            .and_then(decoding_key);
        *guard = Some(CachedKeys {
            keys,
            fetched_at: Instant::now(),
        });
        key
    }

    async fn fetch_keys(&self, metadata_url: &str) -> Result<Vec<JsonWebKey>, AuthError> {
        let metadata: OpenIdConfiguration = self.get_json(metadata_url).await?;
        let set: JsonWebKeySet = self.get_json(&metadata.jwks_uri).await?;
        log::debug!("loaded {} signing keys from {}", set.keys.len(), metadata.jwks_uri);
        Ok(set.keys)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, AuthError> {
        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::Metadata(e.to_string()))?;
        if !res.status().is_success() {
            return Err(AuthError::Metadata(format!("{} {}", url, res.status())));
        }
        res.json().await.map_err(|e| AuthError::Metadata(e.to_string()))
    }
}
