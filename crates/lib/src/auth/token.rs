//! Outbound bearer tokens via the OAuth2 client-credentials grant.

use crate::auth::AuthError;
use crate::config::AppCredentials;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const BOT_FRAMEWORK_TOKEN_ENDPOINT: &str =
    "https://login.microsoftonline.com/botframework.com/oauth2/v2.0/token";
pub const BOT_FRAMEWORK_SCOPE: &str = "https://api.botframework.com/.default";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(30);
const DEFAULT_EXPIRES_IN: u64 = 3600;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Acquires and caches the bot's access token. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct TokenProvider {
    credentials: Arc<AppCredentials>,
    endpoint: String,
    client: reqwest::Client,
    cached: Arc<Mutex<Option<CachedToken>>>,
}

impl TokenProvider {
    pub fn new(credentials: Arc<AppCredentials>) -> Self {
        Self {
            credentials,
            endpoint: BOT_FRAMEWORK_TOKEN_ENDPOINT.to_string(),
            client: reqwest::Client::new(),
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Use a different token endpoint (sovereign clouds, tests).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn credentials(&self) -> &AppCredentials {
        &self.credentials
    }

    /// Current access token, or None when auth is disabled (no app id).
    pub async fn access_token(&self) -> Result<Option<String>, AuthError> {
        if self.credentials.auth_disabled() {
            return Ok(None);
        }
        let mut guard = self.cached.lock().await;
        if let Some(token) = guard.as_ref() {
            if token.expires_at > Instant::now() + REFRESH_MARGIN {
                return Ok(Some(token.value.clone()));
            }
        }

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.credentials.app_id.as_str()),
            ("client_secret", self.credentials.app_password.as_str()),
            ("scope", BOT_FRAMEWORK_SCOPE),
        ];
        let res = self
            .client
            .post(&self.endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AuthError::TokenRequest(format!("{} {}", status, body)));
        }
        let data: TokenResponse = res
            .json()
            .await
            .map_err(|e| AuthError::TokenRequest(e.to_string()))?;
        let expires_in = data.expires_in.unwrap_or(DEFAULT_EXPIRES_IN);
        log::debug!("acquired bot framework token (expires in {}s)", expires_in);
        *guard = Some(CachedToken {
            value: data.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        });
        Ok(Some(data.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Form, Json, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_token_endpoint(expires_in: u64) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/token",
            post(move |Form(form): Form<HashMap<String, String>>| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    assert_eq!(form.get("grant_type").map(String::as_str), Some("client_credentials"));
                    assert_eq!(form.get("scope").map(String::as_str), Some(BOT_FRAMEWORK_SCOPE));
                    Json(serde_json::json!({
                        "token_type": "Bearer",
                        "expires_in": expires_in,
                        "access_token": format!("token-{}-{}", form["client_id"], n),
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        (format!("http://{}/token", addr), hits)
    }

    #[tokio::test]
    async fn disabled_auth_requests_nothing() {
        let provider = TokenProvider::new(Arc::new(AppCredentials::default()))
            .with_endpoint("http://127.0.0.1:9/unreachable");
        assert_eq!(provider.access_token().await.unwrap(), None);
    }

    #[tokio::test]
    async fn token_is_cached_until_near_expiry() {
        let (endpoint, hits) = spawn_token_endpoint(3600).await;
        let provider =
            TokenProvider::new(Arc::new(AppCredentials::new("app", "pw"))).with_endpoint(endpoint);
        let first = provider.access_token().await.unwrap();
        let second = provider.clone().access_token().await.unwrap();
        assert_eq!(first.as_deref(), Some("token-app-1"));
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_lived_token_is_refreshed() {
        let (endpoint, hits) = spawn_token_endpoint(10).await;
        let provider =
            TokenProvider::new(Arc::new(AppCredentials::new("app", "pw"))).with_endpoint(endpoint);
        provider.access_token().await.unwrap();
        let second = provider.access_token().await.unwrap();
        assert_eq!(second.as_deref(), Some("token-app-2"));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn endpoint_error_is_reported() {
        let app = Router::new().route(
            "/token",
            post(|| async { (axum::http::StatusCode::UNAUTHORIZED, "bad secret") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        let provider = TokenProvider::new(Arc::new(AppCredentials::new("app", "pw")))
            .with_endpoint(format!("http://{}/token", addr));
        let err = provider.access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRequest(ref m) if m.contains("401")));
    }
}
