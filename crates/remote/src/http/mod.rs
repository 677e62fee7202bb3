//! REST client for a hosted (Supabase-compatible) backend.
//!
//! One [`HttpBackend`] implements all three service contracts over a shared
//! [`reqwest::Client`]:
//!
//! - auth under `/auth/v1`
//! - tables under `/rest/v1` (PostgREST query syntax)
//! - objects under `/storage/v1`
//!
//! Every request carries the project's anon key in the `apikey` header and a
//! bearer token: the signed-in user's access token when a session exists,
//! the anon key otherwise.

mod auth;
mod rest;
mod storage;

use std::sync::RwLock;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::auth::{AuthChange, AuthSession, AUTH_CHANGE_CAPACITY};
use crate::error::RemoteError;

/// Default HTTP request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for the hosted backend.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`.
    pub base_url: String,
    /// Public anon key of the project.
    pub anon_key: String,
    pub request_timeout: Duration,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP implementation of [`AuthService`](crate::AuthService),
/// [`DataService`](crate::DataService) and [`FileStorage`](crate::FileStorage).
pub struct HttpBackend {
    client: reqwest::Client,
    config: RemoteConfig,
    session: RwLock<Option<AuthSession>>,
    auth_tx: broadcast::Sender<AuthChange>,
}

/// Error body shapes returned by the auth, rest, and storage services.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpBackend {
    pub fn new(config: RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Create a backend reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: RemoteConfig) -> Self {
        let (auth_tx, _) = broadcast::channel(AUTH_CHANGE_CAPACITY);
        Self {
            client,
            config,
            session: RwLock::new(None),
            auth_tx,
        }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn stored_session(&self) -> Option<AuthSession> {
        self.session.read().map(|s| s.clone()).unwrap_or_default()
    }

    fn store_session(&self, session: Option<AuthSession>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn bearer_token(&self) -> String {
        self.stored_session()
            .map(|s| s.access_token)
            .unwrap_or_else(|| self.config.anon_key.clone())
    }

    /// Attach the `apikey` header and bearer token.
    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer_token())
    }

    fn notify(&self, change: AuthChange) {
        // Zero receivers is not an error.
        let _ = self.auth_tx.send(change);
    }

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or a [`RemoteError::Api`] carrying the parsed
    /// error message on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(api_error(status.as_u16(), &body))
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, RemoteError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Build a [`RemoteError::Api`] from a status and raw body.
fn api_error(status: u16, body: &str) -> RemoteError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.error_code.or_else(|| match parsed.code {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    });
    let code = code.or(parsed.error.clone());
    let message = parsed
        .msg
        .or(parsed.message)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| body.to_string());
    RemoteError::Api {
        status,
        code,
        message,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn gotrue_error_body_is_parsed() {
        let body = r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#;
        assert_matches!(
            api_error(400, body),
            RemoteError::Api { status: 400, code: Some(c), message } if c == "invalid_credentials" && message == "Invalid login credentials"
        );
    }

    #[test]
    fn legacy_oauth_error_body_is_parsed() {
        let body = r#"{"error":"invalid_grant","error_description":"Email not confirmed"}"#;
        assert_matches!(
            api_error(400, body),
            RemoteError::Api { code: Some(c), message, .. } if c == "invalid_grant" && message == "Email not confirmed"
        );
    }

    #[test]
    fn postgrest_error_body_is_parsed() {
        let body = r#"{"code":"23505","message":"duplicate key value","details":null,"hint":null}"#;
        assert_matches!(
            api_error(409, body),
            RemoteError::Api { status: 409, code: Some(c), .. } if c == "23505"
        );
    }

    #[test]
    fn unparseable_body_is_kept_verbatim() {
        assert_matches!(
            api_error(502, "Bad Gateway"),
            RemoteError::Api { code: None, message, .. } if message == "Bad Gateway"
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = RemoteConfig::new("https://example.supabase.co/", "anon");
        assert_eq!(config.base_url, "https://example.supabase.co");
    }
}
