//! `/auth/v1` endpoints.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::HttpBackend;
use crate::auth::{
    AuthChange, AuthChangeEvent, AuthService, AuthSession, AuthUser, SignUpOutcome, SignUpRequest,
};
use crate::error::RemoteError;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

/// The signup endpoint answers with a session when confirmation is disabled
/// and with the bare user (or `{ "user": .. }`) when it is required.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Wrapped { user: AuthUser },
    User(AuthUser),
}

/// The subset of access-token claims the client reads.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    exp: i64,
}

/// Read `exp` from an access token without verifying its signature.
///
/// The client cannot verify tokens (it does not hold the signing key); the
/// expiry is only used to schedule refreshes.
pub(crate) fn token_expiry(token: &str) -> Result<i64, RemoteError> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<AccessClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims.exp)
}

impl TokenResponse {
    fn into_session(self) -> AuthSession {
        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| Utc::now().timestamp() + secs))
            .or_else(|| token_expiry(&self.access_token).ok());
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Translate token-endpoint rejections into typed auth errors.
fn classify_auth_error(err: RemoteError) -> RemoteError {
    if let RemoteError::Api {
        status: 400 | 401,
        code,
        message,
    } = &err
    {
        let code = code.as_deref().unwrap_or_default();
        let lower = message.to_ascii_lowercase();
        if code == "email_not_confirmed" || lower.contains("email not confirmed") {
            return RemoteError::EmailNotConfirmed;
        }
        if code == "invalid_credentials"
            || code == "invalid_grant"
            || lower.contains("invalid login credentials")
        {
            return RemoteError::InvalidCredentials;
        }
    }
    err
}

#[async_trait]
impl AuthService for HttpBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, RemoteError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self
            .client
            .post(self.url("/auth/v1/token?grant_type=password"))
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;

        let token: TokenResponse = Self::parse_response(response)
            .await
            .map_err(classify_auth_error)?;
        let session = token.into_session();

        tracing::info!(user_id = %session.user.id, "Signed in");
        self.store_session(Some(session.clone()));
        self.notify(AuthChange::new(AuthChangeEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, RemoteError> {
        let body = serde_json::json!({
            "email": request.email,
            "password": request.password,
            "data": {
                "full_name": request.full_name,
                "role": request.role.as_str(),
            },
        });
        let response = self
            .client
            .post(self.url("/auth/v1/signup"))
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;

        let parsed: SignUpResponse = Self::parse_response(response).await?;
        let outcome = match parsed {
            SignUpResponse::Session(token) => {
                let session = token.into_session();
                self.store_session(Some(session.clone()));
                self.notify(AuthChange::new(AuthChangeEvent::SignedIn, Some(session.clone())));
                SignUpOutcome::Active(session)
            }
            SignUpResponse::Wrapped { user } | SignUpResponse::User(user) => {
                SignUpOutcome::PendingConfirmation(user)
            }
        };

        tracing::info!(
            email = %request.email,
            role = %request.role,
            pending = matches!(outcome, SignUpOutcome::PendingConfirmation(_)),
            "Registered identity",
        );
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        let token = self.stored_session().map(|s| s.access_token);

        let result = match token {
            Some(token) => {
                let sent = self
                    .client
                    .post(self.url("/auth/v1/logout"))
                    .header("apikey", &self.config.anon_key)
                    .bearer_auth(token)
                    .send()
                    .await;
                match sent {
                    Ok(response) => Self::ensure_success(response).await.map(|_| ()),
                    Err(e) => Err(RemoteError::from(e)),
                }
            }
            None => Ok(()),
        };

        self.store_session(None);
        self.notify(AuthChange::new(AuthChangeEvent::SignedOut, None));
        result
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
        let body = serde_json::json!({ "refresh_token": refresh_token });
        let response = self
            .client
            .post(self.url("/auth/v1/token?grant_type=refresh_token"))
            .header("apikey", &self.config.anon_key)
            .json(&body)
            .send()
            .await?;

        match Self::parse_response::<TokenResponse>(response).await {
            Ok(token) => {
                let session = token.into_session();
                self.store_session(Some(session.clone()));
                self.notify(AuthChange::new(
                    AuthChangeEvent::TokenRefreshed,
                    Some(session.clone()),
                ));
                Ok(session)
            }
            Err(err @ RemoteError::Api { status: 400..=499, .. }) => {
                // The refresh token is no longer valid; the session is over.
                self.store_session(None);
                self.notify(AuthChange::new(AuthChangeEvent::SignedOut, None));
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn current_session(&self) -> Option<AuthSession> {
        self.stored_session()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.auth_tx.subscribe()
    }
}
