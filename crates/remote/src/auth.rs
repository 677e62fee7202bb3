//! Hosted auth contract.
//!
//! The auth service owns credentials and sessions. Clients sign in, sign up,
//! sign out, refresh tokens, and observe session changes through a broadcast
//! feed.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use fms_core::roles::Role;
use fms_core::types::{Id, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::RemoteError;

/// Buffer size of the auth-change broadcast channel.
pub const AUTH_CHANGE_CAPACITY: usize = 32;

/// Attributes attached to an identity at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// An authenticated identity as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Id,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub email_confirmed_at: Option<Timestamp>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl AuthUser {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token expiry as a Unix timestamp (seconds).
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn expires_at_time(&self) -> Option<Timestamp> {
        self.expires_at
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at_time().is_some_and(|at| at <= now)
    }
}

/// Registration request.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    /// The identity is active and signed in.
    Active(AuthSession),
    /// The identity exists but must confirm its email before signing in.
    PendingConfirmation(AuthUser),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// One entry of the auth-change feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChange {
    pub event: AuthChangeEvent,
    pub session: Option<AuthSession>,
}

impl AuthChange {
    pub fn new(event: AuthChangeEvent, session: Option<AuthSession>) -> Self {
        Self { event, session }
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, RemoteError>;

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, RemoteError>;

    /// Revoke the current session. The local session is dropped and
    /// `SignedOut` is broadcast even when the revoke call fails.
    async fn sign_out(&self) -> Result<(), RemoteError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, RemoteError>;

    /// The session currently held by this client, if any.
    async fn current_session(&self) -> Option<AuthSession>;

    /// Subscribe to session changes made through this client.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: Option<i64>) -> AuthSession {
        AuthSession {
            access_token: "a".into(),
            refresh_token: "r".into(),
            expires_at,
            user: AuthUser {
                id: Id::new_v4(),
                email: "x@example.edu".into(),
                email_confirmed_at: None,
                user_metadata: UserMetadata::default(),
            },
        }
    }

    #[test]
    fn expiry_is_checked_against_now() {
        let now = Utc::now();
        assert!(session(Some(now.timestamp() - 10)).is_expired(now));
        assert!(!session(Some(now.timestamp() + 10)).is_expired(now));
        assert!(!session(None).is_expired(now));
    }

    #[test]
    fn user_deserializes_with_missing_optional_fields() {
        let id = Id::new_v4();
        let json = serde_json::json!({ "id": id, "email": "a@b.c" });
        let user: AuthUser = serde_json::from_value(json).unwrap();
        assert_eq!(user.id, id);
        assert!(!user.is_confirmed());
        assert_eq!(user.user_metadata, UserMetadata::default());
    }

    #[test]
    fn change_event_names_match_the_wire_format() {
        let json = serde_json::to_string(&AuthChangeEvent::TokenRefreshed).unwrap();
        assert_eq!(json, "\"TOKEN_REFRESHED\"");
    }
}
