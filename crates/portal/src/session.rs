//! Session context: the single source of truth for who is signed in.
//!
//! [`SessionContext::init`] reads the current session, subscribes to the
//! auth-change feed, and spawns one standing listener that keeps the local
//! identity in sync and refreshes the access token before it expires.
//! Observers read [`SessionState`] through a `tokio::sync::watch` channel.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use fms_core::roles::Role;
use fms_core::types::Id;
use fms_events::{event_types, EventBus, PortalEvent};
use fms_remote::{AuthChange, AuthService, AuthSession, AuthUser, SignUpOutcome, SignUpRequest};
use serde_json::json;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::AuthFailure;

/// How long before expiry the access token is refreshed.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Floor between two scheduled refreshes.
const MIN_REFRESH_DELAY: Duration = Duration::from_secs(1);

/// Delay before retrying a refresh that failed transiently.
const REFRESH_RETRY_DELAY: Duration = Duration::from_secs(10);

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of the local identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    pub session: Option<AuthSession>,
    /// True until the first synchronisation with the auth service.
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            session: None,
            loading: true,
        }
    }
}

impl SessionState {
    pub fn user_id(&self) -> Option<Id> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

pub struct SessionContext {
    auth: Arc<dyn AuthService>,
    events: Arc<EventBus>,
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionContext {
    /// Create the context and start its auth-change listener.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn init(auth: Arc<dyn AuthService>, events: Arc<EventBus>) -> Arc<Self> {
        let (state_tx, _) = watch::channel(SessionState::default());
        let state = Arc::new(state_tx);
        let cancel = CancellationToken::new();

        // Subscribe before reading the current session so no change is missed.
        let changes = auth.subscribe();
        let listener = tokio::spawn(listen(
            Arc::clone(&auth),
            Arc::clone(&state),
            changes,
            cancel.clone(),
        ));

        Arc::new(Self {
            auth,
            events,
            state,
            cancel,
            listener: Mutex::new(Some(listener)),
        })
    }

    /// Stop the listener and wait (bounded) for it to finish.
    pub async fn teardown(&self) {
        self.cancel.cancel();
        let handle = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(TEARDOWN_TIMEOUT, handle).await;
        }
        tracing::debug!("Session listener stopped");
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<AuthUser> {
        self.state.borrow().user.clone()
    }

    pub fn user_id(&self) -> Option<Id> {
        self.state.borrow().user_id()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Wait until the first synchronisation has completed.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        let ready = rx.wait_for(|s| !s.loading).await.map(|s| s.clone());
        ready.unwrap_or_else(|_| self.state())
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthFailure> {
        let email = email.trim();
        match self.auth.sign_in_with_password(email, password).await {
            Ok(session) => {
                let user = session.user.clone();
                set_session(&self.state, Some(session));
                tracing::info!(user_id = %user.id, "Signed in");
                self.events
                    .publish(PortalEvent::new(event_types::AUTH_SIGNED_IN).with_actor(user.id));
                Ok(user)
            }
            Err(e) => {
                let failure = AuthFailure::from(e);
                tracing::warn!(error = %failure, "Sign-in failed");
                self.events.publish(
                    PortalEvent::new(event_types::AUTH_SIGN_IN_FAILED)
                        .with_payload(json!({ "error": failure.to_string() })),
                );
                Err(failure)
            }
        }
    }

    /// Register a new identity. `role` defaults to faculty.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Option<Role>,
    ) -> Result<SignUpOutcome, AuthFailure> {
        let request = SignUpRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            full_name: full_name.trim().to_string(),
            role: role.unwrap_or_default(),
        };

        match self.auth.sign_up(&request).await {
            Ok(outcome) => {
                let pending = matches!(outcome, SignUpOutcome::PendingConfirmation(_));
                let user_id = match &outcome {
                    SignUpOutcome::Active(session) => {
                        set_session(&self.state, Some(session.clone()));
                        session.user.id
                    }
                    SignUpOutcome::PendingConfirmation(user) => user.id,
                };
                tracing::info!(%user_id, role = request.role.as_str(), pending, "Signed up");
                self.events.publish(
                    PortalEvent::new(event_types::AUTH_SIGNED_UP)
                        .with_actor(user_id)
                        .with_payload(json!({ "pending_confirmation": pending })),
                );
                Ok(outcome)
            }
            Err(e) => {
                let failure = AuthFailure::from(e);
                tracing::warn!(error = %failure, "Sign-up failed");
                self.events.publish(
                    PortalEvent::new(event_types::AUTH_SIGN_UP_FAILED)
                        .with_payload(json!({ "error": failure.to_string() })),
                );
                Err(failure)
            }
        }
    }

    /// Sign out. Local identity is cleared even when the remote call fails.
    pub async fn sign_out(&self) {
        let user_id = self.user_id();
        let result = self.auth.sign_out().await;
        set_session(&self.state, None);

        match result {
            Ok(()) => {
                tracing::info!(user_id = ?user_id, "Signed out");
                let mut event = PortalEvent::new(event_types::AUTH_SIGNED_OUT);
                if let Some(id) = user_id {
                    event = event.with_actor(id);
                }
                self.events.publish(event);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote sign-out failed, local session cleared");
            }
        }
    }
}

// ---- private helpers ----

fn set_session(state: &watch::Sender<SessionState>, session: Option<AuthSession>) {
    state.send_modify(|s| {
        s.user = session.as_ref().map(|s| s.user.clone());
        s.session = session;
        s.loading = false;
    });
}

fn apply_change(state: &watch::Sender<SessionState>, change: AuthChange) {
    tracing::debug!(event = ?change.event, "Auth state changed");
    set_session(state, change.session);
}

fn next_refresh(state: &SessionState, retry_at: Option<Instant>) -> Option<Instant> {
    if retry_at.is_some() {
        return retry_at;
    }
    let expires_at = state.session.as_ref()?.expires_at_time()?;
    let margin = chrono::Duration::from_std(TOKEN_REFRESH_MARGIN).unwrap_or_default();
    let delay = (expires_at - Utc::now() - margin)
        .to_std()
        .unwrap_or(Duration::ZERO)
        .max(MIN_REFRESH_DELAY);
    Some(Instant::now() + delay)
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn listen(
    auth: Arc<dyn AuthService>,
    state: Arc<watch::Sender<SessionState>>,
    mut changes: broadcast::Receiver<AuthChange>,
    cancel: CancellationToken,
) {
    let initial = auth.current_session().await;
    tracing::debug!(signed_in = initial.is_some(), "Initial session loaded");
    set_session(&state, initial);

    let mut retry_at: Option<Instant> = None;
    loop {
        let deadline = next_refresh(&state.borrow(), retry_at);
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Session listener cancelled");
                break;
            }
            received = changes.recv() => match received {
                Ok(change) => {
                    retry_at = None;
                    apply_change(&state, change);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Auth feed lagged, resynchronising");
                    let current = auth.current_session().await;
                    set_session(&state, current);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Auth feed closed, session listener shutting down");
                    break;
                }
            },
            _ = sleep_until_opt(deadline) => {
                let refresh_token = state
                    .borrow()
                    .session
                    .as_ref()
                    .map(|s| s.refresh_token.clone());
                let Some(refresh_token) = refresh_token else {
                    retry_at = None;
                    continue;
                };
                match auth.refresh_session(&refresh_token).await {
                    Ok(session) => {
                        retry_at = None;
                        tracing::debug!(user_id = %session.user.id, "Access token refreshed");
                        set_session(&state, Some(session));
                    }
                    Err(e) if e.is_transient() => {
                        tracing::warn!(error = %e, "Token refresh failed, retrying");
                        retry_at = Some(Instant::now() + REFRESH_RETRY_DELAY);
                    }
                    Err(e) => {
                        // The auth service decides whether the session is over and
                        // broadcasts `SignedOut` when it is; mirror what it holds.
                        let current = auth.current_session().await;
                        if current.is_some() {
                            tracing::warn!(error = %e, "Token refresh failed, session kept");
                            retry_at = Some(Instant::now() + REFRESH_RETRY_DELAY);
                        } else {
                            retry_at = None;
                            tracing::warn!(error = %e, "Token refresh rejected, session cleared");
                        }
                        set_session(&state, current);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use fms_remote::{MemoryBackend, Operation, RemoteError};

    use super::*;

    fn backend() -> Arc<MemoryBackend> {
        let backend = Arc::new(MemoryBackend::new());
        backend.register_user("rao@uni.edu", "secret", "Dr. Rao", Role::Faculty, true);
        backend
    }

    #[tokio::test]
    async fn init_finishes_loading_without_a_session() {
        let ctx = SessionContext::init(backend(), Arc::new(EventBus::default()));
        let state = ctx.ready().await;
        assert!(!state.loading);
        assert!(!state.is_signed_in());
        ctx.teardown().await;
    }

    #[tokio::test]
    async fn sign_in_trims_email_and_updates_identity() {
        let events = Arc::new(EventBus::default());
        let mut rx = events.subscribe();
        let ctx = SessionContext::init(backend(), Arc::clone(&events));
        ctx.ready().await;

        let user = ctx.sign_in("  rao@uni.edu ", "secret").await.unwrap();
        assert_eq!(ctx.user_id(), Some(user.id));
        assert_eq!(rx.recv().await.unwrap().event_type, event_types::AUTH_SIGNED_IN);
        ctx.teardown().await;
    }

    #[tokio::test]
    async fn bad_credentials_are_typed() {
        let ctx = SessionContext::init(backend(), Arc::new(EventBus::default()));
        assert_matches!(
            ctx.sign_in("rao@uni.edu", "wrong").await,
            Err(AuthFailure::InvalidCredentials)
        );
        assert!(ctx.user().is_none());
        ctx.teardown().await;
    }

    #[tokio::test]
    async fn sign_out_clears_identity_when_remote_fails() {
        let backend = backend();
        let events = Arc::new(EventBus::default());
        let ctx = SessionContext::init(backend.clone(), Arc::clone(&events));
        ctx.sign_in("rao@uni.edu", "secret").await.unwrap();
        let mut rx = events.subscribe();

        backend.fail_next(Operation::SignOut);
        ctx.sign_out().await;

        assert!(ctx.user().is_none());
        assert!(ctx.state().session.is_none());
        // No "Logged out" notice for a failed revoke.
        assert_matches!(rx.try_recv(), Err(broadcast::error::TryRecvError::Empty));
        ctx.teardown().await;
    }

    #[tokio::test]
    async fn sign_up_defaults_to_faculty() {
        let backend = backend();
        let ctx = SessionContext::init(backend.clone(), Arc::new(EventBus::default()));
        let outcome = ctx
            .sign_up("new@uni.edu", "secret", "Dr. New", None)
            .await
            .unwrap();
        assert_matches!(outcome, SignUpOutcome::Active(_));

        let profile = backend
            .rows(fms_remote::tables::PROFILES)
            .into_iter()
            .find(|row| row["email"] == "new@uni.edu")
            .unwrap();
        assert_eq!(profile["role"], "faculty");
        ctx.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn access_token_is_refreshed_before_expiry() {
        let backend = backend();
        backend.set_token_lifetime(Duration::from_secs(120));
        let ctx = SessionContext::init(backend.clone(), Arc::new(EventBus::default()));
        ctx.sign_in("rao@uni.edu", "secret").await.unwrap();
        let first = ctx.state().session.unwrap().access_token;

        let mut rx = ctx.watch();
        let refreshed = rx
            .wait_for(|s| {
                s.session
                    .as_ref()
                    .is_some_and(|session| session.access_token != first)
            })
            .await
            .map(|s| s.clone())
            .unwrap();
        assert!(refreshed.is_signed_in());
        ctx.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_network_failure_keeps_the_session() {
        let backend = backend();
        backend.set_token_lifetime(Duration::from_secs(30));
        let ctx = SessionContext::init(backend.clone(), Arc::new(EventBus::default()));
        ctx.sign_in("rao@uni.edu", "secret").await.unwrap();

        backend.fail_next(Operation::Refresh);
        let mut rx = ctx.watch();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.borrow_and_update().is_signed_in());
        ctx.teardown().await;
    }

    /// Delegates to a memory backend but answers every refresh with a 503.
    struct OverloadedRefresh(Arc<MemoryBackend>);

    #[async_trait]
    impl AuthService for OverloadedRefresh {
        async fn sign_in_with_password(
            &self,
            email: &str,
            password: &str,
        ) -> Result<AuthSession, RemoteError> {
            self.0.sign_in_with_password(email, password).await
        }

        async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, RemoteError> {
            self.0.sign_up(request).await
        }

        async fn sign_out(&self) -> Result<(), RemoteError> {
            self.0.sign_out().await
        }

        async fn refresh_session(&self, _refresh_token: &str) -> Result<AuthSession, RemoteError> {
            Err(RemoteError::Api {
                status: 503,
                code: None,
                message: "Service Unavailable".to_string(),
            })
        }

        async fn current_session(&self) -> Option<AuthSession> {
            self.0.current_session().await
        }

        fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
            self.0.subscribe()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_server_error_keeps_both_copies_of_the_session() {
        let backend = backend();
        backend.set_token_lifetime(Duration::from_secs(30));
        let auth = Arc::new(OverloadedRefresh(backend.clone()));
        let ctx = SessionContext::init(auth.clone(), Arc::new(EventBus::default()));
        ctx.sign_in("rao@uni.edu", "secret").await.unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(ctx.state().is_signed_in());
        assert!(auth.current_session().await.is_some());

        // Still retrying, still signed in, after several retry rounds.
        tokio::time::sleep(REFRESH_RETRY_DELAY * 3).await;
        assert!(ctx.state().is_signed_in());
        ctx.teardown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_rejection_follows_the_auth_service() {
        let backend = backend();
        backend.set_token_lifetime(Duration::from_secs(30));
        let ctx = SessionContext::init(backend.clone(), Arc::new(EventBus::default()));
        ctx.sign_in("rao@uni.edu", "secret").await.unwrap();

        // Revoke every refresh token behind the client's back.
        backend.revoke_refresh_tokens();
        let mut rx = ctx.watch();
        let state = rx
            .wait_for(|s| !s.is_signed_in())
            .await
            .map(|s| s.clone())
            .unwrap();
        assert!(state.session.is_none());
        assert!(backend.current_session().await.is_none());
        ctx.teardown().await;
    }
}
