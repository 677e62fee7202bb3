//! In-process backend.
//!
//! [`MemoryBackend`] implements the auth, table, and storage contracts over
//! plain maps. It backs the integration tests and the CLI's offline mode,
//! and can inject latency and failures per [`Operation`].

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use fms_core::roles::Role;
use fms_core::types::Id;
use serde_json::{json, Map, Value};
use tokio::sync::broadcast;

use crate::auth::{
    AuthChange, AuthChangeEvent, AuthService, AuthSession, AuthUser, SignUpOutcome,
    SignUpRequest, UserMetadata, AUTH_CHANGE_CAPACITY,
};
use crate::data::DataService;
use crate::error::RemoteError;
use crate::query::{compare_values, tables, Query};
use crate::storage::FileStorage;

/// Lifetime of issued access tokens unless overridden.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

const DEFAULT_BASE_URL: &str = "memory://fms";

/// Remote calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    SignIn,
    SignUp,
    SignOut,
    Refresh,
    Select,
    Count,
    Insert,
    Update,
    Delete,
    Upload,
}

#[derive(Debug, Clone)]
struct StoredUser {
    user: AuthUser,
    password: String,
}

#[derive(Debug, Default)]
struct Faults {
    pending: HashMap<Operation, u32>,
    always: HashSet<Operation>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: HashMap<String, Vec<Value>>,
    users: HashMap<String, StoredUser>,
    refresh_tokens: HashMap<String, Id>,
    objects: HashMap<String, (Vec<u8>, String)>,
    select_counts: HashMap<String, usize>,
    faults: Faults,
    latency: Option<Duration>,
    token_lifetime: Option<Duration>,
    require_confirmation: bool,
}

/// One client of an in-process store.
///
/// [`MemoryBackend::new_client`] opens another client on the same store with
/// its own session, the way two browsers share one hosted project.
pub struct MemoryBackend {
    base_url: String,
    state: Arc<Mutex<MemoryState>>,
    session: Mutex<Option<AuthSession>>,
    auth_tx: broadcast::Sender<AuthChange>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Use `base_url` as the prefix of public object URLs.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self::attach(
            base_url.into().trim_end_matches('/').to_string(),
            Arc::new(Mutex::new(MemoryState::default())),
        )
    }

    /// Another client of the same store, signed out.
    pub fn new_client(&self) -> Self {
        Self::attach(self.base_url.clone(), Arc::clone(&self.state))
    }

    fn attach(base_url: String, state: Arc<Mutex<MemoryState>>) -> Self {
        let (auth_tx, _) = broadcast::channel(AUTH_CHANGE_CAPACITY);
        Self {
            base_url,
            state,
            session: Mutex::new(None),
            auth_tx,
        }
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    /// New sign-ups must confirm their email before signing in.
    pub fn require_email_confirmation(&self, required: bool) {
        self.state().require_confirmation = required;
    }

    pub fn set_token_lifetime(&self, lifetime: Duration) {
        self.state().token_lifetime = Some(lifetime);
    }

    /// Invalidate every outstanding refresh token, as a server-side revoke would.
    pub fn revoke_refresh_tokens(&self) {
        self.state().refresh_tokens.clear();
    }

    /// Delay every remote call by `latency` (tokio time).
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.state().latency = latency;
    }

    /// Create an identity and its profile row directly.
    pub fn register_user(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
        role: Role,
        confirmed: bool,
    ) -> AuthUser {
        let mut state = self.state();
        create_user(&mut state, email, password, full_name, role, confirmed)
    }

    pub fn confirm_email(&self, email: &str) {
        if let Some(stored) = self.state().users.get_mut(email) {
            stored.user.email_confirmed_at = Some(Utc::now());
        }
    }

    /// Insert a row without going through the contract (no latency, no
    /// faults). Returns the stored row.
    pub fn seed(&self, table: &str, row: Value) -> Value {
        let mut state = self.state();
        insert_row(&mut state, table, row)
    }

    /// Snapshot of a table in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    /// Number of `select` calls made against `table`.
    pub fn select_count(&self, table: &str) -> usize {
        self.state().select_counts.get(table).copied().unwrap_or(0)
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        self.state()
            .objects
            .get(&object_key(bucket, path))
            .map(|(bytes, _)| bytes.clone())
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// The next call of `op` fails.
    pub fn fail_next(&self, op: Operation) {
        self.fail_times(op, 1);
    }

    /// The next `times` calls of `op` fail.
    pub fn fail_times(&self, op: Operation, times: u32) {
        *self.state().faults.pending.entry(op).or_default() += times;
    }

    /// Every call of `op` fails until turned off again.
    pub fn set_failing(&self, op: Operation, failing: bool) {
        let mut state = self.state();
        if failing {
            state.faults.always.insert(op);
        } else {
            state.faults.always.remove(&op);
        }
    }

    // ---- private helpers ----

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn session(&self) -> MutexGuard<'_, Option<AuthSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply configured latency, then consume a pending fault for `op`.
    async fn simulate(&self, op: Operation) -> Result<(), RemoteError> {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state();
        let faults = &mut state.faults;
        let injected = if faults.always.contains(&op) {
            true
        } else if let Some(remaining) = faults.pending.get_mut(&op) {
            *remaining -= 1;
            if *remaining == 0 {
                faults.pending.remove(&op);
            }
            true
        } else {
            false
        };

        if injected {
            tracing::debug!(?op, "Injected remote failure");
            return Err(RemoteError::Unavailable(format!("simulated {op:?} failure")));
        }
        Ok(())
    }

    fn issue_session(&self, state: &mut MemoryState, user: AuthUser) -> AuthSession {
        let lifetime = state.token_lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME);
        let refresh_token = format!("memory-refresh-{}", Id::new_v4());
        state.refresh_tokens.insert(refresh_token.clone(), user.id);

        let session = AuthSession {
            access_token: format!("memory-{}", Id::new_v4()),
            refresh_token,
            expires_at: Some(Utc::now().timestamp() + lifetime.as_secs() as i64),
            user,
        };
        *self.session() = Some(session.clone());
        session
    }

    fn notify(&self, change: AuthChange) {
        let _ = self.auth_tx.send(change);
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn object_key(bucket: &str, path: &str) -> String {
    format!("{bucket}/{path}")
}

fn create_user(
    state: &mut MemoryState,
    email: &str,
    password: &str,
    full_name: &str,
    role: Role,
    confirmed: bool,
) -> AuthUser {
    let user = AuthUser {
        id: Id::new_v4(),
        email: email.to_string(),
        email_confirmed_at: confirmed.then(Utc::now),
        user_metadata: UserMetadata {
            full_name: Some(full_name.to_string()),
            role: Some(role.as_str().to_string()),
        },
    };
    state.users.insert(
        email.to_string(),
        StoredUser {
            user: user.clone(),
            password: password.to_string(),
        },
    );

    // The hosted backend creates the profile row from sign-up metadata.
    insert_row(
        state,
        tables::PROFILES,
        json!({
            "id": user.id,
            "email": email,
            "full_name": full_name,
            "role": role.as_str(),
        }),
    );
    user
}

/// Store `row`, filling `id`, `created_at`, and `updated_at` when absent.
fn insert_row(state: &mut MemoryState, table: &str, row: Value) -> Value {
    let mut object = match row {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    let now = now_string();
    object
        .entry("id")
        .or_insert_with(|| json!(Id::new_v4()));
    object
        .entry("created_at")
        .or_insert_with(|| Value::String(now.clone()));
    object
        .entry("updated_at")
        .or_insert_with(|| Value::String(now));

    let stored = Value::Object(object);
    state
        .tables
        .entry(table.to_string())
        .or_default()
        .push(stored.clone());
    stored
}

/// Project `row` onto `columns`.
fn project(row: &Value, columns: &[String]) -> Value {
    let mut out = Map::new();
    for column in columns {
        out.insert(
            column.clone(),
            row.get(column).cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(out)
}

fn run_select(state: &MemoryState, query: &Query) -> Vec<Value> {
    let mut matched: Vec<(usize, &Value)> = state
        .tables
        .get(&query.table)
        .map(|rows| rows.iter().enumerate().filter(|(_, r)| query.matches(r)).collect())
        .unwrap_or_default();

    if let Some(order) = &query.order {
        matched.sort_by(|(ia, a), (ib, b)| {
            let a_val = a.get(&order.column).unwrap_or(&Value::Null);
            let b_val = b.get(&order.column).unwrap_or(&Value::Null);
            let ord = compare_values(a_val, b_val);
            if order.ascending {
                ord.then(ia.cmp(ib))
            } else {
                ord.reverse().then(ib.cmp(ia))
            }
        });
    }
    if let Some(limit) = query.limit {
        matched.truncate(limit);
    }

    matched
        .into_iter()
        .map(|(_, row)| {
            let mut row = row.clone();
            for embed in &query.embeds {
                let related = row
                    .get(&embed.foreign_key)
                    .filter(|fk| !fk.is_null())
                    .and_then(|fk| {
                        state
                            .tables
                            .get(&embed.table)?
                            .iter()
                            .find(|r| r.get("id") == Some(fk))
                    })
                    .map(|r| project(r, &embed.columns))
                    .unwrap_or(Value::Null);
                if let Value::Object(map) = &mut row {
                    map.insert(embed.table.clone(), related);
                }
            }
            row
        })
        .collect()
}

// ----------------------------------------------------------------------
// Contract implementations
// ----------------------------------------------------------------------

#[async_trait]
impl AuthService for MemoryBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, RemoteError> {
        self.simulate(Operation::SignIn).await?;

        let session = {
            let mut state = self.state();
            let stored = state
                .users
                .get(email)
                .filter(|u| u.password == password)
                .cloned()
                .ok_or(RemoteError::InvalidCredentials)?;
            if state.require_confirmation && !stored.user.is_confirmed() {
                return Err(RemoteError::EmailNotConfirmed);
            }
            self.issue_session(&mut state, stored.user)
        };

        self.notify(AuthChange::new(AuthChangeEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpOutcome, RemoteError> {
        self.simulate(Operation::SignUp).await?;

        let outcome = {
            let mut state = self.state();
            if state.users.contains_key(&request.email) {
                return Err(RemoteError::Api {
                    status: 422,
                    code: Some("user_already_exists".to_string()),
                    message: "User already registered".to_string(),
                });
            }
            let confirmed = !state.require_confirmation;
            let user = create_user(
                &mut state,
                &request.email,
                &request.password,
                &request.full_name,
                request.role,
                confirmed,
            );
            if confirmed {
                SignUpOutcome::Active(self.issue_session(&mut state, user))
            } else {
                SignUpOutcome::PendingConfirmation(user)
            }
        };

        if let SignUpOutcome::Active(session) = &outcome {
            self.notify(AuthChange::new(AuthChangeEvent::SignedIn, Some(session.clone())));
        }
        Ok(outcome)
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        let result = self.simulate(Operation::SignOut).await;

        let previous = self.session().take();
        if let Some(session) = previous {
            self.state().refresh_tokens.remove(&session.refresh_token);
        }
        self.notify(AuthChange::new(AuthChangeEvent::SignedOut, None));
        result
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<AuthSession, RemoteError> {
        self.simulate(Operation::Refresh).await?;

        let refreshed = {
            let mut state = self.state();
            let user = state
                .refresh_tokens
                .remove(refresh_token)
                .and_then(|id| state.users.values().find(|u| u.user.id == id))
                .map(|stored| stored.user.clone());
            match user {
                Some(user) => Ok(self.issue_session(&mut state, user)),
                None => {
                    *self.session() = None;
                    Err(RemoteError::Api {
                        status: 400,
                        code: Some("invalid_grant".to_string()),
                        message: "Invalid Refresh Token".to_string(),
                    })
                }
            }
        };

        match refreshed {
            Ok(session) => {
                self.notify(AuthChange::new(
                    AuthChangeEvent::TokenRefreshed,
                    Some(session.clone()),
                ));
                Ok(session)
            }
            Err(err) => {
                self.notify(AuthChange::new(AuthChangeEvent::SignedOut, None));
                Err(err)
            }
        }
    }

    async fn current_session(&self) -> Option<AuthSession> {
        self.session().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.auth_tx.subscribe()
    }
}

#[async_trait]
impl DataService for MemoryBackend {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        self.simulate(Operation::Select).await?;
        let mut state = self.state();
        *state.select_counts.entry(query.table.clone()).or_default() += 1;
        Ok(run_select(&state, query))
    }

    async fn count(&self, query: &Query) -> Result<u64, RemoteError> {
        self.simulate(Operation::Count).await?;
        let state = self.state();
        let count = state
            .tables
            .get(&query.table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.simulate(Operation::Insert).await?;
        if !row.is_object() {
            return Err(RemoteError::Api {
                status: 400,
                code: Some("PGRST102".to_string()),
                message: "Row must be a JSON object".to_string(),
            });
        }
        let mut state = self.state();
        Ok(insert_row(&mut state, table, row))
    }

    async fn update(&self, query: &Query, patch: Value) -> Result<Vec<Value>, RemoteError> {
        self.simulate(Operation::Update).await?;
        let Value::Object(patch) = patch else {
            return Err(RemoteError::Api {
                status: 400,
                code: Some("PGRST102".to_string()),
                message: "Patch must be a JSON object".to_string(),
            });
        };

        let now = now_string();
        let mut state = self.state();
        let mut updated = Vec::new();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            for row in rows.iter_mut().filter(|r| query.matches(r)) {
                if let Value::Object(map) = row {
                    for (k, v) in &patch {
                        map.insert(k.clone(), v.clone());
                    }
                    map.insert("updated_at".to_string(), Value::String(now.clone()));
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, query: &Query) -> Result<(), RemoteError> {
        self.simulate(Operation::Delete).await?;
        let mut state = self.state();
        if let Some(rows) = state.tables.get_mut(&query.table) {
            rows.retain(|r| !query.matches(r));
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for MemoryBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, RemoteError> {
        self.simulate(Operation::Upload).await?;
        let key = object_key(bucket, path);
        let mut state = self.state();
        if state.objects.contains_key(&key) {
            return Err(RemoteError::Api {
                status: 409,
                code: Some("Duplicate".to_string()),
                message: "The resource already exists".to_string(),
            });
        }
        state.objects.insert(key, (bytes, content_type.to_string()));
        Ok(path.to_string())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn backend_with_faculty() -> (MemoryBackend, AuthUser) {
        let backend = MemoryBackend::new();
        let user = backend.register_user("f@uni.edu", "secret", "Dr. F", Role::Faculty, true);
        (backend, user)
    }

    #[tokio::test]
    async fn sign_in_checks_password_and_confirmation() {
        let (backend, user) = backend_with_faculty();
        assert_matches!(
            backend.sign_in_with_password("f@uni.edu", "wrong").await,
            Err(RemoteError::InvalidCredentials)
        );

        let session = backend.sign_in_with_password("f@uni.edu", "secret").await.unwrap();
        assert_eq!(session.user.id, user.id);
        assert_eq!(backend.current_session().await, Some(session));

        backend.require_email_confirmation(true);
        backend.register_user("new@uni.edu", "pw", "New", Role::Faculty, false);
        assert_matches!(
            backend.sign_in_with_password("new@uni.edu", "pw").await,
            Err(RemoteError::EmailNotConfirmed)
        );
    }

    #[tokio::test]
    async fn sign_up_creates_profile_row() {
        let backend = MemoryBackend::new();
        let request = SignUpRequest {
            email: "a@uni.edu".into(),
            password: "pw".into(),
            full_name: "Ada".into(),
            role: Role::Admin,
        };
        let outcome = backend.sign_up(&request).await.unwrap();
        assert_matches!(outcome, SignUpOutcome::Active(_));

        let profiles = backend.rows(tables::PROFILES);
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0]["role"], "admin");
        assert_eq!(profiles[0]["full_name"], "Ada");

        assert_matches!(
            backend.sign_up(&request).await,
            Err(RemoteError::Api { status: 422, .. })
        );
    }

    #[tokio::test]
    async fn sign_out_clears_session_even_when_failing() {
        let (backend, _) = backend_with_faculty();
        backend.sign_in_with_password("f@uni.edu", "secret").await.unwrap();
        let mut rx = backend.subscribe();

        backend.fail_next(Operation::SignOut);
        assert!(backend.sign_out().await.is_err());
        assert!(backend.current_session().await.is_none());
        assert_eq!(rx.recv().await.unwrap().event, AuthChangeEvent::SignedOut);
    }

    #[tokio::test]
    async fn refresh_rotates_tokens() {
        let (backend, _) = backend_with_faculty();
        let first = backend.sign_in_with_password("f@uni.edu", "secret").await.unwrap();

        let second = backend.refresh_session(&first.refresh_token).await.unwrap();
        assert_ne!(first.access_token, second.access_token);

        // A used refresh token is spent.
        assert_matches!(
            backend.refresh_session(&first.refresh_token).await,
            Err(RemoteError::Api { status: 400, .. })
        );
        assert!(backend.current_session().await.is_none());
    }

    #[tokio::test]
    async fn clients_share_rows_but_not_sessions() {
        let (admin, _) = backend_with_faculty();
        admin.register_user("admin@uni.edu", "pw", "Admin", Role::Admin, true);
        let faculty = admin.new_client();

        admin.sign_in_with_password("admin@uni.edu", "pw").await.unwrap();
        assert!(faculty.current_session().await.is_none());

        admin
            .insert(tables::COURSES, json!({"code": "CS101"}))
            .await
            .unwrap();
        assert_eq!(faculty.rows(tables::COURSES).len(), 1);
    }

    #[tokio::test]
    async fn select_filters_orders_and_embeds() {
        let backend = MemoryBackend::new();
        let course = backend.seed(tables::COURSES, json!({"code": "CS201", "name": "DS"}));
        backend.seed(
            tables::CLASS_SESSIONS,
            json!({"topic": "old", "course_id": course["id"], "created_at": "2024-01-01T00:00:00Z"}),
        );
        backend.seed(
            tables::CLASS_SESSIONS,
            json!({"topic": "new", "course_id": null, "created_at": "2024-02-01T00:00:00Z"}),
        );

        let query = Query::table(tables::CLASS_SESSIONS)
            .embed(tables::COURSES, "course_id", &["name", "code"])
            .newest_first();
        let rows = backend.select(&query).await.unwrap();
        assert_eq!(rows[0]["topic"], "new");
        assert!(rows[0]["courses"].is_null());
        assert_eq!(rows[1]["courses"], json!({"name": "DS", "code": "CS201"}));
        assert_eq!(backend.select_count(tables::CLASS_SESSIONS), 1);
    }

    #[tokio::test]
    async fn update_and_delete_apply_to_matching_rows() {
        let backend = MemoryBackend::new();
        let row = backend.seed(tables::COURSES, json!({"code": "A", "status": "active"}));
        backend.seed(tables::COURSES, json!({"code": "B", "status": "active"}));

        let updated = backend
            .update(
                &Query::table(tables::COURSES).eq("id", row["id"].clone()),
                json!({"status": "completed"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], "completed");

        backend
            .delete(&Query::table(tables::COURSES).eq("code", "B"))
            .await
            .unwrap();
        let count = backend.count(&Query::table(tables::COURSES)).await.unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn injected_faults_are_consumed() {
        let backend = MemoryBackend::new();
        backend.fail_times(Operation::Count, 2);
        let query = Query::table(tables::COURSES);
        assert_matches!(backend.count(&query).await, Err(RemoteError::Unavailable(_)));
        assert_matches!(backend.count(&query).await, Err(RemoteError::Unavailable(_)));
        assert_eq!(backend.count(&query).await.unwrap(), 0);

        backend.set_failing(Operation::Upload, true);
        let err = backend.upload("documents", "a.pdf", vec![1], "application/pdf").await;
        assert!(err.unwrap_err().is_network());
    }

    #[tokio::test]
    async fn uploads_are_stored_and_addressable() {
        let backend = MemoryBackend::with_base_url("https://proj.example.co/");
        let path = backend
            .upload("documents", "u1/notes.pdf", b"pdf".to_vec(), "application/pdf")
            .await
            .unwrap();
        assert_eq!(path, "u1/notes.pdf");
        assert_eq!(backend.object("documents", &path), Some(b"pdf".to_vec()));
        assert_eq!(
            backend.public_url("documents", &path),
            "https://proj.example.co/storage/v1/object/public/documents/u1/notes.pdf"
        );
    }
}
