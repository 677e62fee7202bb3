//! HTTP-level tests for `HttpBackend` against a fake hosted backend.
//!
//! The fake is an axum router bound to an ephemeral local port that mimics
//! the auth, rest, and storage endpoints closely enough to exercise request
//! construction and response parsing.

use std::collections::HashMap;

use assert_matches::assert_matches;
use axum::extract::{Path, Query as QueryParams};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use fms_core::roles::Role;
use fms_remote::{
    tables, AuthChangeEvent, AuthService, DataService, FileStorage, HttpBackend, Query,
    RemoteConfig, RemoteError, SignUpOutcome, SignUpRequest,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

const ANON_KEY: &str = "anon-test-key";
const USER_ID: &str = "6a1f7c1e-3b0a-4f55-9d1e-2f8d3c4b5a60";
const TOKEN_EXP: i64 = 1_900_000_000;

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

fn access_token() -> String {
    let claims = json!({ "sub": USER_ID, "exp": TOKEN_EXP, "role": "authenticated" });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"server-side"))
        .expect("encoding should succeed")
}

fn user_json(email: &str) -> Value {
    json!({
        "id": USER_ID,
        "email": email,
        "email_confirmed_at": "2024-01-01T00:00:00Z",
        "user_metadata": { "full_name": "Dr. Rao", "role": "faculty" },
    })
}

fn header(headers: &HeaderMap, name: &str) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

async fn token(
    QueryParams(params): QueryParams<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let grant = params.get("grant_type").map(String::as_str);
    let ok = match grant {
        Some("password") => body["email"] == "rao@uni.edu" && body["password"] == "secret",
        Some("refresh_token") => body["refresh_token"] == "refresh-1",
        _ => false,
    };
    if !ok {
        let error = json!({
            "code": 400,
            "error_code": "invalid_credentials",
            "msg": "Invalid login credentials",
        });
        return (StatusCode::BAD_REQUEST, Json(error));
    }
    // No expires_at / expires_in: the client must read `exp` from the token.
    let response = json!({
        "access_token": access_token(),
        "refresh_token": "refresh-1",
        "token_type": "bearer",
        "user": user_json("rao@uni.edu"),
    });
    (StatusCode::OK, Json(response))
}

async fn signup(Json(body): Json<Value>) -> impl IntoResponse {
    // Confirmation required: the bare user comes back.
    let mut user = user_json(body["email"].as_str().unwrap_or_default());
    user["email_confirmed_at"] = Value::Null;
    user["user_metadata"] = body["data"].clone();
    Json(user)
}

async fn logout() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "upstream down")
}

/// Echoes the request back as a single row; also answers `HEAD` counts.
async fn select_rows(
    Path(table): Path<String>,
    headers: HeaderMap,
    QueryParams(params): QueryParams<HashMap<String, String>>,
) -> impl IntoResponse {
    let row = json!({
        "table": table,
        "apikey": header(&headers, "apikey"),
        "authorization": header(&headers, "authorization"),
        "prefer": header(&headers, "prefer"),
        "params": params,
    });
    ([("content-range", "0-0/42")], Json(json!([row])))
}

async fn insert_row(Path(table): Path<String>, Json(mut body): Json<Value>) -> impl IntoResponse {
    if table == "broken" {
        let error = json!({
            "code": "23502",
            "message": "null value in column \"topic_covered\"",
            "details": null,
            "hint": null,
        });
        return (StatusCode::BAD_REQUEST, Json(error));
    }
    body["id"] = json!("row-1");
    (StatusCode::CREATED, Json(json!([body])))
}

async fn upload_object(Path((bucket, path)): Path<(String, String)>) -> impl IntoResponse {
    Json(json!({ "Key": format!("{bucket}/{path}") }))
}

async fn spawn_fake_backend() -> String {
    let app = Router::new()
        .route("/auth/v1/token", post(token))
        .route("/auth/v1/signup", post(signup))
        .route("/auth/v1/logout", post(logout))
        .route("/rest/v1/{table}", get(select_rows).post(insert_row))
        .route("/storage/v1/object/{bucket}/{*path}", post(upload_object));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind should succeed");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend");
    });
    format!("http://{addr}")
}

async fn backend() -> HttpBackend {
    let base = spawn_fake_backend().await;
    HttpBackend::new(RemoteConfig::new(base, ANON_KEY)).expect("client should build")
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sign_in_stores_session_and_reads_token_expiry() {
    let backend = backend().await;
    let mut changes = backend.subscribe();

    let session = backend
        .sign_in_with_password("rao@uni.edu", "secret")
        .await
        .expect("sign in should succeed");

    assert_eq!(session.user.id.to_string(), USER_ID);
    assert_eq!(session.expires_at, Some(TOKEN_EXP));
    assert_eq!(backend.current_session().await, Some(session));
    assert_eq!(changes.recv().await.unwrap().event, AuthChangeEvent::SignedIn);
}

#[tokio::test]
async fn bad_credentials_are_typed() {
    let backend = backend().await;
    let result = backend.sign_in_with_password("rao@uni.edu", "nope").await;
    assert_matches!(result, Err(RemoteError::InvalidCredentials));
    assert!(backend.current_session().await.is_none());
}

#[tokio::test]
async fn sign_up_pending_confirmation_returns_user() {
    let backend = backend().await;
    let request = SignUpRequest {
        email: "new@uni.edu".into(),
        password: "pw".into(),
        full_name: "New Person".into(),
        role: Role::Faculty,
    };
    let outcome = backend.sign_up(&request).await.expect("sign up should succeed");
    assert_matches!(
        outcome,
        SignUpOutcome::PendingConfirmation(user)
            if user.user_metadata.role.as_deref() == Some("faculty")
                && user.user_metadata.full_name.as_deref() == Some("New Person")
    );
    assert!(backend.current_session().await.is_none());
}

#[tokio::test]
async fn sign_out_failure_still_clears_session() {
    let backend = backend().await;
    backend
        .sign_in_with_password("rao@uni.edu", "secret")
        .await
        .unwrap();
    let mut changes = backend.subscribe();

    let result = backend.sign_out().await;

    assert_matches!(result, Err(RemoteError::Api { status: 503, .. }));
    assert!(backend.current_session().await.is_none());
    assert_eq!(changes.recv().await.unwrap().event, AuthChangeEvent::SignedOut);
}

#[tokio::test]
async fn refresh_replaces_session() {
    let backend = backend().await;
    let session = backend.refresh_session("refresh-1").await.unwrap();
    assert_eq!(backend.current_session().await, Some(session));

    let err = backend.refresh_session("stale").await.unwrap_err();
    assert_matches!(err, RemoteError::Api { status: 400, .. });
    assert!(backend.current_session().await.is_none());
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[tokio::test]
async fn select_sends_postgrest_params_and_anon_bearer() {
    let backend = backend().await;
    let query = Query::table(tables::WORK_ACTIVITIES)
        .eq("faculty_id", USER_ID)
        .in_list("activity_type", ["teaching", "research"])
        .newest_first();

    let rows = backend.select(&query).await.unwrap();
    let echoed = &rows[0];

    assert_eq!(echoed["table"], "work_activities");
    assert_eq!(echoed["apikey"], ANON_KEY);
    assert_eq!(echoed["authorization"], format!("Bearer {ANON_KEY}"));
    assert_eq!(echoed["params"]["faculty_id"], format!("eq.{USER_ID}"));
    assert_eq!(echoed["params"]["activity_type"], "in.(teaching,research)");
    assert_eq!(echoed["params"]["order"], "created_at.desc");
}

#[tokio::test]
async fn signed_in_requests_carry_the_access_token() {
    let backend = backend().await;
    let session = backend
        .sign_in_with_password("rao@uni.edu", "secret")
        .await
        .unwrap();

    let rows = backend.select(&Query::table(tables::COURSES)).await.unwrap();
    assert_eq!(
        rows[0]["authorization"],
        format!("Bearer {}", session.access_token)
    );
}

#[tokio::test]
async fn count_reads_content_range() {
    let backend = backend().await;
    let total = backend
        .count(&Query::table(tables::PROFILES).eq("role", "faculty"))
        .await
        .unwrap();
    assert_eq!(total, 42);
}

#[tokio::test]
async fn insert_returns_stored_row() {
    let backend = backend().await;
    let row = backend
        .insert(tables::CLASS_RECORDS, json!({ "topic_covered": "Trees" }))
        .await
        .unwrap();
    assert_eq!(row["id"], "row-1");
    assert_eq!(row["topic_covered"], "Trees");
}

#[tokio::test]
async fn constraint_violations_surface_as_api_errors() {
    let backend = backend().await;
    let err = backend.insert("broken", json!({})).await.unwrap_err();
    assert_matches!(
        err,
        RemoteError::Api { status: 400, code: Some(ref code), .. } if code == "23502"
    );
    assert!(!err.is_network());
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unreachable_backend_is_a_network_error() {
    let backend = HttpBackend::new(RemoteConfig::new("http://127.0.0.1:1", ANON_KEY)).unwrap();
    let err = backend.select(&Query::table(tables::COURSES)).await.unwrap_err();
    assert!(err.is_network());
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upload_returns_path_within_bucket() {
    let backend = backend().await;
    let path = backend
        .upload("documents", "u1/123-notes.pdf", b"%PDF".to_vec(), "application/pdf")
        .await
        .unwrap();
    assert_eq!(path, "u1/123-notes.pdf");

    let url = backend.public_url("documents", &path);
    assert!(url.ends_with("/storage/v1/object/public/documents/u1/123-notes.pdf"));
    assert!(url.starts_with("http://127.0.0.1:"));
}
