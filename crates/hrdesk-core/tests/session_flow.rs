//! End-to-end session flows against an in-process stub of the HR backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Form, Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use hrdesk_core::api::{ApiClient, PortalClient};
use hrdesk_core::auth::store::{StoreError, TOKEN_KEY};
use hrdesk_core::auth::{
    AuthError, AuthStatus, FileSessionStore, LoginStatus, MemorySessionStore, SessionManager,
    SessionStore,
};
use hrdesk_core::config::Portal;

const TOKEN: &str = "stub-token-1";

#[derive(Clone, Default)]
struct Backend {
    valid_token: Arc<Mutex<Option<String>>>,
    logout_calls: Arc<AtomicUsize>,
    rejected_calls: Arc<AtomicUsize>,
}

impl Backend {
    fn revoke(&self) {
        *self.valid_token.lock().unwrap() = None;
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let presented = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));
        let valid = self.valid_token.lock().unwrap();
        let ok = matches!((presented, valid.as_deref()), (Some(p), Some(v)) if p == v);
        if !ok {
            self.rejected_calls.fetch_add(1, Ordering::SeqCst);
        }
        ok
    }

    fn issue(&self) -> Response {
        *self.valid_token.lock().unwrap() = Some(TOKEN.to_string());
        Json(json!({ "access_token": TOKEN, "token_type": "bearer" })).into_response()
    }
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct OtpQuery {
    username: String,
    otp_code: String,
}

#[derive(Deserialize)]
struct EmailQuery {
    email: String,
}

#[derive(Deserialize)]
struct ResetQuery {
    email: String,
    otp_code: String,
    new_password: String,
    confirm_password: String,
}

fn rejected(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

fn unauthorized() -> Response {
    rejected(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

async fn login_admin(Form(form): Form<Credentials>) -> Response {
    if form.username == "alice" && form.password == "correct-pw" {
        Json(json!({ "message": "OTP sent to your email" })).into_response()
    } else {
        rejected(StatusCode::BAD_REQUEST, "Incorrect Username or Password")
    }
}

async fn login_employee(State(backend): State<Backend>, Form(form): Form<Credentials>) -> Response {
    if form.username == "bob" && form.password == "employee-pw" {
        backend.issue()
    } else {
        rejected(StatusCode::BAD_REQUEST, "Incorrect Username or Password")
    }
}

async fn verify_otp(State(backend): State<Backend>, Query(query): Query<OtpQuery>) -> Response {
    if query.username == "alice" && query.otp_code == "123456" {
        backend.issue()
    } else {
        rejected(StatusCode::BAD_REQUEST, "Invalid or expired OTP")
    }
}

async fn logout(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.logout_calls.fetch_add(1, Ordering::SeqCst);
    if backend.authorized(&headers) {
        backend.revoke();
        Json(json!({ "message": "Logged out" })).into_response()
    } else {
        unauthorized()
    }
}

async fn forgot_password(Query(query): Query<EmailQuery>) -> Response {
    if query.email == "alice@example.com" {
        Json(json!({ "message": "OTP sent to your email" })).into_response()
    } else {
        rejected(StatusCode::NOT_FOUND, "User not found")
    }
}

async fn reset_password(Query(query): Query<ResetQuery>) -> Response {
    if query.new_password != query.confirm_password {
        return rejected(StatusCode::BAD_REQUEST, "Passwords do not match");
    }
    if query.email == "alice@example.com" && query.otp_code == "654321" {
        Json(json!({ "message": "Password reset successfully" })).into_response()
    } else {
        rejected(StatusCode::BAD_REQUEST, "Invalid or expired OTP")
    }
}

async fn personal_info(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "personal_info_id": "p1",
        "user_id": "u1",
        "fullname": "Alice Nguyen",
        "email": "alice@example.com",
        "city": "Hanoi"
    }))
    .into_response()
}

async fn department(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "department_id": "d1",
        "department_name": "Engineering",
        "manager_id": "u1",
        "contact_email": "eng@example.com",
        "status": "Active"
    }))
    .into_response()
}

async fn personal_events(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([])).into_response()
}

async fn applications(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    if !backend.authorized(&headers) {
        return unauthorized();
    }
    Json(json!([{
        "application_id": "a1",
        "user_id": "u1",
        "leave_type": "Normal",
        "start_date": "2024-07-01",
        "end_date": "2024-07-05",
        "status": "Pending"
    }]))
    .into_response()
}

async fn spawn_backend(backend: Backend) -> String {
    let app = Router::new()
        .route("/api/login", post(login_employee))
        .route("/api/login/admin", post(login_admin))
        .route("/api/verify-otp", post(verify_otp))
        .route("/api/forgot-password", post(forgot_password))
        .route("/api/reset-password", post(reset_password))
        .route("/api/logout/me", post(logout))
        .route("/api/logout/admin", post(logout))
        .route("/api/me/personal_info", get(personal_info))
        .route("/api/me/department", get(department))
        .route("/api/me/personal_event", get(personal_events))
        .route("/api/me/application", get(applications))
        .with_state(backend);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}/api", addr)
}

/// Counts how often the token entry is removed
#[derive(Clone, Default)]
struct CountingStore {
    inner: MemorySessionStore,
    token_removals: Arc<AtomicUsize>,
}

impl SessionStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if key == TOKEN_KEY {
            self.token_removals.fetch_add(1, Ordering::SeqCst);
        }
        self.inner.remove(key)
    }
}

fn connect(base_url: &str, portal: Portal, store: Box<dyn SessionStore>) -> (SessionManager, PortalClient) {
    let api = ApiClient::new(base_url, portal).expect("client");
    let manager = SessionManager::new(Arc::new(api.clone()), store);
    let client = PortalClient::new(api, manager.handle());
    (manager, client)
}

#[tokio::test]
async fn test_admin_login_otp_and_logout() {
    let backend = Backend::default();
    let base_url = spawn_backend(backend.clone()).await;
    let store = MemorySessionStore::new();
    let (manager, portal) = connect(&base_url, Portal::Admin, Box::new(store.clone()));

    let status = manager.login("alice", "correct-pw").await.expect("login");
    assert_eq!(status, LoginStatus::OtpRequired);
    assert_eq!(manager.snapshot().status, AuthStatus::PendingOtp);
    assert!(matches!(portal.personal_info().await, Err(AuthError::NotAuthenticated)));

    manager.verify_otp("alice", "123456").await.expect("verify");
    assert!(manager.is_authenticated());
    assert_eq!(store.get(TOKEN_KEY).expect("get").as_deref(), Some(TOKEN));

    let info = portal.personal_info().await.expect("personal info");
    assert_eq!(info.fullname, "Alice Nguyen");

    let dashboard = portal.dashboard().await.expect("dashboard");
    assert_eq!(dashboard.department.department_name, "Engineering");
    assert_eq!(dashboard.pending_applications(), 1);
    assert!(dashboard.is_manager());
    assert_eq!(backend.rejected_calls.load(Ordering::SeqCst), 0);

    manager.logout().await.expect("logout");
    assert_eq!(backend.logout_calls.load(Ordering::SeqCst), 1);
    assert!(!manager.is_authenticated());
    assert!(store.is_empty());
    assert!(backend.valid_token.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_bad_password_and_bad_otp_use_server_messages() {
    let base_url = spawn_backend(Backend::default()).await;
    let store = MemorySessionStore::new();
    let (manager, _) = connect(&base_url, Portal::Admin, Box::new(store.clone()));

    let err = manager.login("alice", "nope").await.expect_err("bad password");
    assert!(matches!(err, AuthError::InvalidCredentials(ref m) if m == "Incorrect Username or Password"));
    assert!(store.is_empty());

    manager.login("alice", "correct-pw").await.expect("login");
    let err = manager.verify_otp("alice", "000000").await.expect_err("bad code");
    assert!(matches!(err, AuthError::InvalidOtp(ref m) if m == "Invalid or expired OTP"));
    assert_eq!(manager.snapshot().status, AuthStatus::PendingOtp);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_rejected_token_forces_single_logout() {
    let backend = Backend::default();
    let base_url = spawn_backend(backend.clone()).await;
    let store = CountingStore::default();
    let removals = store.token_removals.clone();
    let (manager, portal) = connect(&base_url, Portal::Employee, Box::new(store.clone()));

    manager.login("bob", "employee-pw").await.expect("login");
    assert!(manager.is_authenticated());
    let before = removals.load(Ordering::SeqCst);

    // Server-side invalidation: every concurrent dashboard request gets 401
    backend.revoke();
    let err = portal.dashboard().await.expect_err("revoked");
    assert!(matches!(err, AuthError::Unauthorized));
    assert!(!manager.is_authenticated());
    assert!(store.inner.is_empty());
    assert_eq!(removals.load(Ordering::SeqCst) - before, 1);

    let snapshot = manager.snapshot();
    assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
    assert!(snapshot.feedback.error.is_some());

    // Nothing else is sent once the session is gone
    let rejected = backend.rejected_calls.load(Ordering::SeqCst);
    assert!(matches!(portal.holidays().await, Err(AuthError::NotAuthenticated)));
    assert_eq!(backend.rejected_calls.load(Ordering::SeqCst), rejected);
}

#[tokio::test]
async fn test_session_survives_restart_with_file_store() {
    let backend = Backend::default();
    let base_url = spawn_backend(backend.clone()).await;
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let (manager, _) = connect(&base_url, Portal::Employee, Box::new(FileSessionStore::new(dir.path())));
        manager.login("bob", "employee-pw").await.expect("login");
    }

    let (manager, portal) = connect(&base_url, Portal::Employee, Box::new(FileSessionStore::new(dir.path())));
    assert!(!manager.is_authenticated());
    assert!(manager.check_auth().expect("check"));
    assert_eq!(manager.snapshot().username.as_deref(), Some("bob"));
    portal.department().await.expect("restored token is sent");

    manager.logout().await.expect("logout");
    assert!(!dir.path().join("session.json").exists());
    assert!(!manager.check_auth().expect("check after logout"));
}

#[tokio::test]
async fn test_forgot_and_reset_password_by_email() {
    let base_url = spawn_backend(Backend::default()).await;
    let store = MemorySessionStore::new();
    let (manager, _) = connect(&base_url, Portal::Employee, Box::new(store.clone()));

    let message = manager.forgot_password("alice@example.com").await.expect("forgot");
    assert_eq!(message, "OTP sent to your email");

    let err = manager
        .reset_password("alice@example.com", "000000", "new-secret", "new-secret")
        .await
        .expect_err("bad code");
    assert!(matches!(err, AuthError::InvalidOtp(ref m) if m == "Invalid or expired OTP"));

    let message = manager
        .reset_password("alice@example.com", "654321", "new-secret", "new-secret")
        .await
        .expect("reset");
    assert_eq!(message, "Password reset successfully");
    assert_eq!(manager.snapshot().feedback.message.as_deref(), Some("Password reset successfully"));
    assert!(!manager.is_authenticated());
    assert!(store.is_empty());
}
