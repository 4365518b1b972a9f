//! AuthClient against a local server emulating the account backend.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};

use blockshare_auth::{AuthClient, AuthConfig, AuthError, RegisterForm};
use blockshare_core::{ClientStore, MemoryClientStore, USER_TOKEN_KEY, USERNAME_KEY};

const EMAIL: &str = "alice@example.com";
const PASSWORD: &str = "Secret1";

fn jwt(exp: i64) -> String {
    format!(
        "{}.{}.signature",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(json!({ "user_id": 7, "email": EMAIL, "exp": exp }).to_string())
    )
}

fn far_future() -> i64 {
    chrono::Utc::now().timestamp() + 3600
}

#[derive(Clone, Default)]
struct Backend {
    hits: Arc<AtomicUsize>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|t| t.split('.').count() == 3)
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": message })),
    )
        .into_response()
}

async fn login(State(b): State<Backend>, Json(body): Json<Value>) -> Response {
    b.hits.fetch_add(1, Ordering::SeqCst);
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        Json(json!({
            "success": true,
            "message": "Login successful",
            "token": jwt(far_future()),
            "userId": 7,
            "email": EMAIL,
            "username": "alice"
        }))
        .into_response()
    } else {
        unauthorized("Invalid email or password")
    }
}

async fn register(State(b): State<Backend>, Json(body): Json<Value>) -> Response {
    b.hits.fetch_add(1, Ordering::SeqCst);
    if body["email"] == EMAIL {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Email already registered" })),
        )
            .into_response();
    }
    (
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "token": jwt(far_future()),
            "userId": 8,
            "email": body["email"],
            "username": body["username"]
        })),
    )
        .into_response()
}

async fn verify(State(b): State<Backend>, headers: HeaderMap) -> Response {
    b.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized("Invalid authorization header");
    }
    Json(json!({ "success": true, "user_id": 7, "email": EMAIL })).into_response()
}

async fn update_profile(
    State(b): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return unauthorized("Invalid token");
    }
    Json(json!({ "success": true, "username": body["username"], "email": body["email"] }))
        .into_response()
}

async fn delete_account(
    State(b): State<Backend>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.hits.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) || body["password"] != PASSWORD {
        return unauthorized("Invalid password");
    }
    Json(json!({ "success": true })).into_response()
}

async fn serve() -> (SocketAddr, Backend) {
    let backend = Backend::default();
    let app = Router::new()
        .route("/api/login/", post(login))
        .route("/api/register/", post(register))
        .route("/api/verify-token/", get(verify))
        .route("/api/update-profile/", post(update_profile))
        .route("/api/delete-account/", post(delete_account))
        .with_state(backend.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, backend)
}

async fn setup() -> (AuthClient, Arc<MemoryClientStore>, Backend) {
    let (addr, backend) = serve().await;
    let store = Arc::new(MemoryClientStore::new());
    let client = AuthClient::new(
        AuthConfig::default().with_base_url(format!("http://{addr}/api/")),
        store.clone(),
    )
    .unwrap();
    (client, store, backend)
}

#[tokio::test]
async fn test_login_persists_session() {
    let (client, store, _) = setup().await;

    let session = client.login(EMAIL, PASSWORD).await.unwrap();
    assert_eq!(session.user_id, "7");
    assert_eq!(session.username, "alice");
    assert_eq!(store.get(USER_TOKEN_KEY).unwrap(), Some(session.token.clone()));
    assert!(client.is_authenticated());

    let verified = client.verify_token().await.unwrap();
    assert_eq!(verified.user_id.as_deref(), Some("7"));
    assert_eq!(verified.email.as_deref(), Some(EMAIL));
}

#[tokio::test]
async fn test_wrong_password_is_rejected_and_stores_nothing() {
    let (client, store, _) = setup().await;

    let err = client.login(EMAIL, "Wrong12").await.unwrap_err();
    assert_eq!(
        err,
        AuthError::Rejected {
            status: 401,
            message: "Invalid email or password".into()
        }
    );
    assert!(store.is_empty());
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn test_invalid_forms_never_reach_backend() {
    let (client, _, backend) = setup().await;

    assert!(client.login("", PASSWORD).await.is_err());
    assert!(client.login("nope", PASSWORD).await.is_err());
    assert!(
        client
            .register(&RegisterForm::new("bob", "bob@example.com", "weakpass"))
            .await
            .is_err()
    );
    assert_eq!(backend.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_register_duplicate_and_fresh() {
    let (client, _, _) = setup().await;

    let err = client
        .register(&RegisterForm::new("alice", EMAIL, PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert_eq!(err.to_string(), "Email already registered");

    let session = client
        .register(&RegisterForm::new("bob_2", "Bob@Example.com", "Passw0rd"))
        .await
        .unwrap();
    assert_eq!(session.email, "bob@example.com");
    assert_eq!(session.username, "bob_2");
}

#[tokio::test]
async fn test_profile_update_and_account_deletion() {
    let (client, store, _) = setup().await;
    client.login(EMAIL, PASSWORD).await.unwrap();

    let updated = client
        .update_profile("alice_renamed", EMAIL)
        .await
        .unwrap();
    assert_eq!(updated.username, "alice_renamed");
    assert_eq!(
        store.get(USERNAME_KEY).unwrap().as_deref(),
        Some("alice_renamed")
    );

    assert!(client.delete_account("Wrong12").await.is_err());
    assert!(client.is_authenticated());

    client.delete_account(PASSWORD).await.unwrap();
    assert!(!client.is_authenticated());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_expired_or_malformed_token_is_not_authenticated() {
    let (client, store, _) = setup().await;

    store.set(USER_TOKEN_KEY, &jwt(1)).unwrap();
    assert!(!client.is_authenticated());

    store.set(USER_TOKEN_KEY, "garbage").unwrap();
    assert!(!client.is_authenticated());

    client.logout().unwrap();
    assert_eq!(client.current_session().unwrap(), None);
}
