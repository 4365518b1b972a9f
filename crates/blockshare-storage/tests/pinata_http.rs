//! PinataClient against a local server emulating `pinFileToIPFS`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;
use tokio::sync::{Mutex, watch};

use blockshare_core::{
    DriveError, ErrorKind, PinError, PinRequest, PinningService, TransferProgress,
};
use blockshare_storage::{PinataClient, PinataConfig, PinataCredentials};

#[derive(Default)]
struct Received {
    file_name: Option<String>,
    content_type: Option<String>,
    size: usize,
}

#[derive(Clone)]
struct Emulator {
    /// Status to answer with instead of success.
    fail_with: Option<StatusCode>,
    received: Arc<Mutex<Received>>,
}

async fn pin_file(
    State(emu): State<Emulator>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let bearer_ok = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer good-jwt");
    let keys_ok = headers.get("pinata_api_key").is_some_and(|v| v == "key")
        && headers
            .get("pinata_secret_api_key")
            .is_some_and(|v| v == "secret");
    if !bearer_ok && !keys_ok {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": { "reason": "INVALID_CREDENTIALS", "details": "bad auth" } })),
        )
            .into_response();
    }
    if let Some(status) = emu.fail_with {
        return (status, Json(json!({ "error": "nope" }))).into_response();
    }

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        let mut received = emu.received.lock().await;
        received.file_name = file_name;
        received.content_type = content_type;
        received.size = data.len();
    }

    Json(json!({
        "IpfsHash": "Qm123",
        "PinSize": emu.received.lock().await.size,
        "Timestamp": "2024-01-01T00:00:00Z"
    }))
    .into_response()
}

async fn serve(fail_with: Option<StatusCode>) -> (SocketAddr, Emulator) {
    let emu = Emulator {
        fail_with,
        received: Arc::new(Mutex::new(Received::default())),
    };
    let app = Router::new()
        .route("/pinning/pinFileToIPFS", post(pin_file))
        .layer(DefaultBodyLimit::disable())
        .with_state(emu.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, emu)
}

fn client(addr: SocketAddr, credentials: PinataCredentials) -> PinataClient {
    PinataClient::new(
        PinataConfig::default()
            .with_endpoint(format!("http://{addr}/pinning/pinFileToIPFS"))
            .with_credentials(credentials)
            .with_chunk_size(16 * 1024),
    )
    .unwrap()
}

fn small_file() -> PinRequest {
    PinRequest::new("note.txt", "text/plain", Bytes::from_static(b"hello pinning"))
}

fn two_megabytes() -> PinRequest {
    PinRequest::new(
        "report.bin",
        "application/octet-stream",
        Bytes::from(vec![0x5a; 2 * 1024 * 1024]),
    )
}

#[tokio::test]
async fn test_pin_with_jwt_reports_progress() {
    let (addr, emu) = serve(None).await;
    let client = client(addr, PinataCredentials::Jwt("good-jwt".into()));

    let (tx, mut rx) = watch::channel(TransferProgress::default());
    let watcher = tokio::spawn(async move {
        let mut seen = vec![rx.borrow().percent()];
        while rx.changed().await.is_ok() {
            seen.push(rx.borrow().percent());
        }
        seen
    });

    let cid = client.pin(two_megabytes(), tx).await.unwrap();
    assert_eq!(cid.as_str(), "Qm123");

    let seen = watcher.await.unwrap();
    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
    assert_eq!(seen.last().copied(), Some(100));

    let received = emu.received.lock().await;
    assert_eq!(received.file_name.as_deref(), Some("report.bin"));
    assert_eq!(
        received.content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(received.size, 2 * 1024 * 1024);
}

#[tokio::test]
async fn test_pin_with_key_pair() {
    let (addr, _) = serve(None).await;
    let client = client(
        addr,
        PinataCredentials::KeyPair {
            api_key: "key".into(),
            secret: "secret".into(),
        },
    );
    let (tx, _rx) = watch::channel(TransferProgress::default());
    let cid = client
        .pin(PinRequest::new("a.png", "image/png", Bytes::from_static(b"png")), tx)
        .await
        .unwrap();
    assert_eq!(cid.as_str(), "Qm123");
}

#[tokio::test]
async fn test_bad_credentials_map_to_auth_failed() {
    let (addr, _) = serve(None).await;
    let client = client(addr, PinataCredentials::Jwt("wrong".into()));
    let (tx, _rx) = watch::channel(TransferProgress::default());

    let err = client.pin(small_file(), tx).await.unwrap_err();
    assert_eq!(
        err,
        PinError::Status {
            status: 401,
            message: "INVALID_CREDENTIALS: bad auth".into()
        }
    );
    assert_eq!(DriveError::from(err).kind(), ErrorKind::AuthFailed);
}

#[tokio::test]
async fn test_rate_limit_and_size_limit() {
    let (addr, _) = serve(Some(StatusCode::TOO_MANY_REQUESTS)).await;
    let client = client(addr, PinataCredentials::Jwt("good-jwt".into()));
    let (tx, _rx) = watch::channel(TransferProgress::default());
    let err = client.pin(small_file(), tx).await.unwrap_err();
    assert_eq!(DriveError::from(err).kind(), ErrorKind::RateLimited);

    let (addr, _) = serve(Some(StatusCode::PAYLOAD_TOO_LARGE)).await;
    let client = self::client(addr, PinataCredentials::Jwt("good-jwt".into()));
    let (tx, _rx) = watch::channel(TransferProgress::default());
    let err = client.pin(small_file(), tx).await.unwrap_err();
    assert_eq!(
        DriveError::from(err),
        DriveError::PayloadTooLarge { size: 13 }
    );
}

#[tokio::test]
async fn test_unreachable_host() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(addr, PinataCredentials::Jwt("good-jwt".into()));
    let (tx, _rx) = watch::channel(TransferProgress::default());
    let err = client.pin(small_file(), tx).await.unwrap_err();
    assert_eq!(DriveError::from(err).kind(), ErrorKind::NetworkUnreachable);
}
