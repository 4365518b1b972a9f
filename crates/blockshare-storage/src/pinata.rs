//! Pinata pinning client.
//!
//! Uploads one file per request to `pinFileToIPFS` as multipart form data.
//! The body is streamed in fixed-size chunks so byte progress can be
//! reported while the request is in flight.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use blockshare_core::{ContentId, PinError, PinRequest, PinningService, TransferProgress};

/// Production pinning endpoint.
pub const PINATA_PIN_FILE_URL: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Pinata authentication.
#[derive(Clone, PartialEq, Eq)]
pub enum PinataCredentials {
    /// `Authorization: Bearer <jwt>`
    Jwt(String),
    /// `pinata_api_key` / `pinata_secret_api_key` headers
    KeyPair { api_key: String, secret: String },
}

impl PinataCredentials {
    /// Pick credentials from optional parts: a non-empty JWT wins, otherwise
    /// both key and secret must be present.
    pub fn from_parts(
        jwt: Option<String>,
        api_key: Option<String>,
        secret: Option<String>,
    ) -> Option<Self> {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(jwt) = non_empty(jwt) {
            return Some(Self::Jwt(jwt));
        }
        match (non_empty(api_key), non_empty(secret)) {
            (Some(api_key), Some(secret)) => Some(Self::KeyPair { api_key, secret }),
            _ => None,
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Jwt(jwt) => request.bearer_auth(jwt),
            Self::KeyPair { api_key, secret } => request
                .header("pinata_api_key", api_key)
                .header("pinata_secret_api_key", secret),
        }
    }
}

impl fmt::Debug for PinataCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwt(_) => f.write_str("Jwt(<redacted>)"),
            Self::KeyPair { api_key, .. } => f
                .debug_struct("KeyPair")
                .field("api_key", api_key)
                .field("secret", &"<redacted>")
                .finish(),
        }
    }
}

/// Pinata client configuration.
#[derive(Debug, Clone)]
pub struct PinataConfig {
    pub endpoint: String,
    pub credentials: Option<PinataCredentials>,
    pub chunk_size: usize,
    pub timeout: Duration,
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            endpoint: PINATA_PIN_FILE_URL.to_string(),
            credentials: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PinataConfig {
    pub fn with_credentials(mut self, credentials: PinataCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

/// [`PinningService`] backed by the Pinata HTTP API.
#[derive(Debug, Clone)]
pub struct PinataClient {
    http: reqwest::Client,
    config: PinataConfig,
}

impl PinataClient {
    pub fn new(config: PinataConfig) -> Result<Self, PinError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PinError::Unreachable(e.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &PinataConfig {
        &self.config
    }

    fn file_part(
        &self,
        request: PinRequest,
        progress: watch::Sender<TransferProgress>,
    ) -> Result<Part, PinError> {
        let total = request.size();
        let chunks = split_chunks(&request.bytes, self.config.chunk_size);
        let body = async_stream::stream! {
            let mut sent = 0u64;
            for chunk in chunks {
                sent += chunk.len() as u64;
                progress.send_replace(TransferProgress::new(sent, total));
                yield Ok::<Bytes, std::io::Error>(chunk);
            }
        };

        Part::stream_with_length(reqwest::Body::wrap_stream(body), total)
            .file_name(request.file_name)
            .mime_str(&request.mime)
            .map_err(|e| PinError::Malformed(format!("invalid MIME type: {e}")))
    }
}

#[async_trait]
impl PinningService for PinataClient {
    #[instrument(skip(self, request, progress), fields(file = %request.file_name, size = request.size()))]
    async fn pin(
        &self,
        request: PinRequest,
        progress: watch::Sender<TransferProgress>,
    ) -> Result<ContentId, PinError> {
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or(PinError::NoCredentials)?;
        let size = request.size();

        let form = Form::new().part("file", self.file_part(request, progress)?);
        let response = credentials
            .apply(self.http.post(&self.config.endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Pinning request failed");
                PinError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            return Err(PinError::TooLarge { size });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(&body);
            warn!(status = status.as_u16(), %message, "Pinning service rejected upload");
            return Err(PinError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: PinResponse = response
            .json()
            .await
            .map_err(|e| PinError::Malformed(e.to_string()))?;
        if parsed.ipfs_hash.is_empty() {
            return Err(PinError::Malformed("empty IpfsHash".into()));
        }

        info!(cid = %parsed.ipfs_hash, "File pinned");
        Ok(ContentId::new(parsed.ipfs_hash))
    }
}

fn split_chunks(bytes: &Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    (0..bytes.len())
        .step_by(chunk_size)
        .map(|start| bytes.slice(start..(start + chunk_size).min(bytes.len())))
        .collect()
}

/// Pinata errors come as `{"error": "..."}` or `{"error": {"reason", "details"}}`.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };
    let error = &value["error"];
    if let Some(text) = error.as_str() {
        return text.to_string();
    }
    match (error["reason"].as_str(), error["details"].as_str()) {
        (Some(reason), Some(details)) => format!("{reason}: {details}"),
        (Some(reason), None) => reason.to_string(),
        _ => {
            debug!(%body, "Unrecognised pinning error body");
            body.trim().to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_preferred_over_keys() {
        let creds = PinataCredentials::from_parts(
            Some("jwt".into()),
            Some("key".into()),
            Some("secret".into()),
        );
        assert_eq!(creds, Some(PinataCredentials::Jwt("jwt".into())));
    }

    #[test]
    fn test_key_pair_needs_both_halves() {
        assert_eq!(
            PinataCredentials::from_parts(Some("  ".into()), Some("key".into()), None),
            None
        );
        assert_eq!(
            PinataCredentials::from_parts(None, Some("key".into()), Some("secret".into())),
            Some(PinataCredentials::KeyPair {
                api_key: "key".into(),
                secret: "secret".into()
            })
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let jwt = format!("{:?}", PinataCredentials::Jwt("eyJsecret".into()));
        assert!(!jwt.contains("eyJsecret"));
        let pair = format!(
            "{:?}",
            PinataCredentials::KeyPair {
                api_key: "k".into(),
                secret: "hunter2".into()
            }
        );
        assert!(!pair.contains("hunter2"));
    }

    #[test]
    fn test_split_chunks_covers_body() {
        let bytes = Bytes::from(vec![7u8; 150]);
        let chunks = split_chunks(&bytes, 64);
        assert_eq!(
            chunks.iter().map(Bytes::len).collect::<Vec<_>>(),
            vec![64, 64, 22]
        );
        assert!(split_chunks(&Bytes::new(), 64).is_empty());
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message(r#"{"error":"Invalid API key"}"#), "Invalid API key");
        assert_eq!(
            error_message(r#"{"error":{"reason":"KEYS_MUST_BE_STRINGS","details":"bad"}}"#),
            "KEYS_MUST_BE_STRINGS: bad"
        );
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[tokio::test]
    async fn test_missing_credentials_makes_no_request() {
        let client = PinataClient::new(PinataConfig::default().with_endpoint("http://127.0.0.1:1")).unwrap();
        let (tx, _rx) = watch::channel(TransferProgress::default());
        let err = client
            .pin(PinRequest::new("a.txt", "text/plain", Bytes::from_static(b"hi")), tx)
            .await
            .unwrap_err();
        assert_eq!(err, PinError::NoCredentials);
    }
}
