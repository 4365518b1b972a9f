//! Pinning service and client-state boundaries.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::watch;

use crate::error::{PinError, StoreError};
use crate::pointer::ContentId;

/// Persisted key for the registry contract address.
pub const CONTRACT_ADDRESS_KEY: &str = "contractAddress";
/// Persisted key for the auth backend token.
pub const USER_TOKEN_KEY: &str = "userToken";
pub const USER_EMAIL_KEY: &str = "userEmail";
pub const USER_ID_KEY: &str = "userId";
pub const USERNAME_KEY: &str = "username";

/// One file to pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRequest {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl PinRequest {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Bytes sent so far out of the total body size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    pub sent: u64,
    pub total: u64,
}

impl TransferProgress {
    pub fn new(sent: u64, total: u64) -> Self {
        Self { sent, total }
    }

    /// Percent complete in `[0, 100]`. An empty body counts as complete.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = self.sent.min(self.total).saturating_mul(100) / self.total;
        pct as u8
    }
}

/// Content-addressed pinning backend.
#[async_trait]
pub trait PinningService: Send + Sync {
    /// Upload `request` and return its content identifier.
    ///
    /// Byte-level progress is published on `progress` as the body is sent.
    async fn pin(
        &self,
        request: PinRequest,
        progress: watch::Sender<TransferProgress>,
    ) -> Result<ContentId, PinError>;
}

/// Flat, durable key/value client state.
///
/// Values are plain strings with no schema versioning.
pub trait ClientStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-local [`ClientStore`].
#[derive(Debug, Default)]
pub struct MemoryClientStore {
    entries: DashMap<String, String>,
}

impl MemoryClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ClientStore for MemoryClientStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}
