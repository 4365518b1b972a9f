//! Error types for BlockShare
//!
//! Every boundary (provider, contract, pinning service, client store) has its
//! own error type. Each of them converts into [`DriveError`], the only error
//! that crosses a component boundary towards presentation.

use thiserror::Error;

use crate::identity::Address;
use crate::provider::{REQUEST_PENDING, UNRECOGNIZED_CHAIN, USER_REJECTED};

/// Coarse classification of a [`DriveError`], used to pick an actionable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UserRejected,
    RequestAlreadyPending,
    ProviderUnavailable,
    InvalidAddress,
    AccessDenied,
    RegistryWriteRejected,
    NoCredentials,
    AuthFailed,
    RateLimited,
    PayloadTooLarge,
    NetworkUnreachable,
    ContractRejected,
    NotConnected,
    NotConfigured,
    Stale,
    Unknown,
}

/// Top-level error surfaced to callers of the drive.
///
/// Nothing here is fatal: every variant describes a state the user can
/// retry out of.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriveError {
    #[error("Request rejected in the wallet")]
    UserRejected,

    #[error("A wallet request is already pending; open the wallet and approve it")]
    RequestAlreadyPending,

    #[error("No signing provider found; install a wallet extension")]
    ProviderUnavailable,

    #[error("Invalid address: {input:?}")]
    InvalidAddress { input: String },

    #[error("You don't have access to the files of {owner}")]
    AccessDenied { owner: Address },

    #[error("Registry rejected the write: {reason}")]
    RegistryWriteRejected { reason: String },

    #[error("Pinning credentials are missing; set a JWT or an API key and secret")]
    NoCredentials,

    #[error("Pinning service authentication failed (HTTP {status}); verify the JWT or key/secret")]
    AuthFailed { status: u16 },

    #[error("Rate limited by the pinning service; wait and try again")]
    RateLimited,

    #[error("File of {size} bytes is too large for the pinning service")]
    PayloadTooLarge { size: u64 },

    #[error("Network unreachable: {reason}")]
    NetworkUnreachable { reason: String },

    #[error("Contract rejected the request: {reason}")]
    ContractRejected { reason: String },

    #[error("Wallet not connected")]
    NotConnected,

    #[error("Registry contract not configured; set a contract address and reconnect")]
    NotConfigured,

    #[error("Result belongs to a session that is no longer active")]
    Stale,

    #[error("{0}")]
    Unknown(String),
}

impl DriveError {
    /// The taxonomy bucket this error falls into.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserRejected => ErrorKind::UserRejected,
            Self::RequestAlreadyPending => ErrorKind::RequestAlreadyPending,
            Self::ProviderUnavailable => ErrorKind::ProviderUnavailable,
            Self::InvalidAddress { .. } => ErrorKind::InvalidAddress,
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::RegistryWriteRejected { .. } => ErrorKind::RegistryWriteRejected,
            Self::NoCredentials => ErrorKind::NoCredentials,
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::RateLimited => ErrorKind::RateLimited,
            Self::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            Self::NetworkUnreachable { .. } => ErrorKind::NetworkUnreachable,
            Self::ContractRejected { .. } => ErrorKind::ContractRejected,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::NotConfigured => ErrorKind::NotConfigured,
            Self::Stale => ErrorKind::Stale,
            Self::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// Whether the user can resolve this from the wallet UI without changing input.
    pub fn is_hint(&self) -> bool {
        matches!(self, Self::RequestAlreadyPending)
    }

    pub fn invalid_address(input: impl Into<String>) -> Self {
        Self::InvalidAddress {
            input: input.into(),
        }
    }
}

/// Error returned by a signing provider, mirroring EIP-1193 `{ code, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn user_rejected() -> Self {
        Self::new(USER_REJECTED, "User rejected the request.")
    }

    pub fn request_pending(method: &str) -> Self {
        Self::new(
            REQUEST_PENDING,
            format!("Request of type '{method}' already pending. Please wait."),
        )
    }

    pub fn unrecognized_chain(chain_hex: &str) -> Self {
        Self::new(
            UNRECOGNIZED_CHAIN,
            format!("Unrecognized chain ID \"{chain_hex}\". Try adding the chain first."),
        )
    }

    pub fn is_user_rejected(&self) -> bool {
        self.code == USER_REJECTED
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code == UNRECOGNIZED_CHAIN
    }

    /// Some wallets report the pending condition only in the message text.
    pub fn is_request_pending(&self) -> bool {
        self.code == REQUEST_PENDING || self.message.contains("already pending")
    }
}

impl From<ProviderError> for DriveError {
    fn from(e: ProviderError) -> Self {
        if e.is_user_rejected() {
            DriveError::UserRejected
        } else if e.is_request_pending() {
            DriveError::RequestAlreadyPending
        } else {
            DriveError::Unknown(e.to_string())
        }
    }
}

/// Errors raised by a registry contract binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("transaction rejected by the signer")]
    UserRejected,

    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error("transaction {tx} failed on chain")]
    Failed { tx: String },

    #[error("rpc transport error: {0}")]
    Transport(String),

    #[error("unexpected contract response: {0}")]
    Decode(String),
}

/// Errors raised by a pinning service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("pinning credentials missing")]
    NoCredentials,

    #[error("pinning service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("file of {size} bytes was refused as too large")]
    TooLarge { size: u64 },

    #[error("could not reach pinning service: {0}")]
    Unreachable(String),

    #[error("unexpected pinning response: {0}")]
    Malformed(String),
}

impl From<PinError> for DriveError {
    fn from(e: PinError) -> Self {
        match e {
            PinError::NoCredentials => DriveError::NoCredentials,
            PinError::Status { status, .. } if status == 401 || status == 403 => {
                DriveError::AuthFailed { status }
            }
            PinError::Status { status: 429, .. } => DriveError::RateLimited,
            PinError::Status { status: 413, .. } => DriveError::PayloadTooLarge { size: 0 },
            PinError::TooLarge { size } => DriveError::PayloadTooLarge { size },
            PinError::Unreachable(reason) => DriveError::NetworkUnreachable { reason },
            PinError::Status { status, message } => {
                DriveError::Unknown(format!("Pinning error {status}: {message}"))
            }
            PinError::Malformed(msg) => DriveError::Unknown(msg),
        }
    }
}

/// Errors raised by durable client storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("client store I/O error: {0}")]
    Io(String),

    #[error("client store entry {key:?} is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<StoreError> for DriveError {
    fn from(e: StoreError) -> Self {
        DriveError::Unknown(e.to_string())
    }
}

pub type DriveResult<T> = Result<T, DriveError>;
