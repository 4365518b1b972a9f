//! Errors raised by the account backend client.

use thiserror::Error;

use blockshare_core::{DriveError, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Input failed client-side checks; nothing was sent.
    #[error("{0}")]
    Invalid(String),

    /// The backend answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Cannot connect to server: {0}")]
    Unreachable(String),

    #[error("unexpected response from auth backend: {0}")]
    Malformed(String),

    #[error("not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// HTTP status reported by the backend, if it answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<AuthError> for DriveError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::Rejected { status, .. } if status == 401 || status == 403 => {
                DriveError::AuthFailed { status }
            }
            AuthError::Rejected { status: 429, .. } => DriveError::RateLimited,
            AuthError::Unreachable(reason) => DriveError::NetworkUnreachable { reason },
            AuthError::NotLoggedIn => DriveError::AuthFailed { status: 401 },
            AuthError::Store(e) => e.into(),
            other => DriveError::Unknown(other.to_string()),
        }
    }
}
