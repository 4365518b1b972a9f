//! Errors for the EVM binding and their classification.

use thiserror::Error;

use blockshare_core::{ContractError, DriveError};

/// Setup failures: bad key material or endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvmError {
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("invalid RPC URL {url:?}: {reason}")]
    InvalidRpcUrl { url: String, reason: String },

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl From<EvmError> for DriveError {
    fn from(e: EvmError) -> Self {
        match e {
            EvmError::Rpc(reason) => DriveError::NetworkUnreachable { reason },
            other => DriveError::Unknown(other.to_string()),
        }
    }
}

/// Sort an RPC or contract error message into a [`ContractError`].
///
/// Nodes and signers report these only as text, so the match is on
/// well-known fragments.
pub fn classify(message: impl ToString) -> ContractError {
    let message = message.to_string();
    let lower = message.to_lowercase();
    if lower.contains("user rejected") || lower.contains("user denied") {
        ContractError::UserRejected
    } else if lower.contains("revert") {
        ContractError::Reverted(revert_reason(&message))
    } else {
        ContractError::Transport(message)
    }
}

/// Pull the `reason` out of `... reverted with reason string 'reason'`.
fn revert_reason(message: &str) -> String {
    for marker in ["reason string '", "reverted: "] {
        if let Some(idx) = message.find(marker) {
            let rest = &message[idx + marker.len()..];
            return rest.trim_end_matches(['\'', '"']).to_string();
        }
    }
    message.to_string()
}
