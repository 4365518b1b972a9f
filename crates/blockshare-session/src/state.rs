//! Session states and the events published on transitions.

use blockshare_core::{Address, ChainId, DriveError, Identity};

/// Where the negotiator currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(Identity),
    /// Bound, but the provider is on another network. Reads still work;
    /// mutations go through `ensure_network` first.
    NetworkMismatch {
        identity: Identity,
        required: ChainId,
    },
    /// The last connect attempt failed. The user may retry.
    ConnectFailed(DriveError),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Connected(identity) | Self::NetworkMismatch { identity, .. } => Some(identity),
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected(_) => "connected",
            Self::NetworkMismatch { .. } => "network-mismatch",
            Self::ConnectFailed(_) => "connect-failed",
        }
    }
}

/// Typed transitions re-published from provider events and session calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// The bound account changed; `None` once cleared.
    AccountChanged(Option<Address>),
    /// Something the user can fix in the wallet without retyping anything.
    Hint(String),
    /// The network changed and the session is being rebuilt.
    Reloading,
    Disconnected,
}
