//! # BlockShare Session
//!
//! Wallet connection and network negotiation.
//!
//! ```text
//! Disconnected -> Connecting -> Connected <-> NetworkMismatch
//!                     |
//!                     +-> ConnectFailed (retryable)
//! ```
//!
//! The negotiator binds an [`Identity`](blockshare_core::Identity) and its
//! registry gateway, keeps them consistent with provider events, and brings
//! the provider onto the required network before ledger mutations.
//!
//! ## Example
//!
//! ```ignore
//! let session = SessionNegotiator::new(Some(provider), NetworkDescriptor::hardhat_local(), factory);
//! if session.restore_silent().await?.is_none() {
//!     session.connect().await?;
//! }
//! let gateway = session.gateway().ok_or(DriveError::NotConfigured)?;
//! ```

mod listener;
pub mod negotiator;
pub mod reconcile;
pub mod state;

pub use negotiator::SessionNegotiator;
pub use reconcile::Reconciled;
pub use state::{SessionEvent, SessionState};
