//! Session context injection
//!
//! Thread-local storage for the connected identity, so every span opened
//! while a [`SessionContextGuard`] is alive can be tagged with the account
//! and session epoch it belongs to.

use std::cell::RefCell;

use blockshare_core::Identity;

/// Session context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContextData {
    /// Abbreviated account address
    pub account: String,
    pub chain_id: u64,
    pub epoch: u64,
}

impl From<&Identity> for SessionContextData {
    fn from(identity: &Identity) -> Self {
        Self {
            account: identity.address.short(),
            chain_id: identity.chain_id.0,
            epoch: identity.epoch.0,
        }
    }
}

thread_local! {
    static SESSION_CONTEXT: RefCell<Option<SessionContextData>> = const { RefCell::new(None) };
}

/// RAII guard for session context
///
/// Sets the context for the current thread; restores the previous one on drop.
///
/// ```ignore
/// let _guard = SessionContextGuard::new(&identity);
/// tracing::info!("Uploading");
/// ```
pub struct SessionContextGuard {
    previous: Option<SessionContextData>,
}

impl SessionContextGuard {
    pub fn new(identity: &Identity) -> Self {
        Self::with_data(SessionContextData::from(identity))
    }

    pub fn with_data(data: SessionContextData) -> Self {
        let previous = SESSION_CONTEXT.with(|ctx| ctx.replace(Some(data)));
        Self { previous }
    }

    /// Get the current session context (if any)
    pub fn current() -> Option<SessionContextData> {
        SESSION_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_account() -> Option<String> {
        Self::current().map(|ctx| ctx.account)
    }
}

impl Drop for SessionContextGuard {
    fn drop(&mut self) {
        SESSION_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run `$body` with the session context set to `$identity`.
#[macro_export]
macro_rules! with_session_context {
    ($identity:expr, $body:block) => {{
        let _guard = $crate::context::SessionContextGuard::new($identity);
        $body
    }};
}
