//! Staleness tracking for async results.
//!
//! There is no cancel primitive for in-flight ledger or storage calls. Two
//! tokens stand in for it:
//!
//! - [`SessionEpoch`] identifies one identity binding. Results computed for
//!   an older epoch must not be applied after an account or network switch.
//! - [`Liveness`] is held by a view; once torn down, late results are dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Identifier of one session binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SessionEpoch(pub u64);

/// Monotonic source of [`SessionEpoch`] values.
#[derive(Debug, Default)]
pub struct EpochCounter(AtomicU64);

impl EpochCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SessionEpoch {
        SessionEpoch(self.0.load(Ordering::SeqCst))
    }

    /// Invalidate the current binding and return the new epoch.
    pub fn advance(&self) -> SessionEpoch {
        SessionEpoch(self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, epoch: SessionEpoch) -> bool {
        self.current() == epoch
    }
}

/// Shared alive flag for a view that may be torn down while work is in flight.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Mark the owning view as gone. Idempotent.
    pub fn teardown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}
