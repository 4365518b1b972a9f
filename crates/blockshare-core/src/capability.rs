//! Read-access grants tracked by the registry.

use serde::{Deserialize, Serialize};

use crate::identity::Address;

/// One grant of read access from the connected owner to `grantee`.
///
/// The registry keeps revoked grants with `active = false`; they are part of
/// the grant history and must be shown, not filtered out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub grantee: Address,
    pub active: bool,
}

impl CapabilityEntry {
    pub fn active(grantee: Address) -> Self {
        Self {
            grantee,
            active: true,
        }
    }

    pub fn revoked(grantee: Address) -> Self {
        Self {
            grantee,
            active: false,
        }
    }

    /// Status label for list rendering.
    pub fn status_label(&self) -> &'static str {
        if self.active { "active" } else { "revoked" }
    }
}
