//! Storage pointers recorded in the registry.
//!
//! A pointer is `<scheme>://<content id>`. The scheme tells a resolver which
//! backend can dereference the identifier; the only one produced here is
//! `ipfs`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Scheme marker for content pinned to IPFS.
pub const IPFS_SCHEME: &str = "ipfs://";

/// Content identifier returned by a pinning service (e.g. `QmYwAP...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(cid: impl Into<String>) -> Self {
        Self(cid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// CID derived from raw bytes, for in-memory pinning doubles.
    pub fn digest_of(data: &[u8]) -> Self {
        Self(format!("bafk{}", blake3::hash(data).to_hex()))
    }
}

/// A registry entry referencing off-chain content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pointer(String);

impl Pointer {
    /// Pointer for content pinned to IPFS.
    pub fn ipfs(cid: &ContentId) -> Self {
        Self(format!("{IPFS_SCHEME}{}", cid.as_str()))
    }

    /// Wrap a raw registry string. No validation: the registry may hold
    /// anything a previous client wrote.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme including `://`, if the pointer has one.
    pub fn scheme(&self) -> Option<&str> {
        self.0.find("://").map(|idx| &self.0[..idx + 3])
    }

    /// The content identifier with any scheme marker removed.
    ///
    /// Pointers written without a scheme are taken to be a bare identifier.
    pub fn content_id(&self) -> &str {
        match self.0.find("://") {
            Some(idx) => self.0[idx + 3..].trim_start_matches('/'),
            None => &self.0,
        }
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
