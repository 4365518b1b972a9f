//! Registry contract boundary.
//!
//! The ledger contract is authoritative for both the pointer lists and the
//! access grants. Implementations translate calls one-to-one; they do not
//! pre-check ownership or access, the contract does that.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::capability::CapabilityEntry;
use crate::error::{ContractError, DriveError};
use crate::identity::{Address, Identity};

/// Hash of a submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash(0x{}…)", hex::encode(&self.0[..4]))
    }
}

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx: TxHash,
    pub success: bool,
    pub block_number: Option<u64>,
}

/// The registry contract, bound to one signer.
///
/// Write methods return once the transaction is submitted; callers wait for
/// inclusion through [`RegistryContract::confirm`]. Reads are plain calls
/// made as the bound signer.
#[async_trait]
pub trait RegistryContract: Send + Sync {
    /// `add(owner, pointer)`.
    async fn add(&self, owner: Address, pointer: &str) -> Result<TxHash, ContractError>;

    /// `allow(grantee)`.
    async fn allow(&self, grantee: Address) -> Result<TxHash, ContractError>;

    /// `disallow(grantee)`.
    async fn disallow(&self, grantee: Address) -> Result<TxHash, ContractError>;

    /// `display(owner)`; reverts when the signer has no read access.
    async fn display(&self, owner: Address) -> Result<Vec<String>, ContractError>;

    /// `shareAccess()`: grants made by the signer, in registry order.
    async fn share_access(&self) -> Result<Vec<CapabilityEntry>, ContractError>;

    /// Wait for `tx` to be mined.
    async fn confirm(&self, tx: TxHash) -> Result<TxReceipt, ContractError>;
}

/// Produces a contract handle whose writes are signed by `signer`.
pub trait ContractBinder: Send + Sync {
    fn bind(&self, contract: Address, signer: &Identity) -> Arc<dyn RegistryContract>;
}

/// Resolves human-readable names (`alice.eth`) to addresses.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// `Ok(None)` when the name has no record.
    async fn resolve(&self, name: &str) -> Result<Option<Address>, DriveError>;
}
