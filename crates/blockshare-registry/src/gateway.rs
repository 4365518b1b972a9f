//! Typed façade over the registry contract.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use blockshare_core::{
    Address, CapabilityEntry, ContractError, DriveError, DriveResult, Identity, NameResolver,
    Pointer, RegistryContract, SessionEpoch, TxHash, TxReceipt,
};

/// Registry operations bound to one connected identity.
///
/// A gateway is only ever built from a connected session and a validated
/// contract address; it is rebuilt on every identity change. Cloning is
/// cheap.
#[derive(Clone)]
pub struct RegistryGateway {
    contract: Arc<dyn RegistryContract>,
    contract_address: Address,
    identity: Identity,
    resolver: Option<Arc<dyn NameResolver>>,
}

impl std::fmt::Debug for RegistryGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryGateway")
            .field("contract_address", &self.contract_address)
            .field("identity", &self.identity)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl RegistryGateway {
    pub fn new(
        contract: Arc<dyn RegistryContract>,
        contract_address: Address,
        identity: Identity,
        resolver: Option<Arc<dyn NameResolver>>,
    ) -> Self {
        Self {
            contract,
            contract_address,
            identity,
            resolver,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The connected signer; every pointer is registered under this owner.
    pub fn owner(&self) -> Address {
        self.identity.address
    }

    pub fn epoch(&self) -> SessionEpoch {
        self.identity.epoch
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Append `pointer` to the signer's own list and wait for inclusion.
    #[instrument(skip(self, pointer), fields(owner = %self.owner().short(), pointer = %pointer))]
    pub async fn register_pointer(&self, pointer: &Pointer) -> DriveResult<TxReceipt> {
        let tx = self
            .contract
            .add(self.owner(), pointer.as_str())
            .await
            .map_err(write_error)?;
        let receipt = self.confirm(tx).await?;
        info!(tx = %receipt.tx, "Pointer registered");
        Ok(receipt)
    }

    /// Pointers stored for `owner`, in registry order.
    ///
    /// A revert means the signer has no read grant and is reported as
    /// [`DriveError::AccessDenied`]; an owner with nothing stored yields an
    /// empty list.
    #[instrument(skip(self), fields(owner = %owner.short()))]
    pub async fn list_pointers(&self, owner: Address) -> DriveResult<Vec<Pointer>> {
        match self.contract.display(owner).await {
            Ok(raw) => {
                debug!(count = raw.len(), "Pointers listed");
                Ok(raw.into_iter().map(Pointer::from_raw).collect())
            }
            Err(ContractError::Reverted(reason)) => {
                debug!(%reason, "Display reverted");
                Err(DriveError::AccessDenied { owner })
            }
            Err(e) => Err(read_error(e)),
        }
    }

    /// Grant read access to `grantee` (an address or a resolvable name).
    ///
    /// Empty input is rejected before any network call.
    #[instrument(skip(self))]
    pub async fn grant_access(&self, grantee: &str) -> DriveResult<Address> {
        let grantee = self.resolve_grantee(grantee).await?;
        let tx = self.contract.allow(grantee).await.map_err(write_error)?;
        self.confirm(tx).await?;
        info!(grantee = %grantee.short(), "Access granted");
        Ok(grantee)
    }

    /// Revoke a previous grant. The registry keeps the entry as inactive.
    #[instrument(skip(self))]
    pub async fn revoke_access(&self, grantee: &str) -> DriveResult<Address> {
        let grantee = self.resolve_grantee(grantee).await?;
        let tx = self.contract.disallow(grantee).await.map_err(write_error)?;
        self.confirm(tx).await?;
        info!(grantee = %grantee.short(), "Access revoked");
        Ok(grantee)
    }

    /// Grants made by the signer, active and revoked, in registry order.
    #[instrument(skip(self))]
    pub async fn list_capabilities(&self) -> DriveResult<Vec<CapabilityEntry>> {
        self.contract.share_access().await.map_err(read_error)
    }

    /// Turn user input into an address.
    ///
    /// Names are only looked up when the input contains a `.` and a resolver
    /// is configured; everything else must be a well-formed hex address.
    pub async fn resolve_grantee(&self, input: &str) -> DriveResult<Address> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DriveError::invalid_address(input));
        }

        if trimmed.contains('.') {
            if let Some(resolver) = &self.resolver {
                return match resolver.resolve(trimmed).await? {
                    Some(address) => {
                        debug!(name = trimmed, address = %address.short(), "Name resolved");
                        Ok(address)
                    }
                    None => Err(DriveError::invalid_address(input)),
                };
            }
        }

        Address::parse(trimmed)
    }

    async fn confirm(&self, tx: TxHash) -> DriveResult<TxReceipt> {
        let receipt = self.contract.confirm(tx).await.map_err(write_error)?;
        if !receipt.success {
            warn!(%tx, "Transaction failed on chain");
            return Err(DriveError::RegistryWriteRejected {
                reason: format!("transaction {tx} failed"),
            });
        }
        Ok(receipt)
    }
}

fn write_error(e: ContractError) -> DriveError {
    match e {
        ContractError::UserRejected => DriveError::UserRejected,
        ContractError::Reverted(reason) => DriveError::RegistryWriteRejected { reason },
        ContractError::Failed { tx } => DriveError::RegistryWriteRejected {
            reason: format!("transaction {tx} failed"),
        },
        other => read_error(other),
    }
}

fn read_error(e: ContractError) -> DriveError {
    match e {
        ContractError::UserRejected => DriveError::UserRejected,
        ContractError::Transport(reason) => DriveError::NetworkUnreachable { reason },
        ContractError::Reverted(reason) => DriveError::ContractRejected { reason },
        other => DriveError::Unknown(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockshare_core::testing::{InMemoryLedger, LedgerCall, test_address};
    use blockshare_core::{ChainId, ErrorKind};

    fn gateway(ledger: &InMemoryLedger, signer: Address) -> RegistryGateway {
        RegistryGateway::new(
            Arc::new(ledger.registry_for(signer)),
            test_address(0xcc),
            Identity::new(signer, ChainId(31337), SessionEpoch(1)),
            None,
        )
    }

    #[tokio::test]
    async fn test_register_then_list() {
        let ledger = InMemoryLedger::new();
        let alice = test_address(0xa1);
        let gw = gateway(&ledger, alice);

        gw.register_pointer(&Pointer::from_raw("ipfs://Qm1"))
            .await
            .unwrap();
        let pointers = gw.list_pointers(alice).await.unwrap();
        assert_eq!(pointers, vec![Pointer::from_raw("ipfs://Qm1")]);
    }

    #[tokio::test]
    async fn test_empty_list_is_not_denied() {
        let ledger = InMemoryLedger::new();
        let alice = test_address(0xa1);
        let pointers = gateway(&ledger, alice).list_pointers(alice).await.unwrap();
        assert!(pointers.is_empty());
    }

    #[tokio::test]
    async fn test_revert_maps_to_access_denied() {
        let ledger = InMemoryLedger::new();
        let alice = test_address(0xa1);
        let bob = test_address(0xb0);
        ledger.seed(alice, &["ipfs://secret"]);

        let err = gateway(&ledger, bob).list_pointers(alice).await.unwrap_err();
        assert_eq!(err, DriveError::AccessDenied { owner: alice });
    }

    #[tokio::test]
    async fn test_empty_grantee_makes_no_calls() {
        let ledger = InMemoryLedger::new();
        let gw = gateway(&ledger, test_address(0xa1));

        let err = gw.grant_access("").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        let err = gw.revoke_access("   ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAddress);
        assert_eq!(ledger.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_receipt_is_write_rejected() {
        let ledger = InMemoryLedger::new();
        let gw = gateway(&ledger, test_address(0xa1));
        ledger.fail_next_receipt();

        let err = gw
            .register_pointer(&Pointer::from_raw("ipfs://Qm1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RegistryWriteRejected);
    }

    #[tokio::test]
    async fn test_signer_rejection_passes_through() {
        let ledger = InMemoryLedger::new();
        let gw = gateway(&ledger, test_address(0xa1));
        ledger.fail_next(LedgerCall::Allow, ContractError::UserRejected);

        let err = gw.grant_access(&test_address(0xb0).to_hex()).await.unwrap_err();
        assert_eq!(err, DriveError::UserRejected);
        assert_eq!(ledger.calls(LedgerCall::Confirm), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_is_unreachable() {
        let ledger = InMemoryLedger::new();
        let gw = gateway(&ledger, test_address(0xa1));
        ledger.fail_next(
            LedgerCall::ShareAccess,
            ContractError::Transport("connection refused".into()),
        );

        let err = gw.list_capabilities().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkUnreachable);
    }
}
