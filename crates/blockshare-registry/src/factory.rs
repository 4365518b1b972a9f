//! Gateway construction and contract address resolution.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use blockshare_core::{
    Address, CONTRACT_ADDRESS_KEY, ClientStore, ContractBinder, Identity, NameResolver,
};

use crate::gateway::RegistryGateway;

/// Pick the registry contract address.
///
/// A configured value wins if it is a well-formed address; otherwise the
/// value persisted under `contractAddress` is used. `None` means the
/// registry features stay unavailable until an address is set.
pub fn resolve_contract_address(
    configured: Option<&str>,
    store: &dyn ClientStore,
) -> Option<Address> {
    if let Some(raw) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        match Address::parse(raw) {
            Ok(address) => {
                debug!(contract = %address, "Using configured contract address");
                return Some(address);
            }
            Err(_) => warn!(value = raw, "Ignoring malformed configured contract address"),
        }
    }

    match store.get(CONTRACT_ADDRESS_KEY) {
        Ok(Some(raw)) => match Address::parse(&raw) {
            Ok(address) => {
                debug!(contract = %address, "Using persisted contract address");
                Some(address)
            }
            Err(_) => {
                warn!(value = %raw, "Ignoring malformed persisted contract address");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Could not read persisted contract address");
            None
        }
    }
}

/// Builds a [`RegistryGateway`] for each new identity binding.
pub struct GatewayFactory {
    contract: RwLock<Option<Address>>,
    binder: Arc<dyn ContractBinder>,
    resolver: Option<Arc<dyn NameResolver>>,
}

impl GatewayFactory {
    pub fn new(contract: Option<Address>, binder: Arc<dyn ContractBinder>) -> Self {
        Self {
            contract: RwLock::new(contract),
            binder,
            resolver: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn contract_address(&self) -> Option<Address> {
        *self.contract.read()
    }

    /// Replace the contract address; takes effect on the next [`Self::build`].
    pub fn set_contract_address(&self, contract: Option<Address>) {
        *self.contract.write() = contract;
    }

    /// `None` while no contract address is known.
    pub fn build(&self, identity: &Identity) -> Option<RegistryGateway> {
        let contract = self.contract_address()?;
        let bound = self.binder.bind(contract, identity);
        debug!(
            contract = %contract.short(),
            signer = %identity.address.short(),
            epoch = identity.epoch.0,
            "Registry gateway bound"
        );
        Some(RegistryGateway::new(
            bound,
            contract,
            *identity,
            self.resolver.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockshare_core::testing::{InMemoryLedger, test_address};
    use blockshare_core::{ChainId, MemoryClientStore, SessionEpoch};

    #[test]
    fn test_configured_address_wins() {
        let store = MemoryClientStore::new();
        store
            .set(CONTRACT_ADDRESS_KEY, &test_address(2).to_hex())
            .unwrap();
        let configured = test_address(1).to_hex();
        assert_eq!(
            resolve_contract_address(Some(&configured), &store),
            Some(test_address(1))
        );
    }

    #[test]
    fn test_malformed_config_falls_back_to_persisted() {
        let store = MemoryClientStore::new();
        store
            .set(CONTRACT_ADDRESS_KEY, &test_address(2).to_hex())
            .unwrap();
        assert_eq!(
            resolve_contract_address(Some("0xnot-an-address"), &store),
            Some(test_address(2))
        );
    }

    #[test]
    fn test_absent_everywhere() {
        let store = MemoryClientStore::new();
        assert_eq!(resolve_contract_address(None, &store), None);
        store.set(CONTRACT_ADDRESS_KEY, "garbage").unwrap();
        assert_eq!(resolve_contract_address(Some(""), &store), None);
    }

    #[test]
    fn test_factory_needs_contract() {
        let ledger = InMemoryLedger::new();
        let binder = ledger.binder();
        let factory = GatewayFactory::new(None, binder.clone());
        let identity = Identity::new(test_address(0xa1), ChainId(31337), SessionEpoch(3));

        assert!(factory.build(&identity).is_none());

        factory.set_contract_address(Some(test_address(0xcc)));
        let gateway = factory.build(&identity).unwrap();
        assert_eq!(gateway.owner(), test_address(0xa1));
        assert_eq!(gateway.epoch(), SessionEpoch(3));
        assert_eq!(binder.bindings(), vec![(test_address(0xcc), test_address(0xa1))]);
    }
}
