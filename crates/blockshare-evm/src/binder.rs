//! Binds the `Upload` contract to the local wallet.

use std::sync::Arc;

use alloy::providers::ProviderBuilder;
use tracing::{debug, warn};

use blockshare_core::{Address, ContractBinder, Identity, RegistryContract};

use crate::registry::{ConfirmPolicy, EvmRegistry};
use crate::wallet::SharedWallet;

/// [`ContractBinder`] producing [`EvmRegistry`] handles signed by a
/// [`LocalWalletProvider`](crate::LocalWalletProvider).
///
/// Each bind reads the wallet's active chain endpoint, so a rebind after a
/// network switch talks to the new node.
pub struct EvmBinder {
    wallet: SharedWallet,
    confirm: ConfirmPolicy,
}

impl EvmBinder {
    pub fn new(wallet: SharedWallet) -> Self {
        Self {
            wallet,
            confirm: ConfirmPolicy::default(),
        }
    }

    pub fn with_confirm_policy(mut self, confirm: ConfirmPolicy) -> Self {
        self.confirm = confirm;
        self
    }
}

impl ContractBinder for EvmBinder {
    fn bind(&self, contract: Address, signer: &Identity) -> Arc<dyn RegistryContract> {
        if signer.address != self.wallet.address() {
            warn!(
                signer = %signer.address,
                wallet = %self.wallet.address(),
                "Binding for an account the local key does not control"
            );
        }
        let url = self.wallet.rpc_url();
        debug!(contract = %contract, %url, "Binding registry contract");

        let provider = ProviderBuilder::new()
            .with_recommended_fillers()
            .wallet(self.wallet.wallet())
            .on_http(url);
        Arc::new(EvmRegistry::new(contract, provider, signer.address).with_confirm_policy(self.confirm))
    }
}
