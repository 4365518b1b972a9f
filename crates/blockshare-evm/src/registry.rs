//! [`RegistryContract`] over a JSON-RPC node.

use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::{Address as EvmAddress, B256};
use alloy::providers::Provider;
use alloy::transports::http::{Client, Http};
use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, instrument};

use blockshare_core::{Address, CapabilityEntry, ContractError, RegistryContract, TxHash, TxReceipt};

use crate::contract::Upload::{self, UploadInstance};
use crate::error::classify;

pub type HttpTransport = Http<Client>;

pub(crate) fn to_evm(address: Address) -> EvmAddress {
    EvmAddress::from(*address.as_bytes())
}

pub(crate) fn from_evm(address: EvmAddress) -> Address {
    Address::from_bytes(address.into_array())
}

/// How long to wait for a transaction to be mined.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

/// The `Upload` contract bound to a wallet-filled provider.
///
/// Writes are signed by the provider's wallet; reads are sent with `from`
/// set to `signer` so `msg.sender` checks in `display` see the same account.
pub struct EvmRegistry<P> {
    contract: UploadInstance<HttpTransport, P>,
    provider: P,
    signer: EvmAddress,
    confirm: ConfirmPolicy,
}

impl<P> EvmRegistry<P>
where
    P: Provider<HttpTransport> + Clone + 'static,
{
    pub fn new(contract: Address, provider: P, signer: Address) -> Self {
        Self {
            contract: Upload::new(to_evm(contract), provider.clone()),
            provider,
            signer: to_evm(signer),
            confirm: ConfirmPolicy::default(),
        }
    }

    pub fn with_confirm_policy(mut self, confirm: ConfirmPolicy) -> Self {
        self.confirm = confirm;
        self
    }
}

#[async_trait]
impl<P> RegistryContract for EvmRegistry<P>
where
    P: Provider<HttpTransport> + Clone + Send + Sync + 'static,
{
    #[instrument(skip(self))]
    async fn add(&self, owner: Address, pointer: &str) -> Result<TxHash, ContractError> {
        let pending = self
            .contract
            .add(to_evm(owner), pointer.to_string())
            .send()
            .await
            .map_err(classify)?;
        Ok(TxHash(pending.tx_hash().0))
    }

    #[instrument(skip(self))]
    async fn allow(&self, grantee: Address) -> Result<TxHash, ContractError> {
        let pending = self
            .contract
            .allow(to_evm(grantee))
            .send()
            .await
            .map_err(classify)?;
        Ok(TxHash(pending.tx_hash().0))
    }

    #[instrument(skip(self))]
    async fn disallow(&self, grantee: Address) -> Result<TxHash, ContractError> {
        let pending = self
            .contract
            .disallow(to_evm(grantee))
            .send()
            .await
            .map_err(classify)?;
        Ok(TxHash(pending.tx_hash().0))
    }

    async fn display(&self, owner: Address) -> Result<Vec<String>, ContractError> {
        let result = self
            .contract
            .display(to_evm(owner))
            .from(self.signer)
            .call()
            .await
            .map_err(classify)?;
        Ok(result._0)
    }

    async fn share_access(&self) -> Result<Vec<CapabilityEntry>, ContractError> {
        let result = self
            .contract
            .shareAccess()
            .from(self.signer)
            .call()
            .await
            .map_err(classify)?;
        Ok(result
            ._0
            .into_iter()
            .map(|entry| CapabilityEntry {
                grantee: from_evm(entry.user),
                active: entry.access,
            })
            .collect())
    }

    #[instrument(skip(self), fields(tx = %tx))]
    async fn confirm(&self, tx: TxHash) -> Result<TxReceipt, ContractError> {
        let hash = B256::from(tx.0);
        let deadline = Instant::now() + self.confirm.timeout;
        loop {
            if let Some(receipt) = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .map_err(classify)?
            {
                debug!(success = receipt.status(), "Transaction mined");
                return Ok(TxReceipt {
                    tx,
                    success: receipt.status(),
                    block_number: receipt.block_number(),
                });
            }
            if Instant::now() >= deadline {
                return Err(ContractError::Transport(format!(
                    "transaction {tx} not mined within {:?}",
                    self.confirm.timeout
                )));
            }
            tokio::time::sleep(self.confirm.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_conversion_roundtrip() {
        let addr = Address::parse("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap();
        let evm = to_evm(addr);
        assert_eq!(
            evm.to_string().to_lowercase(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
        assert_eq!(from_evm(evm), addr);
    }
}
