//! A [`SigningProvider`] backed by a local private key.
//!
//! Stands in for a browser wallet when running headless: it answers the same
//! requests, raises the same error codes, and emits the same events. Each
//! known chain maps to the RPC endpoint used for it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Value, json};
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};

use blockshare_core::{
    Address, ChainId, NetworkDescriptor, ProviderError, ProviderEvent, ProviderRequest,
    SigningProvider,
};

use crate::error::EvmError;
use crate::registry::from_evm;

const EVENT_CAPACITY: usize = 16;
const INVALID_PARAMS: i64 = -32602;

pub fn parse_rpc_url(url: &str) -> Result<Url, EvmError> {
    Url::parse(url).map_err(|e| EvmError::InvalidRpcUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn parse_key(key: &str) -> Result<PrivateKeySigner, EvmError> {
    PrivateKeySigner::from_str(key.trim().trim_start_matches("0x"))
        .map_err(|e| EvmError::InvalidKey(e.to_string()))
}

struct WalletState {
    authorized: bool,
    active: ChainId,
    active_url: Url,
    chains: HashMap<ChainId, Url>,
}

/// Local-key wallet speaking the provider protocol.
pub struct LocalWalletProvider {
    signer: PrivateKeySigner,
    state: RwLock<WalletState>,
    events: broadcast::Sender<ProviderEvent>,
}

impl LocalWalletProvider {
    /// A wallet that only knows `chain`, served at `rpc_url`.
    pub fn new(signer: PrivateKeySigner, chain: ChainId, rpc_url: Url) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            signer,
            state: RwLock::new(WalletState {
                authorized: false,
                active: chain,
                active_url: rpc_url.clone(),
                chains: HashMap::from([(chain, rpc_url)]),
            }),
            events,
        }
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_private_key(key: &str, chain: ChainId, rpc_url: &str) -> Result<Self, EvmError> {
        Ok(Self::new(parse_key(key)?, chain, parse_rpc_url(rpc_url)?))
    }

    /// Ask the node at `rpc_url` which chain it serves and start there.
    #[instrument(skip(signer))]
    pub async fn connect(signer: PrivateKeySigner, rpc_url: &str) -> Result<Self, EvmError> {
        let url = parse_rpc_url(rpc_url)?;
        let chain = ProviderBuilder::new()
            .on_http(url.clone())
            .get_chain_id()
            .await
            .map_err(|e| EvmError::Rpc(e.to_string()))?;
        info!(chain, "Node reachable");
        Ok(Self::new(signer, ChainId(chain), url))
    }

    /// [`Self::connect`] with a hex private key.
    pub async fn connect_with_key(key: &str, rpc_url: &str) -> Result<Self, EvmError> {
        Self::connect(parse_key(key)?, rpc_url).await
    }

    /// Treat the account as already authorized, like a wallet that
    /// remembers the site.
    pub fn authorized(self) -> Self {
        self.state.write().authorized = true;
        self
    }

    pub fn address(&self) -> Address {
        from_evm(self.signer.address())
    }

    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }

    pub fn active_chain(&self) -> ChainId {
        self.state.read().active
    }

    /// Endpoint for the active chain.
    pub fn rpc_url(&self) -> Url {
        self.state.read().active_url.clone()
    }

    pub fn knows_chain(&self, chain: ChainId) -> bool {
        self.state.read().chains.contains_key(&chain)
    }

    /// Forget the site authorization; listeners see an empty account list.
    pub fn revoke(&self) {
        self.state.write().authorized = false;
        let _ = self.events.send(ProviderEvent::AccountsChanged(Vec::new()));
    }

    fn accounts(&self) -> Value {
        if self.state.read().authorized {
            json!([self.address().to_hex()])
        } else {
            json!([])
        }
    }

    fn switch(&self, chain: ChainId) -> Result<Value, ProviderError> {
        let changed = {
            let mut state = self.state.write();
            let Some(url) = state.chains.get(&chain).cloned() else {
                return Err(ProviderError::unrecognized_chain(&chain.to_hex()));
            };
            let changed = state.active != chain;
            state.active = chain;
            state.active_url = url;
            changed
        };
        if changed {
            info!(chain = %chain, "Switched chain");
            let _ = self.events.send(ProviderEvent::ChainChanged(chain));
        }
        Ok(Value::Null)
    }

    fn add(&self, descriptor: &NetworkDescriptor) -> Result<Value, ProviderError> {
        let url = descriptor
            .primary_rpc_url()
            .ok_or_else(|| ProviderError::new(INVALID_PARAMS, "rpcUrls must not be empty"))
            .and_then(|url| {
                parse_rpc_url(url).map_err(|e| ProviderError::new(INVALID_PARAMS, e.to_string()))
            })?;
        debug!(chain = %descriptor.chain_id, %url, "Added chain");
        self.state.write().chains.insert(descriptor.chain_id, url);
        Ok(Value::Null)
    }
}

#[async_trait]
impl SigningProvider for LocalWalletProvider {
    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderError> {
        match request {
            ProviderRequest::Accounts => Ok(self.accounts()),
            ProviderRequest::RequestAccounts => {
                self.state.write().authorized = true;
                Ok(self.accounts())
            }
            ProviderRequest::ChainId => Ok(json!(self.active_chain().to_hex())),
            ProviderRequest::SwitchChain(chain) => self.switch(chain),
            ProviderRequest::AddChain(descriptor) => self.add(&descriptor),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}

/// Shared handle, so the binder and the negotiator see the same wallet.
pub type SharedWallet = Arc<LocalWalletProvider>;
