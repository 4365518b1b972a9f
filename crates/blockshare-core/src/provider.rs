//! Signing provider boundary.
//!
//! Models the injected wallet object: a single `request` entry point keyed by
//! JSON-RPC method name, plus `accountsChanged` / `chainChanged` events. Only
//! the session negotiator talks to it.

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::broadcast;

use crate::error::ProviderError;
use crate::identity::{Address, ChainId};
use crate::network::NetworkDescriptor;

/// The user dismissed the prompt.
pub const USER_REJECTED: i64 = 4001;
/// `wallet_switchEthereumChain` target is unknown to the wallet.
pub const UNRECOGNIZED_CHAIN: i64 = 4902;
/// A prompt of the same kind is already open.
pub const REQUEST_PENDING: i64 = -32002;

/// Requests the negotiator issues against a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderRequest {
    /// `eth_accounts`: already-authorized accounts, never prompts.
    Accounts,
    /// `eth_requestAccounts`: prompts the user for authorization.
    RequestAccounts,
    /// `eth_chainId`: the active network.
    ChainId,
    /// `wallet_switchEthereumChain`.
    SwitchChain(ChainId),
    /// `wallet_addEthereumChain`.
    AddChain(NetworkDescriptor),
}

impl ProviderRequest {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Accounts => "eth_accounts",
            Self::RequestAccounts => "eth_requestAccounts",
            Self::ChainId => "eth_chainId",
            Self::SwitchChain(_) => "wallet_switchEthereumChain",
            Self::AddChain(_) => "wallet_addEthereumChain",
        }
    }

    /// JSON-RPC `params` array for the wire form of this request.
    pub fn params(&self) -> Value {
        match self {
            Self::Accounts | Self::RequestAccounts | Self::ChainId => json!([]),
            Self::SwitchChain(chain) => json!([{ "chainId": chain.to_hex() }]),
            Self::AddChain(descriptor) => json!([descriptor]),
        }
    }

    /// Whether this request opens a user-facing prompt.
    pub fn prompts(&self) -> bool {
        matches!(
            self,
            Self::RequestAccounts | Self::SwitchChain(_) | Self::AddChain(_)
        )
    }
}

/// Events a provider pushes to its listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(ChainId),
}

/// The injected signing provider.
#[async_trait]
pub trait SigningProvider: Send + Sync {
    /// Issue one request and return its raw JSON result.
    async fn request(&self, request: ProviderRequest) -> Result<Value, ProviderError>;

    /// Subscribe to account and chain change events.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// Decode an `eth_accounts` / `eth_requestAccounts` result.
///
/// Lowercases every address; entries that do not parse are dropped.
pub fn parse_accounts(value: &Value) -> Result<Vec<Address>, ProviderError> {
    let list = value
        .as_array()
        .ok_or_else(|| ProviderError::new(-32603, format!("accounts result is not a list: {value}")))?;
    Ok(list
        .iter()
        .filter_map(Value::as_str)
        .filter_map(|s| Address::parse(s).ok())
        .collect())
}

/// Decode an `eth_chainId` result (hex string or number).
pub fn parse_chain_id(value: &Value) -> Result<ChainId, ProviderError> {
    let parsed = match value {
        Value::String(s) => ChainId::parse(s),
        Value::Number(n) => n.as_u64().map(ChainId),
        _ => None,
    };
    parsed.ok_or_else(|| ProviderError::new(-32603, format!("invalid chain id result: {value}")))
}
