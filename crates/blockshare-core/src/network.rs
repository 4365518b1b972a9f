//! Network descriptors used for `wallet_addEthereumChain`.

use serde::{Deserialize, Serialize};

use crate::identity::ChainId;

/// Native currency of a network, as wallets expect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl NativeCurrency {
    pub fn ether() -> Self {
        Self {
            name: "Ether".to_string(),
            symbol: "ETH".to_string(),
            decimals: 18,
        }
    }
}

/// Everything a wallet needs to add a network it does not know.
///
/// Serializes to the EIP-3085 parameter object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDescriptor {
    pub chain_id: ChainId,
    pub chain_name: String,
    pub rpc_urls: Vec<String>,
    pub native_currency: NativeCurrency,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub block_explorer_urls: Vec<String>,
}

impl NetworkDescriptor {
    /// Local Hardhat node, the network the registry contract is deployed to by default.
    pub fn hardhat_local() -> Self {
        Self {
            chain_id: ChainId(31337),
            chain_name: "Hardhat Local".to_string(),
            rpc_urls: vec!["http://127.0.0.1:8545".to_string()],
            native_currency: NativeCurrency::ether(),
            block_explorer_urls: Vec::new(),
        }
    }

    pub fn sepolia() -> Self {
        Self {
            chain_id: ChainId(11_155_111),
            chain_name: "Sepolia".to_string(),
            rpc_urls: vec!["https://rpc.sepolia.org".to_string()],
            native_currency: NativeCurrency {
                name: "Sepolia Ether".to_string(),
                symbol: "ETH".to_string(),
                decimals: 18,
            },
            block_explorer_urls: vec!["https://sepolia.etherscan.io".to_string()],
        }
    }

    /// Override the RPC endpoint list, keeping everything else.
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_urls = vec![url.into()];
        self
    }

    pub fn primary_rpc_url(&self) -> Option<&str> {
        self.rpc_urls.first().map(String::as_str)
    }
}

impl Default for NetworkDescriptor {
    fn default() -> Self {
        Self::hardhat_local()
    }
}
