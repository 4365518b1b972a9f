//! # BlockShare EVM
//!
//! alloy-backed implementations of the chain-side boundaries:
//!
//! - [`EvmRegistry`]: the `Upload` registry contract as a
//!   [`RegistryContract`](blockshare_core::RegistryContract)
//! - [`EvmBinder`]: binds the contract to the local wallet
//! - [`LocalWalletProvider`]: a private-key
//!   [`SigningProvider`](blockshare_core::SigningProvider) for headless use

pub mod binder;
pub mod contract;
pub mod error;
pub mod registry;
pub mod wallet;

pub use binder::EvmBinder;
pub use error::{EvmError, classify};
pub use registry::{ConfirmPolicy, EvmRegistry, HttpTransport};
pub use wallet::{LocalWalletProvider, SharedWallet, parse_rpc_url};
