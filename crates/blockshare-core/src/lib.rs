//! # BlockShare Core
//!
//! Core types, errors, and boundary traits shared by every BlockShare crate.
//!
//! The session negotiator, registry gateway, and upload pipeline never talk
//! to a wallet, a chain, or a pinning service directly. They go through the
//! traits defined here so the same orchestration logic runs against a real
//! browser-style provider or the in-memory doubles in [`testing`].
//!
//! ## Key Traits
//!
//! - [`SigningProvider`]: EIP-1193 style `request` + account/chain events
//! - [`RegistryContract`]: the ledger's `add`/`display`/`allow`/`disallow`/`shareAccess`
//! - [`ContractBinder`]: binds a contract address to a signing identity
//! - [`NameResolver`]: optional `name.eth` style lookups
//! - [`PinningService`]: content-addressed upload with byte progress
//! - [`ClientStore`]: flat durable key/value client state
//!
//! ## Key Types
//!
//! - [`Address`], [`ChainId`], [`Identity`], [`NetworkDescriptor`]
//! - [`Pointer`], [`ContentId`], [`CapabilityEntry`]
//! - [`DriveError`] and its [`ErrorKind`] taxonomy

pub mod capability;
pub mod error;
pub mod identity;
pub mod liveness;
pub mod network;
pub mod pointer;
pub mod provider;
pub mod registry;
pub mod storage;
pub mod testing;

pub use capability::*;
pub use error::*;
pub use identity::*;
pub use liveness::*;
pub use network::*;
pub use pointer::*;
pub use provider::*;
pub use registry::*;
pub use storage::*;
