//! # BlockShare Registry
//!
//! Typed access to the registry contract: pointer registration and listing,
//! read-access grants and revocations, and the grant list.
//!
//! The contract is authoritative. The gateway never pre-checks ownership or
//! access; it forwards the call, waits for confirmation on writes, and maps
//! contract failures onto [`blockshare_core::DriveError`].

pub mod factory;
pub mod gateway;
pub mod resolver;

pub use factory::{GatewayFactory, resolve_contract_address};
pub use gateway::RegistryGateway;
pub use resolver::StaticNameResolver;
