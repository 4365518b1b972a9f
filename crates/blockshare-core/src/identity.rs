//! Account addresses, chain identifiers, and the bound session identity.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::error::DriveError;
use crate::liveness::SessionEpoch;

/// A 20-byte account address, always displayed as lowercase `0x` hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Parse a hex address, with or without the `0x` prefix.
    ///
    /// Mixed-case input is accepted and normalised; the checksum casing is
    /// not verified.
    pub fn parse(input: &str) -> Result<Self, DriveError> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != 40 {
            return Err(DriveError::invalid_address(input));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| DriveError::invalid_address(input))?;
        Ok(Self(bytes))
    }

    /// Whether `input` would parse as an address.
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Abbreviated form for headers and lists: `0x1234…abcd`.
    pub fn short(&self) -> String {
        let full = self.to_hex();
        format!("{}…{}", &full[..6], &full[full.len() - 4..])
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short())
    }
}

impl FromStr for Address {
    type Err = DriveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::parse(&s).map_err(de::Error::custom)
    }
}

/// An EVM chain identifier.
///
/// Serialized as the `0x`-prefixed hex string wallets exchange.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{_0}")]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn to_hex(&self) -> String {
        format!("{:#x}", self.0)
    }

    /// Parse `0x7a69` or a plain decimal `31337`.
    pub fn parse(input: &str) -> Option<Self> {
        let s = input.trim();
        match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => u64::from_str_radix(digits, 16).ok().map(Self),
            None => s.parse().ok().map(Self),
        }
    }
}

impl Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({})", self.0)
    }
}

impl Serialize for ChainId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(u64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(n) => Ok(ChainId(n)),
            Repr::Text(s) => {
                ChainId::parse(&s).ok_or_else(|| de::Error::custom(format!("invalid chain id {s:?}")))
            }
        }
    }
}

/// The account currently authorized to sign, as observed when it was bound.
///
/// `epoch` identifies the session binding; it changes whenever the account
/// or network changes so results computed for an older binding can be told
/// apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub address: Address,
    pub chain_id: ChainId,
    pub epoch: SessionEpoch,
}

impl Identity {
    pub fn new(address: Address, chain_id: ChainId, epoch: SessionEpoch) -> Self {
        Self {
            address,
            chain_id,
            epoch,
        }
    }
}
