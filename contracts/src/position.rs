//! Position identifiers.
//!
//! A position id *is* its vault's address, widened to 256 bits, with the
//! vault's reuse generation stacked on top:
//!
//! ```text
//!   255            160 159                       0
//!  +-----------------+---------------------------+
//!  |   generation    |       vault address       |
//!  +-----------------+---------------------------+
//! ```
//!
//! The first tenancy of every vault is generation 0, so a fresh position's
//! id is numerically equal to its vault address. Each reuse bumps the
//! generation, which keeps ids from earlier tenancies dead forever.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use synthswap_protocol::config::GENERATION_SHIFT;
use synthswap_protocol::Amount;

/// 256-bit non-fungible position identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionId(U256);

impl PositionId {
    /// Id of the `generation`-th tenancy of `vault`.
    pub fn new(vault: Address, generation: u64) -> Self {
        let low = U256::from_be_slice(vault.as_slice());
        Self((U256::from(generation) << GENERATION_SHIFT) | low)
    }

    /// Wraps a raw 256-bit value, e.g. one read back from an event.
    pub const fn from_u256(raw: U256) -> Self {
        Self(raw)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    /// Address of the backing vault (low 160 bits).
    pub fn vault_address(&self) -> Address {
        let bytes = self.0.to_be_bytes::<32>();
        Address::from_slice(&bytes[12..])
    }

    /// Reuse generation (high bits). Saturates for ids that were never
    /// produced by [`PositionId::new`].
    pub fn generation(&self) -> u64 {
        u64::try_from(self.0 >> GENERATION_SHIFT).unwrap_or(u64::MAX)
    }
}

impl From<Address> for PositionId {
    /// First-tenancy id of a vault.
    fn from(vault: Address) -> Self {
        Self::new(vault, 0)
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for PositionId {
    type Err = <U256 as FromStr>::Err;

    /// Accepts `0x`-prefixed hex or plain decimal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        U256::from_str(s.trim()).map(Self)
    }
}

/// Snapshot of a live position returned by `token_info`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub owner: Address,
    pub synth: Address,
    pub underlying_balance: Amount,
}
