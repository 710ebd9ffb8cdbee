//! # Protocol Configuration & Constants
//!
//! Constants shared by the substrate, the registry, and the node.
//!
//! The tunable ones (settlement delay, fees, initial vault count) are only
//! defaults; the node's TOML configuration overrides them. The rest are part
//! of the public surface and do not change after deployment.

use alloy_primitives::{address, Address};

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Sentinel address standing in for the chain's native gas asset.
///
/// Callers pass this as the source asset (with an exactly matching attached
/// value) or as the payout target.
pub const NATIVE_ASSET: Address = address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// Ticker shown for the native asset in logs and the devnet config.
pub const NATIVE_SYMBOL: &str = "ETH";

/// Decimal places of the native asset.
pub const NATIVE_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Pricing
// ---------------------------------------------------------------------------

/// Fixed-point scale for prices. A price of `PRICE_PRECISION` means one whole
/// token is worth one unit of account.
pub const PRICE_PRECISION: u128 = 1_000_000_000_000_000_000;

/// Basis-point denominator for every fee in the system.
pub const FEE_DENOMINATOR: u32 = 10_000;

/// Upper bound for any configured fee (10%).
pub const MAX_FEE_BPS: u32 = 1_000;

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

/// Default waiting period, in seconds, after a synth conversion before the
/// converted balance may move again.
pub const DEFAULT_SETTLEMENT_DELAY_SECS: u64 = 300;

// ---------------------------------------------------------------------------
// Vaults & Position Identifiers
// ---------------------------------------------------------------------------

/// Number of vaults pre-deployed when a registry is constructed.
pub const DEFAULT_INITIAL_VAULTS: usize = 3;

/// Bit offset of the reuse generation inside a position identifier. The low
/// 160 bits hold the vault address.
pub const GENERATION_SHIFT: usize = 160;

// ---------------------------------------------------------------------------
// Interface Identifiers
// ---------------------------------------------------------------------------

/// ERC-165 `supportsInterface(bytes4)` selector.
pub const ERC165_INTERFACE_ID: u32 = 0x01ff_c9a7;

/// ERC-721 core interface id.
pub const ERC721_INTERFACE_ID: u32 = 0x80ac_58cd;

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Genesis block timestamp used by devnet chains (2020-09-13T12:26:40Z).
pub const DEVNET_GENESIS_TIMESTAMP: u64 = 1_600_000_000;

/// Protocol version reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_asset_is_not_zero() {
        assert_ne!(NATIVE_ASSET, Address::ZERO);
    }

    #[test]
    fn test_fee_bounds_sanity() {
        assert!(MAX_FEE_BPS < FEE_DENOMINATOR);
    }

    #[test]
    fn test_interface_ids() {
        // Fixed by ERC-165 and ERC-721.
        assert_eq!(ERC165_INTERFACE_ID.to_be_bytes(), [0x01, 0xff, 0xc9, 0xa7]);
        assert_eq!(ERC721_INTERFACE_ID.to_be_bytes(), [0x80, 0xac, 0x58, 0xcd]);
    }

    #[test]
    fn test_generation_shift_clears_address_bits() {
        assert_eq!(GENERATION_SHIFT, Address::ZERO.as_slice().len() * 8);
    }
}
