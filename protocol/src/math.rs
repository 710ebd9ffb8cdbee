//! Fixed-point helpers shared by the reference pool and the settlement gate.
//!
//! All intermediate products are computed in 256 bits so a 10^24 amount
//! times an 18-decimal price never wraps. Every helper returns `None` instead
//! of panicking; callers turn that into their own overflow error.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::config::FEE_DENOMINATOR;
use crate::Amount;

/// Price of one whole token, scaled by [`crate::config::PRICE_PRECISION`],
/// together with the token's decimal places.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPrice {
    /// Unit-of-account value of one whole token, 18-decimal fixed point.
    pub price: u128,
    /// Decimal places of the token's smallest denomination.
    pub decimals: u8,
}

impl AssetPrice {
    /// Convenience constructor.
    pub const fn new(price: u128, decimals: u8) -> Self {
        Self { price, decimals }
    }
}

/// `a * b / denom`, rounded down.
pub fn mul_div(a: u128, b: u128, denom: u128) -> Option<Amount> {
    if denom == 0 {
        return None;
    }
    let product = U256::from(a).checked_mul(U256::from(b))?;
    u128::try_from(product / U256::from(denom)).ok()
}

/// Converts `amount` of the `from` asset into the equivalent amount of the
/// `to` asset, rounding down.
pub fn convert(amount: Amount, from: AssetPrice, to: AssetPrice) -> Option<Amount> {
    let to_scale = 10u128.checked_pow(u32::from(to.decimals))?;
    let from_scale = 10u128.checked_pow(u32::from(from.decimals))?;

    let numerator = U256::from(amount)
        .checked_mul(U256::from(from.price))?
        .checked_mul(U256::from(to_scale))?;
    let denominator = U256::from(to.price).checked_mul(U256::from(from_scale))?;
    if denominator.is_zero() {
        return None;
    }
    u128::try_from(numerator / denominator).ok()
}

/// Deducts a basis-point fee from `amount`.
pub fn apply_fee(amount: Amount, fee_bps: u32) -> Option<Amount> {
    let keep = FEE_DENOMINATOR.checked_sub(fee_bps)?;
    mul_div(amount, u128::from(keep), u128::from(FEE_DENOMINATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PRICE_PRECISION;

    const USD: AssetPrice = AssetPrice::new(PRICE_PRECISION, 18);
    const USDT: AssetPrice = AssetPrice::new(PRICE_PRECISION, 6);
    const BTC: AssetPrice = AssetPrice::new(60_000 * PRICE_PRECISION, 8);

    #[test]
    fn mul_div_rounds_down() {
        assert_eq!(mul_div(10, 3, 4), Some(7));
        assert_eq!(mul_div(1, 1, 0), None);
    }

    #[test]
    fn convert_scales_decimals() {
        // 1,000,000 USDT (6 decimals) -> 18-decimal dollars.
        let out = convert(1_000_000 * 10u128.pow(6), USDT, USD).unwrap();
        assert_eq!(out, 1_000_000 * 10u128.pow(18));
    }

    #[test]
    fn convert_applies_price_ratio() {
        // $60,000 buys exactly one BTC.
        let out = convert(60_000 * 10u128.pow(18), USD, BTC).unwrap();
        assert_eq!(out, 10u128.pow(8));
    }

    #[test]
    fn convert_handles_large_amounts() {
        // The intermediate product overflows u128 but not U256.
        let out = convert(10u128.pow(20), BTC, USD).unwrap();
        assert_eq!(out, 10u128.pow(20) * 60_000 * 10u128.pow(10));
    }

    #[test]
    fn convert_rejects_zero_price() {
        assert_eq!(convert(1, USD, AssetPrice::new(0, 18)), None);
    }

    #[test]
    fn fee_is_deducted() {
        assert_eq!(apply_fee(10_000, 30), Some(9_970));
        assert_eq!(apply_fee(10_000, 0), Some(10_000));
        assert_eq!(apply_fee(10_000, FEE_DENOMINATOR + 1), None);
    }
}
