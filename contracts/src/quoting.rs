//! Dry-run quotes.
//!
//! Both quotes walk exactly the route the mutating call takes and read the
//! same state, so the number they return is what an immediately following
//! swap realizes. That makes `quote` the tightest `min_amount` a caller can
//! pass without reverting.

use alloy_primitives::Address;
use synthswap_protocol::chain::Chain;
use synthswap_protocol::Amount;

use crate::error::SwapError;
use crate::registry::SynthSwap;

impl SynthSwap {
    /// Synth output of `swap_into_synth(source, synth, amount)`.
    pub fn get_swap_into_synth_amount(
        &self,
        chain: &Chain,
        source: Address,
        synth: Address,
        amount: Amount,
    ) -> Result<Amount, SwapError> {
        let source_synth = self
            .swappable_synth(source)
            .ok_or(SwapError::UnknownAsset(source))?;
        if self.synth_pool(synth).is_none() {
            return Err(SwapError::UnknownSynth(synth));
        }
        if source_synth == synth {
            return Err(SwapError::SameAssetClass {
                asset: source,
                synth,
            });
        }

        let intermediate = if source == source_synth {
            amount
        } else {
            self.router_for(source_synth)?
                .quote_in(chain, source, source_synth, amount)?
        };
        Ok(self.gate().quote(chain, source_synth, synth, intermediate)?)
    }

    /// Payout of `swap_from_synth` for `amount` of `synth` into `target`.
    pub fn get_swap_from_synth_amount(
        &self,
        chain: &Chain,
        synth: Address,
        target: Address,
        amount: Amount,
    ) -> Result<Amount, SwapError> {
        if target == synth {
            return Err(SwapError::SameSynth(synth));
        }
        let router = self.router_for(synth)?;
        if !router.has_coin(target) {
            return Err(SwapError::TargetNotTradable { target, synth });
        }
        Ok(router.quote_out(chain, synth, target, amount)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use synthswap_protocol::config::PRICE_PRECISION;
    use synthswap_protocol::exchange::{ExchangeRouter, FixedRatePool};
    use synthswap_protocol::math::AssetPrice;
    use synthswap_protocol::settlement::DelayedSettlementGate;

    const REGISTRY: Address = Address::repeat_byte(0x01);
    const SUSD: Address = Address::repeat_byte(0x51);
    const SBTC: Address = Address::repeat_byte(0x5b);
    const DAI: Address = Address::repeat_byte(0xda);
    const WBTC: Address = Address::repeat_byte(0x3b);

    fn setup() -> (Chain, SynthSwap) {
        let usd = AssetPrice::new(PRICE_PRECISION, 18);
        let btc = AssetPrice::new(50_000 * PRICE_PRECISION, 18);

        let gate = DelayedSettlementGate::new(300, 0).unwrap();
        gate.set_price(SUSD, usd);
        gate.set_price(SBTC, btc);

        let mut chain = Chain::new(0);
        for (asset, symbol) in [(SUSD, "sUSD"), (SBTC, "sBTC"), (DAI, "DAI"), (WBTC, "WBTC")] {
            chain.ledger_mut().register_asset(asset, symbol, 18).unwrap();
        }
        let usd_pool = FixedRatePool::new(Address::repeat_byte(0x90), 0)
            .unwrap()
            .with_coin(SUSD, usd)
            .with_coin(DAI, usd);
        let btc_pool = FixedRatePool::new(Address::repeat_byte(0x91), 0)
            .unwrap()
            .with_coin(SBTC, AssetPrice::new(PRICE_PRECISION, 18))
            .with_coin(WBTC, AssetPrice::new(PRICE_PRECISION, 18));
        chain.ledger_mut().mint(SUSD, usd_pool.address(), 10u128.pow(30)).unwrap();
        chain.ledger_mut().mint(WBTC, btc_pool.address(), 10u128.pow(24)).unwrap();

        let mut swap = SynthSwap::new(REGISTRY, Arc::new(gate), 0);
        swap.add_synth(SUSD, Arc::new(usd_pool)).unwrap();
        swap.add_synth(SBTC, Arc::new(btc_pool)).unwrap();
        (chain, swap)
    }

    #[test]
    fn quote_into_routes_through_source_class() {
        let (chain, swap) = setup();
        let out = swap
            .get_swap_into_synth_amount(&chain, DAI, SBTC, 100_000 * 10u128.pow(18))
            .unwrap();
        assert_eq!(out, 2 * 10u128.pow(18));
    }

    #[test]
    fn quote_into_from_a_synth_skips_the_pool() {
        let (chain, swap) = setup();
        let out = swap
            .get_swap_into_synth_amount(&chain, SUSD, SBTC, 50_000 * 10u128.pow(18))
            .unwrap();
        assert_eq!(out, 10u128.pow(18));
    }

    #[test]
    fn quote_rejects_same_class() {
        let (chain, swap) = setup();
        assert!(matches!(
            swap.get_swap_into_synth_amount(&chain, DAI, SUSD, 1),
            Err(SwapError::SameAssetClass { .. })
        ));
    }

    #[test]
    fn quote_from_uses_synth_pool() {
        let (chain, swap) = setup();
        let out = swap
            .get_swap_from_synth_amount(&chain, SBTC, WBTC, 10u128.pow(18))
            .unwrap();
        assert_eq!(out, 10u128.pow(18));
        assert!(matches!(
            swap.get_swap_from_synth_amount(&chain, SBTC, DAI, 1),
            Err(SwapError::TargetNotTradable { .. })
        ));
    }
}
