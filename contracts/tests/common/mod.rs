//! Shared fixture for the registry integration tests.
//!
//! Four asset classes (USD, BTC, ETH, EUR), each with one synth and a
//! fixed-rate pool trading it against the class's plain coins. Pools are
//! seeded deep enough that no test runs them dry. The registry starts with
//! three pre-deployed vaults.

#![allow(dead_code)]

use std::sync::Arc;

use alloy_primitives::Address;
use synthswap_contracts::{PositionEvent, PositionId, SwapInto, SynthSwap};
use synthswap_protocol::chain::{CallContext, Chain};
use synthswap_protocol::config::{NATIVE_ASSET, PRICE_PRECISION};
use synthswap_protocol::exchange::FixedRatePool;
use synthswap_protocol::math::AssetPrice;
use synthswap_protocol::settlement::{DelayedSettlementGate, SettlementGate};
use synthswap_protocol::Amount;

// ---------------------------------------------------------------------------
// Accounts & Assets
// ---------------------------------------------------------------------------

pub const REGISTRY: Address = Address::repeat_byte(0x5a);
pub const ALICE: Address = Address::repeat_byte(0xa1);
pub const BOB: Address = Address::repeat_byte(0xb0);
pub const CHARLIE: Address = Address::repeat_byte(0xc4);

pub const SUSD: Address = Address::repeat_byte(0x10);
pub const SBTC: Address = Address::repeat_byte(0x11);
pub const SETH: Address = Address::repeat_byte(0x12);
pub const SEUR: Address = Address::repeat_byte(0x13);

pub const DAI: Address = Address::repeat_byte(0x20);
pub const USDT: Address = Address::repeat_byte(0x21);
pub const WBTC: Address = Address::repeat_byte(0x22);
pub const EURS: Address = Address::repeat_byte(0x23);
pub const ETH: Address = NATIVE_ASSET;

pub const USD_POOL: Address = Address::repeat_byte(0x30);
pub const BTC_POOL: Address = Address::repeat_byte(0x31);
pub const ETH_POOL: Address = Address::repeat_byte(0x32);
pub const EUR_POOL: Address = Address::repeat_byte(0x33);

pub const SETTLEMENT_DELAY: u64 = 300;
pub const POOL_FEE_BPS: u32 = 4;
pub const EXCHANGE_FEE_BPS: u32 = 30;

/// `amount` whole tokens with `decimals` decimals.
pub fn units(amount: u128, decimals: u8) -> Amount {
    amount * 10u128.pow(u32::from(decimals))
}

pub fn decimals_of(asset: Address) -> u8 {
    match asset {
        a if a == USDT => 6,
        a if a == WBTC => 8,
        a if a == EURS => 2,
        _ => 18,
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

pub struct World {
    pub chain: Chain,
    pub swap: SynthSwap,
    pub gate: Arc<DelayedSettlementGate>,
}

impl World {
    /// Fully wired registry with all four synths added and the three
    /// `NewVault` construction events already drained.
    pub fn new() -> Self {
        let mut world = Self::bare(3);
        world.add_all_synths();
        world.swap.take_events();
        world
    }

    /// Registry with no synths added yet.
    pub fn bare(initial_vaults: usize) -> Self {
        let mut chain = Chain::new(1_600_000_000);
        let ledger = chain.ledger_mut();
        for (asset, symbol) in [
            (SUSD, "sUSD"),
            (SBTC, "sBTC"),
            (SETH, "sETH"),
            (SEUR, "sEUR"),
            (DAI, "DAI"),
            (USDT, "USDT"),
            (WBTC, "WBTC"),
            (EURS, "EURS"),
        ] {
            ledger
                .register_asset(asset, symbol, decimals_of(asset))
                .unwrap();
        }

        let gate = Arc::new(DelayedSettlementGate::new(SETTLEMENT_DELAY, EXCHANGE_FEE_BPS).unwrap());
        gate.set_price(SUSD, AssetPrice::new(PRICE_PRECISION, 18));
        gate.set_price(SBTC, AssetPrice::new(60_000 * PRICE_PRECISION, 18));
        gate.set_price(SETH, AssetPrice::new(3_000 * PRICE_PRECISION, 18));
        gate.set_price(SEUR, AssetPrice::new(11 * PRICE_PRECISION / 10, 18));

        let dyn_gate: Arc<dyn SettlementGate> = gate.clone();
        let swap = SynthSwap::new(REGISTRY, dyn_gate, initial_vaults);
        Self { chain, swap, gate }
    }

    pub fn pool(address: Address, coins: &[Address]) -> FixedRatePool {
        coins.iter().fold(
            FixedRatePool::new(address, POOL_FEE_BPS).unwrap(),
            |pool, &coin| pool.with_coin(coin, AssetPrice::new(PRICE_PRECISION, decimals_of(coin))),
        )
    }

    pub fn pools() -> Vec<(Address, FixedRatePool)> {
        vec![
            (SUSD, Self::pool(USD_POOL, &[SUSD, DAI, USDT])),
            (SBTC, Self::pool(BTC_POOL, &[SBTC, WBTC])),
            (SETH, Self::pool(ETH_POOL, &[SETH, ETH])),
            (SEUR, Self::pool(EUR_POOL, &[SEUR, EURS])),
        ]
    }

    /// Seeds every pool and adds every synth.
    pub fn add_all_synths(&mut self) {
        for (synth, pool) in Self::pools() {
            self.seed(&pool);
            self.swap.add_synth(synth, Arc::new(pool)).unwrap();
        }
    }

    fn seed(&mut self, pool: &FixedRatePool) {
        use synthswap_protocol::exchange::ExchangeRouter;
        for coin in pool.coins() {
            let depth = units(1_000_000_000, decimals_of(coin));
            self.chain
                .ledger_mut()
                .mint(coin, pool.address(), depth)
                .unwrap();
        }
    }

    pub fn fund(&mut self, asset: Address, account: Address, amount: Amount) {
        self.chain.ledger_mut().mint(asset, account, amount).unwrap();
    }

    pub fn balance(&self, asset: Address, account: Address) -> Amount {
        self.chain.balance_of(asset, account)
    }

    pub fn wait(&mut self, secs: u64) {
        self.chain.advance_time(secs);
    }

    /// Funds `who` with `amount` of `source` and swaps it all into `synth`.
    pub fn open(&mut self, who: Address, source: Address, synth: Address, amount: Amount) -> PositionId {
        self.fund(source, who, amount);
        let ctx = if source == ETH {
            CallContext::new(who).with_value(amount)
        } else {
            CallContext::new(who)
        };
        self.swap
            .swap_into_synth(&mut self.chain, ctx, SwapInto::new(source, synth, amount, 0))
            .unwrap()
    }

    /// The canonical position used across tests: 1,000,000 DAI into sBTC.
    pub fn open_sbtc(&mut self, who: Address) -> PositionId {
        self.open(who, DAI, SBTC, units(1_000_000, 18))
    }

    /// Live balance behind `id`, zero once the position is burned.
    pub fn underlying(&self, id: PositionId) -> Amount {
        self.swap
            .token_info(&self.chain, id)
            .map_or(0, |info| info.underlying_balance)
    }

    pub fn last_event(&mut self) -> Option<PositionEvent> {
        self.swap.take_events().pop()
    }

    /// Every asset the registry could conceivably hold.
    pub fn all_assets() -> [Address; 9] {
        [SUSD, SBTC, SETH, SEUR, DAI, USDT, WBTC, EURS, ETH]
    }

    /// The registry never keeps a float of anything.
    pub fn assert_no_float(&self) {
        for asset in Self::all_assets() {
            assert_eq!(self.balance(asset, REGISTRY), 0, "registry holds {asset}");
        }
    }
}
