//! # Exchange Routers
//!
//! Each synth is paired with one pool that trades it against the other
//! coins of its asset class (sBTC against WBTC and renBTC, sUSD against DAI
//! and USDT, and so on). The registry only needs two directions from a
//! pool: *in* (coin -> synth) and *out* (synth -> coin), so that is what
//! [`ExchangeRouter`] exposes on top of a generic coin-to-coin swap.
//!
//! Pool reserves are plain ledger balances held at the pool's address.
//! Seeding liquidity means minting to that address; nothing else is
//! special about a pool account.
//!
//! [`FixedRatePool`] prices every pair from a static rate table with a flat
//! basis-point fee. It will not win any market-making awards, but it gives
//! the registry deterministic quotes whose dry run always equals the real
//! run.

use std::fmt::Debug;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::chain::Chain;
use crate::config::MAX_FEE_BPS;
use crate::ledger::LedgerError;
use crate::math::{apply_fee, convert, AssetPrice};
use crate::Amount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by an exchange pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The pool does not list this coin.
    #[error("pool {pool} does not trade {coin}")]
    UnknownCoin {
        /// Pool address.
        pool: Address,
        /// Coin that was requested.
        coin: Address,
    },

    /// Both sides of the swap are the same coin.
    #[error("cannot swap {0} into itself")]
    SameCoin(Address),

    /// The pool holds less of the output coin than the swap would pay out.
    #[error("insufficient liquidity: pool holds {available} of {coin}, swap needs {requested}")]
    InsufficientLiquidity {
        /// Output coin.
        coin: Address,
        /// Pool reserve of the output coin.
        available: Amount,
        /// Amount the swap would pay out.
        requested: Amount,
    },

    /// The fee exceeds the allowed maximum.
    #[error("fee of {0} bps exceeds the maximum")]
    FeeTooHigh(u32),

    /// Price math overflowed.
    #[error("exchange arithmetic overflow")]
    Overflow,

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Router Trait
// ---------------------------------------------------------------------------

/// A pool that trades a synth against the other coins of its asset class.
pub trait ExchangeRouter: Send + Sync + Debug {
    /// Account holding the pool's reserves.
    fn address(&self) -> Address;

    /// Every coin the pool trades, synth included.
    fn coins(&self) -> Vec<Address>;

    /// Output amount for swapping `amount` of `from` into `to`, reading the
    /// current reserves.
    fn quote(
        &self,
        chain: &Chain,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Amount, ExchangeError>;

    /// Pulls `amount` of `from` from `payer` and pays the output in `to` to
    /// `recipient`. Returns the amount paid out.
    fn swap(
        &self,
        chain: &mut Chain,
        payer: Address,
        from: Address,
        to: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<Amount, ExchangeError>;

    /// Whether the pool trades `coin`.
    fn has_coin(&self, coin: Address) -> bool {
        self.coins().contains(&coin)
    }

    /// Quote for converting a class coin into the pool's synth.
    fn quote_in(
        &self,
        chain: &Chain,
        source: Address,
        synth: Address,
        amount: Amount,
    ) -> Result<Amount, ExchangeError> {
        self.quote(chain, source, synth, amount)
    }

    /// Quote for converting the pool's synth into a class coin.
    fn quote_out(
        &self,
        chain: &Chain,
        synth: Address,
        target: Address,
        amount: Amount,
    ) -> Result<Amount, ExchangeError> {
        self.quote(chain, synth, target, amount)
    }

    /// Converts a class coin into the pool's synth.
    fn exchange_in(
        &self,
        chain: &mut Chain,
        payer: Address,
        source: Address,
        synth: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<Amount, ExchangeError> {
        self.swap(chain, payer, source, synth, amount, recipient)
    }

    /// Converts the pool's synth into a class coin.
    fn exchange_out(
        &self,
        chain: &mut Chain,
        payer: Address,
        synth: Address,
        target: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<Amount, ExchangeError> {
        self.swap(chain, payer, synth, target, amount, recipient)
    }
}

// ---------------------------------------------------------------------------
// Fixed-Rate Pool
// ---------------------------------------------------------------------------

/// A coin listed in a [`FixedRatePool`] and the rate it trades at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolCoin {
    pub asset: Address,
    pub price: AssetPrice,
}

/// Static-rate reference pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixedRatePool {
    address: Address,
    coins: Vec<PoolCoin>,
    fee_bps: u32,
}

impl FixedRatePool {
    /// An empty pool at `address` charging `fee_bps` on every swap.
    pub fn new(address: Address, fee_bps: u32) -> Result<Self, ExchangeError> {
        if fee_bps > MAX_FEE_BPS {
            return Err(ExchangeError::FeeTooHigh(fee_bps));
        }
        Ok(Self {
            address,
            coins: Vec::new(),
            fee_bps,
        })
    }

    /// Lists `asset` at `price`. Listing an asset twice replaces its price.
    pub fn with_coin(mut self, asset: Address, price: AssetPrice) -> Self {
        match self.coins.iter_mut().find(|c| c.asset == asset) {
            Some(existing) => existing.price = price,
            None => self.coins.push(PoolCoin { asset, price }),
        }
        self
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    fn price_of(&self, coin: Address) -> Result<AssetPrice, ExchangeError> {
        self.coins
            .iter()
            .find(|c| c.asset == coin)
            .map(|c| c.price)
            .ok_or(ExchangeError::UnknownCoin {
                pool: self.address,
                coin,
            })
    }
}

impl ExchangeRouter for FixedRatePool {
    fn address(&self) -> Address {
        self.address
    }

    fn coins(&self) -> Vec<Address> {
        self.coins.iter().map(|c| c.asset).collect()
    }

    fn quote(
        &self,
        chain: &Chain,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<Amount, ExchangeError> {
        if from == to {
            return Err(ExchangeError::SameCoin(from));
        }
        let gross = convert(amount, self.price_of(from)?, self.price_of(to)?)
            .ok_or(ExchangeError::Overflow)?;
        let out = apply_fee(gross, self.fee_bps).ok_or(ExchangeError::Overflow)?;

        let available = chain.balance_of(to, self.address);
        if available < out {
            return Err(ExchangeError::InsufficientLiquidity {
                coin: to,
                available,
                requested: out,
            });
        }
        Ok(out)
    }

    fn swap(
        &self,
        chain: &mut Chain,
        payer: Address,
        from: Address,
        to: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<Amount, ExchangeError> {
        let out = self.quote(chain, from, to, amount)?;
        chain.ledger_mut().transfer(from, payer, self.address, amount)?;
        chain.ledger_mut().transfer(to, self.address, recipient, out)?;

        debug!(pool = %self.address, %from, %to, amount, out, "pool swap");
        Ok(out)
    }
}
