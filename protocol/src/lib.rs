// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SynthSwap Protocol: Chain Substrate
//!
//! Everything the position registry runs *against*: the block clock, a
//! multi-asset token ledger, the settlement gate that imposes the
//! post-exchange waiting period, and the pools that route coins into and
//! out of synths.
//!
//! The registry in `synthswap-contracts` only ever sees these through
//! traits ([`settlement::SettlementGate`], [`exchange::ExchangeRouter`]) and
//! a `&mut Chain`. The reference implementations here are a fixed-rate pool and a
//! delay-window gate.
//!
//! ## Modules
//!
//! - **config**: Protocol constants. One place, no magic numbers elsewhere.
//! - **math**: 256-bit intermediate fixed-point helpers.
//! - **ledger**: Balances and supplies for every (asset, account) pair.
//! - **chain**: Committed world state plus the atomic `transact` primitive.
//! - **settlement**: Settlement gate trait, exchange book, reference gate.
//! - **exchange**: Exchange router trait and the fixed-rate reference pool.

pub mod chain;
pub mod config;
pub mod exchange;
pub mod ledger;
pub mod math;
pub mod settlement;

pub use alloy_primitives::{Address, U256};

/// Token amounts in smallest units. 128 bits covers 10^38, which is more
/// than every synth supply in existence combined.
pub type Amount = u128;
