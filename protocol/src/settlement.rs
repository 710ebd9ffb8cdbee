//! # Settlement Gate
//!
//! Synth-to-synth conversion is not final when it happens. The venue mints
//! the destination synth at the current rate, then holds the receiving
//! account inside a waiting period during which the price may still move.
//! Once the window closes, a *true-up* compares what was minted with what
//! the final price says should have been minted:
//!
//! - **Rebate** -- the account was under-credited; the difference is minted.
//! - **Reclaim** -- the account was over-credited; the difference is burned
//!   (capped at whatever the account still holds).
//!
//! The [`SettlementGate`] trait is the seam the registry talks to. The
//! pending conversions themselves live in the [`SettlementBook`] inside the
//! [`Chain`], so they revert together with everything else when a
//! transaction fails. [`DelayedSettlementGate`] is the reference venue: a
//! price table, a flat fee, and a fixed delay.

use std::collections::HashMap;
use std::fmt::Debug;

use alloy_primitives::Address;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::chain::Chain;
use crate::config::{DEFAULT_SETTLEMENT_DELAY_SECS, MAX_FEE_BPS};
use crate::ledger::LedgerError;
use crate::math::{apply_fee, convert, AssetPrice};
use crate::Amount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by a settlement gate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    /// The waiting period after the last conversion has not elapsed.
    #[error("settlement window still open: {seconds_left}s left")]
    NotReady {
        /// Seconds until the window closes.
        seconds_left: u64,
    },

    /// The asset is not a synth this gate can convert.
    #[error("unknown synth {0}")]
    UnknownSynth(Address),

    /// Source and destination are the same synth.
    #[error("cannot exchange {0} into itself")]
    SameSynth(Address),

    /// Price math overflowed.
    #[error("settlement arithmetic overflow")]
    Overflow,

    /// The fee exceeds the allowed maximum.
    #[error("fee of {0} bps exceeds the maximum")]
    FeeTooHigh(u32),

    /// Underlying ledger failure.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Settlement Book
// ---------------------------------------------------------------------------

/// One conversion still awaiting true-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeEntry {
    /// Synth that was burned.
    pub source: Address,
    /// Synth that was minted.
    pub dest: Address,
    /// Source amount burned.
    pub amount: Amount,
    /// Destination amount minted at conversion time.
    pub received: Amount,
    /// Block timestamp of the conversion.
    pub timestamp: u64,
}

/// Pending conversions, keyed by `(account, destination synth)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SettlementBook {
    entries: HashMap<(Address, Address), Vec<ExchangeEntry>>,
}

impl SettlementBook {
    /// Records a conversion into `entry.dest` for `account`.
    pub fn record(&mut self, account: Address, entry: ExchangeEntry) {
        self.entries
            .entry((account, entry.dest))
            .or_default()
            .push(entry);
    }

    /// Pending conversions of `account` into `synth`.
    pub fn entries(&self, account: Address, synth: Address) -> &[ExchangeEntry] {
        self.entries
            .get(&(account, synth))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether `account` has any conversion into `synth` awaiting true-up.
    pub fn has_pending(&self, account: Address, synth: Address) -> bool {
        !self.entries(account, synth).is_empty()
    }

    /// Timestamp of the most recent pending conversion, if any.
    pub fn last_exchange_at(&self, account: Address, synth: Address) -> Option<u64> {
        self.entries(account, synth).iter().map(|e| e.timestamp).max()
    }

    /// Removes and returns every pending conversion of `account` into `synth`.
    pub fn take(&mut self, account: Address, synth: Address) -> Vec<ExchangeEntry> {
        self.entries.remove(&(account, synth)).unwrap_or_default()
    }

    /// Number of `(account, synth)` pairs with pending conversions.
    pub fn pending_accounts(&self) -> usize {
        self.entries.len()
    }
}

/// What a true-up did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    /// Amount burned from the account because it was over-credited.
    pub reclaimed: Amount,
    /// Amount minted to the account because it was under-credited.
    pub rebated: Amount,
    /// Number of conversions that were trued up.
    pub entries: usize,
}

// ---------------------------------------------------------------------------
// Gate Trait
// ---------------------------------------------------------------------------

/// The venue that converts between synths and enforces the waiting period.
///
/// Implementations keep their per-account state in the [`Chain`] they are
/// handed, never in `self`, so that a reverted transaction also reverts
/// the gate. Anything in `self` is treated as an external oracle.
pub trait SettlementGate: Send + Sync + Debug {
    /// Whether `asset` is a synth this gate can convert.
    fn is_synth(&self, asset: Address) -> bool;

    /// Amount of `dest` that `exchange` would currently mint for `amount`
    /// of `source`.
    fn quote(
        &self,
        chain: &Chain,
        source: Address,
        dest: Address,
        amount: Amount,
    ) -> Result<Amount, SettlementError>;

    /// Burns `amount` of `source` held by `account`, mints the destination
    /// synth to the same account, and opens (or extends) its waiting period.
    /// Returns the amount minted.
    fn exchange(
        &self,
        chain: &mut Chain,
        account: Address,
        source: Address,
        dest: Address,
        amount: Amount,
    ) -> Result<Amount, SettlementError>;

    /// Seconds until `account` may move its `synth` balance. Zero once the
    /// window has elapsed (or was never opened).
    fn seconds_left(&self, chain: &Chain, account: Address, synth: Address) -> u64;

    /// Whether every conversion of `account` into `synth` has been trued up.
    fn is_settled(&self, chain: &Chain, account: Address, synth: Address) -> bool;

    /// Performs the true-up. Fails with [`SettlementError::NotReady`] while
    /// the window is open; a no-op once nothing is pending.
    fn settle(
        &self,
        chain: &mut Chain,
        account: Address,
        synth: Address,
    ) -> Result<SettlementOutcome, SettlementError>;
}

// ---------------------------------------------------------------------------
// Reference Gate
// ---------------------------------------------------------------------------

/// Fixed-delay reference venue with an updatable price table.
#[derive(Debug)]
pub struct DelayedSettlementGate {
    prices: RwLock<HashMap<Address, AssetPrice>>,
    delay_secs: u64,
    fee_bps: u32,
}

impl Default for DelayedSettlementGate {
    fn default() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            delay_secs: DEFAULT_SETTLEMENT_DELAY_SECS,
            fee_bps: 0,
        }
    }
}

impl DelayedSettlementGate {
    /// A gate with the given waiting period and exchange fee.
    pub fn new(delay_secs: u64, fee_bps: u32) -> Result<Self, SettlementError> {
        if fee_bps > MAX_FEE_BPS {
            return Err(SettlementError::FeeTooHigh(fee_bps));
        }
        Ok(Self {
            prices: RwLock::new(HashMap::new()),
            delay_secs,
            fee_bps,
        })
    }

    /// Registers `synth` with an initial price, or updates its price.
    ///
    /// Price updates take effect immediately for new conversions and for
    /// the true-up of conversions already inside their window.
    pub fn set_price(&self, synth: Address, price: AssetPrice) {
        self.prices.write().insert(synth, price);
        debug!(%synth, price = price.price, "synth price set");
    }

    /// Current price of `synth`.
    pub fn price(&self, synth: Address) -> Option<AssetPrice> {
        self.prices.read().get(&synth).copied()
    }

    pub fn delay_secs(&self) -> u64 {
        self.delay_secs
    }

    pub fn fee_bps(&self) -> u32 {
        self.fee_bps
    }

    /// Every synth this gate knows, in no particular order.
    pub fn synths(&self) -> Vec<Address> {
        self.prices.read().keys().copied().collect()
    }

    fn rate(&self, source: Address, dest: Address, amount: Amount) -> Result<Amount, SettlementError> {
        if source == dest {
            return Err(SettlementError::SameSynth(source));
        }
        let prices = self.prices.read();
        let from = prices
            .get(&source)
            .copied()
            .ok_or(SettlementError::UnknownSynth(source))?;
        let to = prices
            .get(&dest)
            .copied()
            .ok_or(SettlementError::UnknownSynth(dest))?;
        let gross = convert(amount, from, to).ok_or(SettlementError::Overflow)?;
        apply_fee(gross, self.fee_bps).ok_or(SettlementError::Overflow)
    }
}

impl SettlementGate for DelayedSettlementGate {
    fn is_synth(&self, asset: Address) -> bool {
        self.prices.read().contains_key(&asset)
    }

    fn quote(
        &self,
        _chain: &Chain,
        source: Address,
        dest: Address,
        amount: Amount,
    ) -> Result<Amount, SettlementError> {
        self.rate(source, dest, amount)
    }

    fn exchange(
        &self,
        chain: &mut Chain,
        account: Address,
        source: Address,
        dest: Address,
        amount: Amount,
    ) -> Result<Amount, SettlementError> {
        let received = self.rate(source, dest, amount)?;

        chain.ledger_mut().burn(source, account, amount)?;
        chain.ledger_mut().mint(dest, account, received)?;
        let timestamp = chain.now();
        chain.settlement_mut().record(
            account,
            ExchangeEntry {
                source,
                dest,
                amount,
                received,
                timestamp,
            },
        );

        debug!(%account, %source, %dest, amount, received, "synth exchange recorded");
        Ok(received)
    }

    fn seconds_left(&self, chain: &Chain, account: Address, synth: Address) -> u64 {
        match chain.settlement().last_exchange_at(account, synth) {
            Some(at) => at
                .saturating_add(self.delay_secs)
                .saturating_sub(chain.now()),
            None => 0,
        }
    }

    fn is_settled(&self, chain: &Chain, account: Address, synth: Address) -> bool {
        !chain.settlement().has_pending(account, synth)
    }

    fn settle(
        &self,
        chain: &mut Chain,
        account: Address,
        synth: Address,
    ) -> Result<SettlementOutcome, SettlementError> {
        let seconds_left = self.seconds_left(chain, account, synth);
        if seconds_left > 0 {
            return Err(SettlementError::NotReady { seconds_left });
        }

        let entries = chain.settlement_mut().take(account, synth);
        if entries.is_empty() {
            return Ok(SettlementOutcome::default());
        }

        let mut owed: Amount = 0;
        let mut received: Amount = 0;
        for entry in &entries {
            let fair = self.rate(entry.source, entry.dest, entry.amount)?;
            owed = owed.checked_add(fair).ok_or(SettlementError::Overflow)?;
            received = received
                .checked_add(entry.received)
                .ok_or(SettlementError::Overflow)?;
        }

        let mut outcome = SettlementOutcome {
            entries: entries.len(),
            ..Default::default()
        };
        if owed > received {
            outcome.rebated = owed - received;
            chain.ledger_mut().mint(synth, account, outcome.rebated)?;
        } else if received > owed {
            let held = chain.balance_of(synth, account);
            outcome.reclaimed = (received - owed).min(held);
            chain.ledger_mut().burn(synth, account, outcome.reclaimed)?;
        }

        info!(
            %account,
            %synth,
            entries = outcome.entries,
            rebated = outcome.rebated,
            reclaimed = outcome.reclaimed,
            "settlement trued up"
        );
        Ok(outcome)
    }
}
