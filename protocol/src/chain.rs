//! # Chain State
//!
//! The committed world every operation runs against: block timestamp, token
//! ledger, and the settlement book of pending synth conversions.
//!
//! ## Atomicity
//!
//! [`Chain::transact`] runs a closure on a draft copy of the world and only
//! swaps it in when the closure returns `Ok`. A failed operation therefore
//! leaves no trace: no balance moves and no settlement entries.
//!
//! The draft is a full clone, so a transaction costs time proportional to
//! the whole ledger and settlement book. That is fine for a devnet; a
//! long-lived deployment would want an undo journal instead.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ledger::TokenLedger;
use crate::settlement::SettlementBook;
use crate::Amount;

/// Who is calling and how much native value they attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Transaction sender.
    pub sender: Address,
    /// Native value attached to the call (in the native asset's smallest
    /// unit). Only inbound swaps from the native asset may carry value.
    pub value: Amount,
}

impl CallContext {
    /// A call with no attached value.
    pub fn new(sender: Address) -> Self {
        Self { sender, value: 0 }
    }

    /// Attach native value to the call.
    pub fn with_value(mut self, value: Amount) -> Self {
        self.value = value;
        self
    }
}

/// Committed world state.
#[derive(Clone, Debug, Default)]
pub struct Chain {
    /// Current block timestamp (unix seconds).
    timestamp: u64,
    /// Balances of every asset.
    ledger: TokenLedger,
    /// Conversions still inside (or awaiting true-up after) their delay
    /// window.
    settlement: SettlementBook,
}

impl Chain {
    /// Creates an empty chain at the given genesis timestamp.
    pub fn new(genesis_timestamp: u64) -> Self {
        Self {
            timestamp: genesis_timestamp,
            ledger: TokenLedger::new(),
            settlement: SettlementBook::default(),
        }
    }

    /// Current block timestamp.
    pub fn now(&self) -> u64 {
        self.timestamp
    }

    /// Moves the clock forward. Time never runs backwards, so this only
    /// takes a delta.
    pub fn advance_time(&mut self, secs: u64) {
        self.timestamp = self.timestamp.saturating_add(secs);
        debug!(timestamp = self.timestamp, advanced = secs, "block time advanced");
    }

    pub fn ledger(&self) -> &TokenLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut TokenLedger {
        &mut self.ledger
    }

    pub fn settlement(&self) -> &SettlementBook {
        &self.settlement
    }

    pub fn settlement_mut(&mut self) -> &mut SettlementBook {
        &mut self.settlement
    }

    /// Shorthand for `ledger().balance_of(asset, account)`.
    pub fn balance_of(&self, asset: Address, account: Address) -> Amount {
        self.ledger.balance_of(asset, account)
    }

    /// Runs `f` against a draft of the world and commits it only on success.
    pub fn transact<T, E>(
        &mut self,
        f: impl FnOnce(&mut Chain) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut draft = self.clone();
        let out = f(&mut draft)?;
        *self = draft;
        Ok(out)
    }
}
