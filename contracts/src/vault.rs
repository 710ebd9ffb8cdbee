//! # Vault
//!
//! Minimal custody account behind each position. A vault holds one synth at
//! a time and only ever moves it on instruction from its controller (the
//! registry). Its balance lives in the chain's token ledger at the vault's
//! address; the vault itself stores nothing but who controls it and which
//! asset it last held.
//!
//! Vaults are never destroyed. Draining one zeroes its balance and the
//! registry hands it back to the pool for reuse.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use synthswap_protocol::chain::Chain;
use synthswap_protocol::exchange::{ExchangeError, ExchangeRouter};
use synthswap_protocol::ledger::LedgerError;
use synthswap_protocol::settlement::{SettlementError, SettlementGate, SettlementOutcome};
use synthswap_protocol::Amount;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by a vault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Only the controller may move funds.
    #[error("caller {caller} is not the vault controller")]
    NotController {
        /// Offending caller.
        caller: Address,
    },

    /// Settlement gate rejected the call.
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// Pool rejected the payout swap.
    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    /// Ledger rejected the transfer.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// A reusable custody vault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    address: Address,
    controller: Address,
    /// Synth currently (or, while unassigned, last) held. `None` until the
    /// first assignment.
    held_asset: Option<Address>,
}

impl Vault {
    pub(crate) fn new(address: Address, controller: Address) -> Self {
        Self {
            address,
            controller,
            held_asset: None,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn held_asset(&self) -> Option<Address> {
        self.held_asset
    }

    /// Live ledger balance of the held asset.
    pub fn balance(&self, chain: &Chain) -> Amount {
        self.held_asset
            .map(|asset| chain.balance_of(asset, self.address))
            .unwrap_or(0)
    }

    /// Asks the gate to true up the held balance. Anyone may call this;
    /// calling it again after a successful true-up does nothing.
    pub fn settle(
        &self,
        chain: &mut Chain,
        gate: &dyn SettlementGate,
    ) -> Result<SettlementOutcome, VaultError> {
        let Some(asset) = self.held_asset else {
            return Ok(SettlementOutcome::default());
        };
        Ok(gate.settle(chain, self.address, asset)?)
    }

    /// Pays `amount` of the held asset to `to`.
    pub fn withdraw(
        &self,
        chain: &mut Chain,
        caller: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), VaultError> {
        self.only_controller(caller)?;
        if let Some(asset) = self.held_asset {
            chain.ledger_mut().transfer(asset, self.address, to, amount)?;
            debug!(vault = %self.address, %to, amount, "vault withdraw");
        }
        Ok(())
    }

    /// Converts `amount` of `source_synth` sitting in the vault into the held
    /// synth through the gate, opening its settlement window.
    pub fn convert(
        &self,
        chain: &mut Chain,
        caller: Address,
        gate: &dyn SettlementGate,
        source_synth: Address,
        amount: Amount,
    ) -> Result<Amount, VaultError> {
        self.only_controller(caller)?;
        let Some(dest) = self.held_asset else {
            return Ok(0);
        };
        let received = gate.exchange(chain, self.address, source_synth, dest, amount)?;
        debug!(vault = %self.address, %source_synth, %dest, amount, received, "vault convert");
        Ok(received)
    }

    /// Swaps `amount` of the held synth into `target` through `router` and
    /// pays the output straight to `receiver`.
    pub fn exchange_out(
        &self,
        chain: &mut Chain,
        caller: Address,
        router: &dyn ExchangeRouter,
        target: Address,
        amount: Amount,
        receiver: Address,
    ) -> Result<Amount, VaultError> {
        self.only_controller(caller)?;
        let Some(synth) = self.held_asset else {
            return Ok(0);
        };
        Ok(router.exchange_out(chain, self.address, synth, target, amount, receiver)?)
    }

    pub(crate) fn assign(&mut self, asset: Address) {
        self.held_asset = Some(asset);
    }

    fn only_controller(&self, caller: Address) -> Result<(), VaultError> {
        if caller != self.controller {
            return Err(VaultError::NotController { caller });
        }
        Ok(())
    }
}
