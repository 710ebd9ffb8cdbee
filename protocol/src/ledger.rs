//! # Token Ledger
//!
//! Multi-asset balance book for every account on the chain: users, pools,
//! vaults, and the registry itself. The native gas asset is just another
//! entry keyed by [`NATIVE_ASSET`], which keeps the payout paths identical
//! for native and token transfers.
//!
//! The ledger enforces two things and nothing else: you can never move more
//! than you hold, and no balance or supply ever wraps. Allowances are not
//! modelled; the registry is the only party that pulls funds, and it does
//! so on behalf of the transaction sender.

use std::collections::HashMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{NATIVE_ASSET, NATIVE_DECIMALS, NATIVE_SYMBOL};
use crate::Amount;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The asset was never registered with the ledger.
    #[error("unknown asset {0}")]
    UnknownAsset(Address),

    /// An asset with this address is already registered.
    #[error("asset {0} is already registered")]
    DuplicateAsset(Address),

    /// Attempted to debit more than the account holds.
    #[error("insufficient balance: {account} holds {available} of {asset}, requested {requested}")]
    InsufficientBalance {
        /// Asset being debited.
        asset: Address,
        /// Account being debited.
        account: Address,
        /// Current balance.
        available: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// A credit would overflow the balance or the total supply.
    #[error("balance overflow crediting {amount} of {asset}")]
    Overflow {
        /// Asset being credited.
        asset: Address,
        /// Amount that caused the overflow.
        amount: Amount,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Display metadata and supply for a registered asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Ticker symbol, e.g. "sBTC".
    pub symbol: String,
    /// Decimal places. Display only -- the ledger never divides.
    pub decimals: u8,
    /// Current total supply in smallest units.
    pub total_supply: Amount,
}

/// Balance book for every asset and account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLedger {
    /// Registered assets keyed by their address.
    assets: HashMap<Address, AssetInfo>,
    /// `(asset, account) -> balance`. Zero balances are pruned.
    balances: HashMap<(Address, Address), Amount>,
}

impl TokenLedger {
    /// Creates a ledger that already knows the native asset.
    pub fn new() -> Self {
        let mut ledger = Self::default();
        ledger.assets.insert(
            NATIVE_ASSET,
            AssetInfo {
                symbol: NATIVE_SYMBOL.to_string(),
                decimals: NATIVE_DECIMALS,
                total_supply: 0,
            },
        );
        ledger
    }

    /// Registers a new asset with zero supply.
    pub fn register_asset(
        &mut self,
        asset: Address,
        symbol: impl Into<String>,
        decimals: u8,
    ) -> Result<(), LedgerError> {
        if self.assets.contains_key(&asset) {
            return Err(LedgerError::DuplicateAsset(asset));
        }
        self.assets.insert(
            asset,
            AssetInfo {
                symbol: symbol.into(),
                decimals,
                total_supply: 0,
            },
        );
        Ok(())
    }

    /// Metadata for an asset, or `None` if it was never registered.
    pub fn asset(&self, asset: Address) -> Option<&AssetInfo> {
        self.assets.get(&asset)
    }

    /// Balance of `account` in `asset`. Unknown assets and accounts read as 0.
    pub fn balance_of(&self, asset: Address, account: Address) -> Amount {
        self.balances.get(&(asset, account)).copied().unwrap_or(0)
    }

    /// Total supply of `asset`, or 0 if unknown.
    pub fn total_supply(&self, asset: Address) -> Amount {
        self.assets.get(&asset).map(|a| a.total_supply).unwrap_or(0)
    }

    /// Moves `amount` of `asset` from one account to another.
    ///
    /// A zero-amount transfer is a no-op that still validates the asset.
    pub fn transfer(
        &mut self,
        asset: Address,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.ensure_known(asset)?;
        if amount == 0 || from == to {
            return self.ensure_covers(asset, from, amount);
        }
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    /// Creates new supply. Used by the settlement gate for synth issuance
    /// and rebates, and by fixtures/faucets.
    pub fn mint(&mut self, asset: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        let info = self
            .assets
            .get_mut(&asset)
            .ok_or(LedgerError::UnknownAsset(asset))?;
        info.total_supply = info
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset, amount })?;
        self.credit(asset, to, amount)
    }

    /// Destroys supply held by `from`.
    pub fn burn(&mut self, asset: Address, from: Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_known(asset)?;
        self.debit(asset, from, amount)?;
        if let Some(info) = self.assets.get_mut(&asset) {
            info.total_supply = info.total_supply.saturating_sub(amount);
        }
        Ok(())
    }

    fn ensure_known(&self, asset: Address) -> Result<(), LedgerError> {
        if self.assets.contains_key(&asset) {
            Ok(())
        } else {
            Err(LedgerError::UnknownAsset(asset))
        }
    }

    fn ensure_covers(&self, asset: Address, account: Address, amount: Amount) -> Result<(), LedgerError> {
        let available = self.balance_of(asset, account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                asset,
                account,
                available,
                requested: amount,
            });
        }
        Ok(())
    }

    fn debit(&mut self, asset: Address, account: Address, amount: Amount) -> Result<(), LedgerError> {
        self.ensure_covers(asset, account, amount)?;
        let remaining = self.balance_of(asset, account) - amount;
        if remaining == 0 {
            self.balances.remove(&(asset, account));
        } else {
            self.balances.insert((asset, account), remaining);
        }
        Ok(())
    }

    fn credit(&mut self, asset: Address, account: Address, amount: Amount) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        let balance = self.balances.entry((asset, account)).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset, amount })?;
        Ok(())
    }
}
