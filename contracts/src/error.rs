//! Registry error taxonomy.
//!
//! Every failure a caller can see is a [`SwapError`]. Each variant belongs
//! to exactly one [`ErrorKind`] and carries a short reason string that
//! never changes between releases, so tooling can branch on the cause
//! without parsing `Display` output.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use synthswap_protocol::exchange::ExchangeError;
use synthswap_protocol::ledger::LedgerError;
use synthswap_protocol::settlement::SettlementError;
use synthswap_protocol::Amount;
use thiserror::Error;

use crate::position::PositionId;
use crate::vault::VaultError;
use crate::vault_pool::VaultPoolError;

/// Coarse failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller is neither owner nor approved.
    Authorization,
    /// Settlement delay has not elapsed.
    NotReady,
    /// Unknown position, asset, synth, or pool.
    NotFound,
    /// Mismatch with existing state or duplicate registration.
    Conflict,
    /// Amount or attached value out of range.
    Bounds,
    /// Realized output below the caller's minimum.
    Slippage,
    /// A pool, gate, or ledger failure outside the categories above.
    Collaborator,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authorization => "authorization",
            ErrorKind::NotReady => "not_ready",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Bounds => "bounds",
            ErrorKind::Slippage => "slippage",
            ErrorKind::Collaborator => "collaborator",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by the position registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SwapError {
    // -- authorization ------------------------------------------------------
    /// Caller is not the owner, the approved address, or a blanket operator.
    #[error("caller {caller} is not owner or operator of {id}")]
    NotOwnerOrOperator {
        /// Offending caller.
        caller: Address,
        /// Position acted upon.
        id: PositionId,
    },

    /// Someone other than the registry tried to drive a vault.
    #[error("caller {caller} is not the vault controller")]
    NotController {
        /// Offending caller.
        caller: Address,
    },

    // -- not ready ----------------------------------------------------------
    /// The vault's settlement window is still open.
    #[error("settlement not finished: {seconds_left}s left")]
    SettlementPending {
        /// Seconds until the window closes.
        seconds_left: u64,
    },

    // -- not found ----------------------------------------------------------
    /// The position does not exist (never minted, or burned).
    #[error("unknown token id {0}")]
    UnknownTokenId(PositionId),

    /// The target synth has no registered pool.
    #[error("synth {0} has not been added")]
    UnknownSynth(Address),

    /// No registered pool lists the source asset.
    #[error("asset {0} is not routable")]
    UnknownAsset(Address),

    /// The settlement gate does not recognise the asset as a synth.
    #[error("{0} is not a synth")]
    NotASynth(Address),

    /// `add_synth` was given a pool that does not trade the synth.
    #[error("synth {synth} is not a coin of pool {pool}")]
    SynthNotInPool {
        /// Synth being added.
        synth: Address,
        /// Pool that was supplied.
        pool: Address,
    },

    /// The payout asset is not a coin of the held synth's pool.
    #[error("{target} cannot be reached from {synth}")]
    TargetNotTradable {
        /// Requested payout asset.
        target: Address,
        /// Synth held by the position.
        synth: Address,
    },

    // -- conflict -----------------------------------------------------------
    /// `add_synth` called twice for the same synth.
    #[error("synth {0} already added")]
    SynthAlreadyAdded(Address),

    /// A pool coin already routes to a different synth.
    #[error("coin {coin} already routes to {synth}")]
    CoinAlreadyRouted {
        /// Coin listed by the new pool.
        coin: Address,
        /// Synth it already routes to.
        synth: Address,
    },

    /// Top-up targets a synth other than the one the position holds.
    #[error("position {id} holds {held}, not {requested}")]
    IncorrectSynth {
        /// Position topped up.
        id: PositionId,
        /// Synth it holds.
        held: Address,
        /// Synth requested.
        requested: Address,
    },

    /// Top-up receiver differs from the current owner.
    #[error("receiver {receiver} is not the owner of {id}")]
    ReceiverNotOwner {
        /// Position topped up.
        id: PositionId,
        /// Receiver that was supplied.
        receiver: Address,
    },

    /// Source and target share an asset class; no synth conversion needed.
    #[error("{asset} and {synth} belong to the same asset class")]
    SameAssetClass {
        /// Source asset.
        asset: Address,
        /// Target synth.
        synth: Address,
    },

    /// Swap-out into the synth the position already holds.
    #[error("position already holds {0}; use withdraw")]
    SameSynth(Address),

    /// `transfer_from` named someone other than the current owner.
    #[error("{from} does not own {id}")]
    IncorrectOwner {
        /// Claimed owner.
        from: Address,
        /// Position transferred.
        id: PositionId,
    },

    // -- bounds -------------------------------------------------------------
    /// `transfer_from` with a zero `from`.
    #[error("cannot send from the zero address")]
    ZeroFrom,

    /// Transfer or mint to the zero address.
    #[error("cannot send to the zero address")]
    ZeroTo,

    /// `balance_of` queried for the zero address.
    #[error("balance query for the zero address")]
    ZeroAddressQuery,

    /// Withdrawal larger than the vault's live balance.
    #[error("requested {requested} exceeds underlying balance {available}")]
    ExceedsBalance {
        /// Amount requested.
        requested: Amount,
        /// Live vault balance.
        available: Amount,
    },

    /// Attached native value does not match the swap.
    #[error("incorrect native value: expected {expected}, attached {attached}")]
    IncorrectValue {
        /// Value the swap requires.
        expected: Amount,
        /// Value actually attached.
        attached: Amount,
    },

    // -- slippage -----------------------------------------------------------
    /// Realized output below the caller's minimum.
    #[error("slippage: expected at least {minimum}, received {received}")]
    Slippage {
        /// Caller-supplied minimum.
        minimum: Amount,
        /// Realized output.
        received: Amount,
    },

    // -- collaborators ------------------------------------------------------
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),

    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("settlement: {0}")]
    Settlement(SettlementError),

    #[error("vault pool: {0}")]
    Pool(VaultPoolError),
}

impl SwapError {
    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        use SwapError::*;
        match self {
            NotOwnerOrOperator { .. } | NotController { .. } => ErrorKind::Authorization,
            SettlementPending { .. } => ErrorKind::NotReady,
            UnknownTokenId(_)
            | UnknownSynth(_)
            | UnknownAsset(_)
            | NotASynth(_)
            | SynthNotInPool { .. }
            | TargetNotTradable { .. } => ErrorKind::NotFound,
            SynthAlreadyAdded(_)
            | CoinAlreadyRouted { .. }
            | IncorrectSynth { .. }
            | ReceiverNotOwner { .. }
            | SameAssetClass { .. }
            | SameSynth(_)
            | IncorrectOwner { .. } => ErrorKind::Conflict,
            ZeroFrom
            | ZeroTo
            | ZeroAddressQuery
            | ExceedsBalance { .. }
            | IncorrectValue { .. } => ErrorKind::Bounds,
            Slippage { .. } => ErrorKind::Slippage,
            Ledger(_) | Exchange(_) | Settlement(_) | Pool(_) => ErrorKind::Collaborator,
        }
    }

    /// Stable, machine-matchable reason.
    pub fn reason(&self) -> &'static str {
        use SwapError::*;
        match self {
            NotOwnerOrOperator { .. } => "Caller is not owner or operator",
            NotController { .. } => "Caller is not the vault controller",
            SettlementPending { .. } => "Settlement not finished",
            UnknownTokenId(_) => "Unknown Token ID",
            UnknownSynth(_) => "Unknown synth",
            UnknownAsset(_) => "Asset is not routable",
            NotASynth(_) => "Not a synth",
            SynthNotInPool { .. } => "Synth not in pool",
            TargetNotTradable { .. } => "Target not in synth pool",
            SynthAlreadyAdded(_) => "Synth already added",
            CoinAlreadyRouted { .. } => "Coin already routed",
            IncorrectSynth { .. } => "Incorrect synth for Token ID",
            ReceiverNotOwner { .. } => "Receiver is not owner",
            SameAssetClass { .. } => "Source and target share asset class",
            SameSynth(_) => "Target is the held synth",
            IncorrectOwner { .. } => "Incorrect owner for Token ID",
            ZeroFrom => "Cannot send from zero address",
            ZeroTo => "Cannot send to zero address",
            ZeroAddressQuery => "Query for zero address",
            ExceedsBalance { .. } => "Insufficient underlying balance",
            IncorrectValue { .. } => "Incorrect native value",
            Slippage { .. } => "Rekt by slippage",
            Ledger(_) => "Token transfer failed",
            Exchange(_) => "Exchange failed",
            Settlement(_) => "Settlement failed",
            Pool(_) => "Vault pool failure",
        }
    }
}

impl From<SettlementError> for SwapError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::NotReady { seconds_left } => SwapError::SettlementPending { seconds_left },
            other => SwapError::Settlement(other),
        }
    }
}

impl From<VaultPoolError> for SwapError {
    fn from(err: VaultPoolError) -> Self {
        SwapError::Pool(err)
    }
}

impl From<VaultError> for SwapError {
    fn from(err: VaultError) -> Self {
        match err {
            VaultError::NotController { caller } => SwapError::NotController { caller },
            VaultError::Settlement(e) => e.into(),
            VaultError::Exchange(e) => SwapError::Exchange(e),
            VaultError::Ledger(e) => SwapError::Ledger(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settlement_not_ready_maps_to_pending() {
        let err: SwapError = SettlementError::NotReady { seconds_left: 42 }.into();
        assert_eq!(err, SwapError::SettlementPending { seconds_left: 42 });
        assert_eq!(err.kind(), ErrorKind::NotReady);
        assert_eq!(err.reason(), "Settlement not finished");
    }

    #[test]
    fn other_settlement_errors_are_collaborator() {
        let err: SwapError = SettlementError::Overflow.into();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
    }

    #[test]
    fn vault_errors_map_by_variant() {
        let caller = Address::repeat_byte(0xa1);
        let err: SwapError = VaultError::NotController { caller }.into();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let err: SwapError =
            VaultError::Settlement(SettlementError::NotReady { seconds_left: 1 }).into();
        assert_eq!(err.kind(), ErrorKind::NotReady);
    }

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_string(&ErrorKind::NotReady).unwrap();
        assert_eq!(json, "\"not_ready\"");
        assert_eq!(ErrorKind::NotReady.to_string(), "not_ready");
    }

    #[test]
    fn slippage_reason_is_stable() {
        let err = SwapError::Slippage {
            minimum: 2,
            received: 1,
        };
        assert_eq!(err.reason(), "Rekt by slippage");
        assert_eq!(err.kind(), ErrorKind::Slippage);
    }
}
