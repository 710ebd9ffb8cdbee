//! Non-fungible ownership ledger.
//!
//! Plain ERC-721 bookkeeping: owners, per-owner counts, single-position
//! approvals, and blanket operators. It knows nothing about vaults or
//! synths; the registry decides *when* to mint and burn, this module only
//! keeps the books straight and emits the matching events.

use std::collections::{HashMap, HashSet};

use alloy_primitives::Address;

use crate::error::SwapError;
use crate::events::{EventLog, PositionEvent};
use crate::position::PositionId;

#[derive(Clone, Debug, Default)]
pub struct OwnershipLedger {
    owners: HashMap<PositionId, Address>,
    balances: HashMap<Address, u64>,
    approvals: HashMap<PositionId, Address>,
    operators: HashSet<(Address, Address)>,
}

impl OwnershipLedger {
    /// Number of live positions owned by `owner`.
    pub fn balance_of(&self, owner: Address) -> Result<u64, SwapError> {
        if owner.is_zero() {
            return Err(SwapError::ZeroAddressQuery);
        }
        Ok(self.balances.get(&owner).copied().unwrap_or(0))
    }

    pub fn owner_of(&self, id: PositionId) -> Result<Address, SwapError> {
        self.owners
            .get(&id)
            .copied()
            .ok_or(SwapError::UnknownTokenId(id))
    }

    pub fn exists(&self, id: PositionId) -> bool {
        self.owners.contains_key(&id)
    }

    /// Total number of live positions.
    pub fn live_count(&self) -> usize {
        self.owners.len()
    }

    pub fn get_approved(&self, id: PositionId) -> Result<Address, SwapError> {
        self.owner_of(id)?;
        Ok(self.approvals.get(&id).copied().unwrap_or(Address::ZERO))
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.operators.contains(&(owner, operator))
    }

    /// Owner, approved address, or blanket operator of the owner.
    pub fn is_authorized(&self, caller: Address, id: PositionId) -> bool {
        let Some(&owner) = self.owners.get(&id) else {
            return false;
        };
        caller == owner
            || self.approvals.get(&id) == Some(&caller)
            || self.is_approved_for_all(owner, caller)
    }

    pub fn require_authorized(&self, caller: Address, id: PositionId) -> Result<Address, SwapError> {
        let owner = self.owner_of(id)?;
        if !self.is_authorized(caller, id) {
            return Err(SwapError::NotOwnerOrOperator { caller, id });
        }
        Ok(owner)
    }

    pub fn mint(&mut self, to: Address, id: PositionId, events: &mut EventLog) -> Result<(), SwapError> {
        if to.is_zero() {
            return Err(SwapError::ZeroTo);
        }
        self.owners.insert(id, to);
        *self.balances.entry(to).or_insert(0) += 1;
        events.emit(PositionEvent::Transfer {
            from: Address::ZERO,
            to,
            token_id: id,
        });
        Ok(())
    }

    pub fn burn(&mut self, id: PositionId, events: &mut EventLog) -> Result<(), SwapError> {
        let owner = self.owner_of(id)?;
        self.owners.remove(&id);
        self.approvals.remove(&id);
        self.decrement(owner);
        events.emit(PositionEvent::Transfer {
            from: owner,
            to: Address::ZERO,
            token_id: id,
        });
        Ok(())
    }

    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        id: PositionId,
        events: &mut EventLog,
    ) -> Result<(), SwapError> {
        if from.is_zero() {
            return Err(SwapError::ZeroFrom);
        }
        if to.is_zero() {
            return Err(SwapError::ZeroTo);
        }
        let owner = self.owner_of(id)?;
        if owner != from {
            return Err(SwapError::IncorrectOwner { from, id });
        }
        self.require_authorized(caller, id)?;

        self.approvals.remove(&id);
        self.decrement(from);
        *self.balances.entry(to).or_insert(0) += 1;
        self.owners.insert(id, to);
        events.emit(PositionEvent::Transfer {
            from,
            to,
            token_id: id,
        });
        Ok(())
    }

    /// Sets the single-position approval. Approving the zero address revokes.
    pub fn approve(
        &mut self,
        caller: Address,
        approved: Address,
        id: PositionId,
        events: &mut EventLog,
    ) -> Result<(), SwapError> {
        let owner = self.owner_of(id)?;
        if caller != owner && !self.is_approved_for_all(owner, caller) {
            return Err(SwapError::NotOwnerOrOperator { caller, id });
        }
        if approved.is_zero() {
            self.approvals.remove(&id);
        } else {
            self.approvals.insert(id, approved);
        }
        events.emit(PositionEvent::Approval {
            owner,
            approved,
            token_id: id,
        });
        Ok(())
    }

    pub fn set_approval_for_all(
        &mut self,
        owner: Address,
        operator: Address,
        approved: bool,
        events: &mut EventLog,
    ) {
        if approved {
            self.operators.insert((owner, operator));
        } else {
            self.operators.remove(&(owner, operator));
        }
        events.emit(PositionEvent::ApprovalForAll {
            owner,
            operator,
            approved,
        });
    }

    fn decrement(&mut self, owner: Address) {
        if let Some(count) = self.balances.get_mut(&owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.balances.remove(&owner);
            }
        }
    }
}
