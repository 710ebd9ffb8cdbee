//! # Vault Pool
//!
//! Deploys vaults on demand and recycles drained ones.
//!
//! New vaults land at the CREATE address of the controller and a
//! monotonically increasing nonce, so every vault address is predictable
//! and never collides. Unassigned vaults sit in free lists partitioned by
//! the synth they last held (never-used vaults form their own partition).
//!
//! ## Recycling order
//!
//! 1. Most recently released vault that last held the requested synth.
//! 2. Otherwise the most recently released vault of any other partition,
//!    pre-deployed never-used vaults included.
//! 3. Otherwise deploy a fresh vault.
//!
//! A vault is either in exactly one free list or backs exactly one live
//! position; `acquire` and `release` are the only transitions.

use std::collections::HashMap;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::vault::Vault;

/// Errors raised by the vault pool.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultPoolError {
    /// Tried to release a vault that is not backing a position.
    #[error("vault {0} is not assigned")]
    VaultNotAssigned(Address),

    /// The address was never deployed by this pool.
    #[error("vault {0} was not deployed by this pool")]
    UnknownVault(Address),
}

/// Result of [`VaultPool::acquire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquired {
    /// Vault address.
    pub address: Address,
    /// Tenancy number, starting at 0 for the vault's first assignment.
    pub generation: u64,
    /// Whether the vault was deployed by this call.
    pub deployed: bool,
}

#[derive(Clone, Debug)]
struct VaultSlot {
    vault: Vault,
    /// Times this vault has been acquired.
    tenancies: u64,
    assigned: bool,
}

/// Allocator of custody vaults.
#[derive(Clone, Debug)]
pub struct VaultPool {
    controller: Address,
    nonce: u64,
    slots: HashMap<Address, VaultSlot>,
    /// Last-held synth -> `(release sequence, vault)` stack.
    free: HashMap<Option<Address>, Vec<(u64, Address)>>,
    release_seq: u64,
}

impl VaultPool {
    /// An empty pool whose vaults are controlled by `controller`.
    pub fn new(controller: Address) -> Self {
        Self {
            controller,
            nonce: 0,
            slots: HashMap::new(),
            free: HashMap::new(),
            release_seq: 0,
        }
    }

    /// Deploys an unassigned vault into the never-used partition.
    pub fn deploy(&mut self) -> Address {
        let address = self.create_vault();
        self.push_free(None, address);
        address
    }

    /// Hands out a vault for `asset`, recycling where possible.
    pub fn acquire(&mut self, asset: Address) -> Acquired {
        let (address, deployed) = match self.pop_free(asset) {
            Some(address) => (address, false),
            None => (self.create_vault(), true),
        };

        let mut generation = 0;
        if let Some(slot) = self.slots.get_mut(&address) {
            generation = slot.tenancies;
            slot.tenancies += 1;
            slot.assigned = true;
            slot.vault.assign(asset);
        }

        debug!(vault = %address, %asset, generation, deployed, "vault acquired");
        Acquired {
            address,
            generation,
            deployed,
        }
    }

    /// Returns an assigned vault to the free list of its held asset.
    pub fn release(&mut self, address: Address) -> Result<(), VaultPoolError> {
        let slot = self
            .slots
            .get_mut(&address)
            .ok_or(VaultPoolError::UnknownVault(address))?;
        if !slot.assigned {
            return Err(VaultPoolError::VaultNotAssigned(address));
        }
        slot.assigned = false;
        let held = slot.vault.held_asset();
        self.push_free(held, address);

        debug!(vault = %address, asset = ?held, "vault released");
        Ok(())
    }

    pub fn vault(&self, address: Address) -> Option<&Vault> {
        self.slots.get(&address).map(|s| &s.vault)
    }

    pub fn is_assigned(&self, address: Address) -> bool {
        self.slots.get(&address).is_some_and(|s| s.assigned)
    }

    /// Generation of the tenancy currently backed by `address`, or `None`
    /// if the vault is unassigned or unknown.
    pub fn current_generation(&self, address: Address) -> Option<u64> {
        self.slots
            .get(&address)
            .filter(|s| s.assigned)
            .map(|s| s.tenancies - 1)
    }

    pub fn deployed_count(&self) -> usize {
        self.slots.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    pub fn assigned_count(&self) -> usize {
        self.deployed_count() - self.free_count()
    }

    /// Nonce the next deployment will use.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    fn create_vault(&mut self) -> Address {
        let address = self.controller.create(self.nonce);
        self.nonce += 1;
        self.slots.insert(
            address,
            VaultSlot {
                vault: Vault::new(address, self.controller),
                tenancies: 0,
                assigned: false,
            },
        );
        debug!(vault = %address, nonce = self.nonce - 1, "vault deployed");
        address
    }

    fn push_free(&mut self, partition: Option<Address>, address: Address) {
        let seq = self.release_seq;
        self.release_seq += 1;
        self.free.entry(partition).or_default().push((seq, address));
    }

    fn pop_free(&mut self, asset: Address) -> Option<Address> {
        if let Some((_, address)) = self.free.get_mut(&Some(asset)).and_then(Vec::pop) {
            return Some(address);
        }

        let partition = self
            .free
            .iter()
            .filter_map(|(key, stack)| stack.last().map(|(seq, _)| (*seq, *key)))
            .max_by_key(|(seq, _)| *seq)
            .map(|(_, key)| key)?;
        self.free
            .get_mut(&partition)
            .and_then(Vec::pop)
            .map(|(_, address)| address)
    }
}
