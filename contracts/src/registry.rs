//! # SynthSwap Position Registry
//!
//! The registry turns a delay-gated synth balance into a transferable
//! position. Each position is backed by its own [`Vault`]; the vault's
//! address is the position id (plus a reuse generation, see
//! [`PositionId`]).
//!
//! ## Lifecycle
//!
//! ```text
//!  swap_into_synth ──► [Live] ──► swap_into_synth (top-up)
//!                        │   ──► transfer_from / approve
//!                        │   ──► withdraw / swap_from_synth (partial)
//!                        ▼
//!      withdraw / swap_from_synth (drain) ──► [Burned], vault released
//! ```
//!
//! ## Atomicity
//!
//! Every public operation works on a draft of the registry state inside
//! [`Chain::transact`]. Both drafts are committed only if the whole
//! operation succeeds, so a revert leaves no events, no ownership changes,
//! no vault assignments, and no balance moves behind. Drafts are full clones
//! of `RegistryState` and of the chain, so each operation is linear in
//! everything stored so far.
//!
//! Operations order their work as: checks, registry effects (acquire, mint,
//! burn, release), collaborator calls, post-condition checks. Collaborators
//! only ever see `&mut Chain`, so they cannot call back into the registry.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::Address;
use synthswap_protocol::chain::{CallContext, Chain};
use synthswap_protocol::config::{ERC165_INTERFACE_ID, ERC721_INTERFACE_ID, NATIVE_ASSET};
use synthswap_protocol::exchange::ExchangeRouter;
use synthswap_protocol::settlement::{SettlementGate, SettlementOutcome};
use synthswap_protocol::Amount;
use tracing::{info, warn};

use crate::error::SwapError;
use crate::events::{EventLog, PositionEvent};
use crate::ownership::OwnershipLedger;
use crate::position::{PositionId, TokenInfo};
use crate::vault::Vault;
use crate::vault_pool::VaultPool;

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Arguments of [`SynthSwap::swap_into_synth`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapInto {
    /// Asset pulled from the caller (the native sentinel for native value).
    pub source: Address,
    /// Synth the position ends up holding.
    pub synth: Address,
    /// Amount of `source`.
    pub amount: Amount,
    /// Minimum synth output.
    pub min_amount: Amount,
    /// Position owner. Defaults to the caller.
    pub receiver: Option<Address>,
    /// Existing position to top up.
    pub existing: Option<PositionId>,
}

impl SwapInto {
    pub fn new(source: Address, synth: Address, amount: Amount, min_amount: Amount) -> Self {
        Self {
            source,
            synth,
            amount,
            min_amount,
            receiver: None,
            existing: None,
        }
    }

    pub fn receiver(mut self, receiver: Address) -> Self {
        self.receiver = Some(receiver);
        self
    }

    /// Top up `id` instead of minting, if `id` is live.
    pub fn into_position(mut self, id: PositionId) -> Self {
        self.existing = Some(id);
        self
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the registry mutates. Cloned into a draft per operation.
#[derive(Clone, Debug)]
pub(crate) struct RegistryState {
    pub(crate) ownership: OwnershipLedger,
    pub(crate) pool: VaultPool,
    /// synth -> pool trading it.
    pub(crate) routers: HashMap<Address, Arc<dyn ExchangeRouter>>,
    /// coin -> synth of its asset class.
    pub(crate) swappable_synth: HashMap<Address, Address>,
    pub(crate) events: EventLog,
}

/// One in-flight operation: the registry draft plus the chain draft.
pub(crate) struct Tx<'a> {
    pub(crate) address: Address,
    pub(crate) gate: &'a dyn SettlementGate,
    pub(crate) state: &'a mut RegistryState,
    pub(crate) chain: &'a mut Chain,
}

/// The position registry.
#[derive(Debug)]
pub struct SynthSwap {
    address: Address,
    gate: Arc<dyn SettlementGate>,
    state: RegistryState,
}

impl SynthSwap {
    /// Creates a registry at `address` and pre-deploys `initial_vaults`
    /// vaults, each announced with a `NewVault` event.
    pub fn new(address: Address, gate: Arc<dyn SettlementGate>, initial_vaults: usize) -> Self {
        let mut state = RegistryState {
            ownership: OwnershipLedger::default(),
            pool: VaultPool::new(address),
            routers: HashMap::new(),
            swappable_synth: HashMap::new(),
            events: EventLog::default(),
        };
        for _ in 0..initial_vaults {
            let vault = state.pool.deploy();
            state.events.emit(PositionEvent::NewVault { address: vault });
        }
        info!(registry = %address, initial_vaults, "registry deployed");
        Self {
            address,
            gate,
            state,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn gate(&self) -> &Arc<dyn SettlementGate> {
        &self.gate
    }

    // -----------------------------------------------------------------------
    // Synth registration
    // -----------------------------------------------------------------------

    /// Registers `pool` as the venue for `synth` and routes every coin of
    /// the pool to `synth`. Permissionless: the checks below are the only
    /// gate.
    pub fn add_synth(&mut self, synth: Address, pool: Arc<dyn ExchangeRouter>) -> Result<(), SwapError> {
        self.mutate("add_synth", |state, gate| {
            if state.routers.contains_key(&synth) {
                return Err(SwapError::SynthAlreadyAdded(synth));
            }
            if !gate.is_synth(synth) {
                return Err(SwapError::NotASynth(synth));
            }
            let coins = pool.coins();
            if !coins.contains(&synth) {
                return Err(SwapError::SynthNotInPool {
                    synth,
                    pool: pool.address(),
                });
            }
            for coin in &coins {
                if let Some(&routed) = state.swappable_synth.get(coin) {
                    return Err(SwapError::CoinAlreadyRouted {
                        coin: *coin,
                        synth: routed,
                    });
                }
            }

            for coin in coins {
                state.swappable_synth.insert(coin, synth);
            }
            state.routers.insert(synth, pool);
            Ok(())
        })
    }

    /// Pool registered for `synth`.
    pub fn synth_pool(&self, synth: Address) -> Option<Address> {
        self.state.routers.get(&synth).map(|r| r.address())
    }

    pub(crate) fn router_for(&self, synth: Address) -> Result<Arc<dyn ExchangeRouter>, SwapError> {
        self.state
            .routers
            .get(&synth)
            .cloned()
            .ok_or(SwapError::UnknownSynth(synth))
    }

    /// Synth that `coin` routes to.
    pub fn swappable_synth(&self, coin: Address) -> Option<Address> {
        self.state.swappable_synth.get(&coin).copied()
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Converts `params.amount` of `params.source` into `params.synth` held
    /// in a vault, minting a new position or topping up an existing one.
    /// Returns the position id.
    pub fn swap_into_synth(
        &mut self,
        chain: &mut Chain,
        ctx: CallContext,
        params: SwapInto,
    ) -> Result<PositionId, SwapError> {
        self.execute(chain, "swap_into_synth", |tx| {
            // Attached value must match exactly what the swap consumes.
            let expected_value = if params.source == NATIVE_ASSET {
                params.amount
            } else {
                0
            };
            if ctx.value != expected_value {
                return Err(SwapError::IncorrectValue {
                    expected: expected_value,
                    attached: ctx.value,
                });
            }

            let source_synth = tx
                .swappable_synth(params.source)
                .ok_or(SwapError::UnknownAsset(params.source))?;
            tx.router(params.synth)?;
            if source_synth == params.synth {
                return Err(SwapError::SameAssetClass {
                    asset: params.source,
                    synth: params.synth,
                });
            }

            let receiver = params.receiver.unwrap_or(ctx.sender);
            let live = params.existing.filter(|id| tx.state.ownership.exists(*id));
            let (id, vault) = match live {
                Some(id) => {
                    let owner = tx.state.ownership.require_authorized(ctx.sender, id)?;
                    if receiver != owner {
                        return Err(SwapError::ReceiverNotOwner { id, receiver });
                    }
                    let vault = tx.vault_of(id)?;
                    let held = vault.held_asset().unwrap_or(Address::ZERO);
                    if held != params.synth {
                        return Err(SwapError::IncorrectSynth {
                            id,
                            held,
                            requested: params.synth,
                        });
                    }
                    tx.state.events.emit(PositionEvent::Transfer {
                        from: owner,
                        to: owner,
                        token_id: id,
                    });
                    (id, vault)
                }
                None => {
                    let acquired = tx.state.pool.acquire(params.synth);
                    if acquired.deployed {
                        tx.state.events.emit(PositionEvent::NewVault {
                            address: acquired.address,
                        });
                    }
                    let id = PositionId::new(acquired.address, acquired.generation);
                    tx.state.ownership.mint(receiver, id, &mut tx.state.events)?;
                    (id, tx.vault_of(id)?)
                }
            };

            // Pull the source, route it into the vault as the source-class
            // synth, then convert inside the vault.
            tx.chain
                .ledger_mut()
                .transfer(params.source, ctx.sender, tx.address, params.amount)?;
            let intermediate = if params.source == source_synth {
                tx.chain
                    .ledger_mut()
                    .transfer(source_synth, tx.address, vault.address(), params.amount)?;
                params.amount
            } else {
                let router = tx.router(source_synth)?;
                router.exchange_in(
                    tx.chain,
                    tx.address,
                    params.source,
                    source_synth,
                    params.amount,
                    vault.address(),
                )?
            };
            let received = vault.convert(tx.chain, tx.address, tx.gate, source_synth, intermediate)?;

            if received < params.min_amount {
                return Err(SwapError::Slippage {
                    minimum: params.min_amount,
                    received,
                });
            }
            info!(
                %id,
                source = %params.source,
                synth = %params.synth,
                amount = params.amount,
                received,
                "swapped into synth"
            );
            Ok(id)
        })
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Pays `amount` of the position's synth to `receiver` (default: the
    /// caller). Draining the vault burns the position.
    pub fn withdraw(
        &mut self,
        chain: &mut Chain,
        ctx: CallContext,
        id: PositionId,
        amount: Amount,
        receiver: Option<Address>,
    ) -> Result<(), SwapError> {
        self.execute(chain, "withdraw", |tx| {
            let vault = tx.prepare_outbound(ctx.sender, id, amount)?;
            let receiver = receiver.unwrap_or(ctx.sender);
            vault.withdraw(tx.chain, tx.address, receiver, amount)?;
            info!(%id, %receiver, amount, "withdrawn");
            Ok(())
        })
    }

    /// Swaps `amount` of the position's synth into `target` through the
    /// synth's pool and pays `receiver` (default: the caller). Returns the
    /// amount paid out.
    pub fn swap_from_synth(
        &mut self,
        chain: &mut Chain,
        ctx: CallContext,
        id: PositionId,
        target: Address,
        amount: Amount,
        min_amount: Amount,
        receiver: Option<Address>,
    ) -> Result<Amount, SwapError> {
        self.execute(chain, "swap_from_synth", |tx| {
            tx.state.ownership.require_authorized(ctx.sender, id)?;
            let synth = tx.vault_of(id)?.held_asset().unwrap_or(Address::ZERO);
            if target == synth {
                return Err(SwapError::SameSynth(synth));
            }
            let router = tx.router(synth)?;
            if !router.has_coin(target) {
                return Err(SwapError::TargetNotTradable { target, synth });
            }

            let vault = tx.prepare_outbound(ctx.sender, id, amount)?;
            let receiver = receiver.unwrap_or(ctx.sender);
            let received = vault.exchange_out(tx.chain, tx.address, router.as_ref(), target, amount, receiver)?;

            if received < min_amount {
                return Err(SwapError::Slippage {
                    minimum: min_amount,
                    received,
                });
            }
            info!(%id, %target, amount, received, "swapped from synth");
            Ok(received)
        })
    }

    // -----------------------------------------------------------------------
    // Settlement
    // -----------------------------------------------------------------------

    /// Trues up the position's vault through the gate.
    pub fn settle(&mut self, chain: &mut Chain, id: PositionId) -> Result<SettlementOutcome, SwapError> {
        self.execute(chain, "settle", |tx| {
            let vault = tx.vault_of(tx.live(id)?)?;
            Ok(vault.settle(tx.chain, tx.gate)?)
        })
    }

    /// Whether the position's vault has nothing left to true up. Always
    /// re-derived from the gate; non-live ids are never settled.
    ///
    /// An elapsed delay window alone does not count: the vault stays
    /// unsettled until [`settle`](Self::settle), `withdraw` or
    /// `swap_from_synth` trues it up.
    pub fn is_settled(&self, chain: &Chain, id: PositionId) -> bool {
        if !self.state.ownership.exists(id) {
            return false;
        }
        let address = id.vault_address();
        match self.state.pool.vault(address).and_then(Vault::held_asset) {
            Some(synth) => self.gate.is_settled(chain, address, synth),
            None => false,
        }
    }

    /// Owner, synth, and live balance of a position. Fails with
    /// [`SwapError::UnknownTokenId`] if `id` is not live.
    pub fn token_info(&self, chain: &Chain, id: PositionId) -> Result<TokenInfo, SwapError> {
        let owner = self.state.ownership.owner_of(id)?;
        let vault = self.state.pool.vault(id.vault_address());
        Ok(TokenInfo {
            owner,
            synth: vault.and_then(Vault::held_asset).unwrap_or(Address::ZERO),
            underlying_balance: vault.map(|v| v.balance(chain)).unwrap_or(0),
        })
    }

    // -----------------------------------------------------------------------
    // Non-fungible ownership
    // -----------------------------------------------------------------------

    pub fn balance_of(&self, owner: Address) -> Result<u64, SwapError> {
        self.state.ownership.balance_of(owner)
    }

    pub fn owner_of(&self, id: PositionId) -> Result<Address, SwapError> {
        self.state.ownership.owner_of(id)
    }

    pub fn get_approved(&self, id: PositionId) -> Result<Address, SwapError> {
        self.state.ownership.get_approved(id)
    }

    pub fn is_approved_for_all(&self, owner: Address, operator: Address) -> bool {
        self.state.ownership.is_approved_for_all(owner, operator)
    }

    pub fn transfer_from(
        &mut self,
        ctx: CallContext,
        from: Address,
        to: Address,
        id: PositionId,
    ) -> Result<(), SwapError> {
        self.mutate("transfer_from", |state, _| {
            state
                .ownership
                .transfer_from(ctx.sender, from, to, id, &mut state.events)
        })
    }

    pub fn approve(&mut self, ctx: CallContext, approved: Address, id: PositionId) -> Result<(), SwapError> {
        self.mutate("approve", |state, _| {
            state.ownership.approve(ctx.sender, approved, id, &mut state.events)
        })
    }

    pub fn set_approval_for_all(
        &mut self,
        ctx: CallContext,
        operator: Address,
        approved: bool,
    ) -> Result<(), SwapError> {
        self.mutate("set_approval_for_all", |state, _| {
            state
                .ownership
                .set_approval_for_all(ctx.sender, operator, approved, &mut state.events);
            Ok(())
        })
    }

    /// ERC-165 introspection.
    pub fn supports_interface(&self, interface_id: u32) -> bool {
        interface_id == ERC165_INTERFACE_ID || interface_id == ERC721_INTERFACE_ID
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    /// Current position backed by the vault at `address`, if any.
    pub fn position_of_vault(&self, address: Address) -> Option<PositionId> {
        self.state
            .pool
            .current_generation(address)
            .map(|generation| PositionId::new(address, generation))
    }

    pub fn vault(&self, address: Address) -> Option<&Vault> {
        self.state.pool.vault(address)
    }

    pub fn vault_pool(&self) -> &VaultPool {
        &self.state.pool
    }

    /// Number of live positions.
    pub fn live_positions(&self) -> usize {
        self.state.ownership.live_count()
    }

    /// Drains every committed event.
    pub fn take_events(&mut self) -> Vec<PositionEvent> {
        self.state.events.take()
    }

    // -----------------------------------------------------------------------
    // Transaction plumbing
    // -----------------------------------------------------------------------

    fn execute<T>(
        &mut self,
        chain: &mut Chain,
        op: &'static str,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, SwapError>,
    ) -> Result<T, SwapError> {
        let mut draft = self.state.clone();
        let address = self.address;
        let gate = self.gate.as_ref();

        let result = chain.transact(|chain| {
            let mut tx = Tx {
                address,
                gate,
                state: &mut draft,
                chain,
            };
            f(&mut tx)
        });

        match result {
            Ok(value) => {
                self.state = draft;
                Ok(value)
            }
            Err(err) => {
                warn!(op, kind = %err.kind(), reason = err.reason(), error = %err, "operation reverted");
                Err(err)
            }
        }
    }

    /// Like [`execute`](Self::execute) for operations that never touch the
    /// chain.
    fn mutate<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut RegistryState, &dyn SettlementGate) -> Result<T, SwapError>,
    ) -> Result<T, SwapError> {
        let mut draft = self.state.clone();
        match f(&mut draft, self.gate.as_ref()) {
            Ok(value) => {
                self.state = draft;
                info!(op, "committed");
                Ok(value)
            }
            Err(err) => {
                warn!(op, kind = %err.kind(), reason = err.reason(), error = %err, "operation reverted");
                Err(err)
            }
        }
    }
}

impl Tx<'_> {
    pub(crate) fn swappable_synth(&self, coin: Address) -> Option<Address> {
        self.state.swappable_synth.get(&coin).copied()
    }

    pub(crate) fn router(&self, synth: Address) -> Result<Arc<dyn ExchangeRouter>, SwapError> {
        self.state
            .routers
            .get(&synth)
            .cloned()
            .ok_or(SwapError::UnknownSynth(synth))
    }

    fn live(&self, id: PositionId) -> Result<PositionId, SwapError> {
        self.state.ownership.owner_of(id).map(|_| id)
    }

    fn vault_of(&self, id: PositionId) -> Result<Vault, SwapError> {
        self.state
            .pool
            .vault(id.vault_address())
            .cloned()
            .ok_or(SwapError::UnknownTokenId(id))
    }

    /// Shared preamble of `withdraw` and `swap_from_synth`: authorize, wait
    /// out (or finish) settlement, bound the amount, and burn on drain.
    fn prepare_outbound(&mut self, caller: Address, id: PositionId, amount: Amount) -> Result<Vault, SwapError> {
        self.state.ownership.require_authorized(caller, id)?;
        let vault = self.vault_of(id)?;
        let synth = vault.held_asset().unwrap_or(Address::ZERO);

        let seconds_left = self.gate.seconds_left(self.chain, vault.address(), synth);
        if seconds_left > 0 {
            return Err(SwapError::SettlementPending { seconds_left });
        }
        if !self.gate.is_settled(self.chain, vault.address(), synth) {
            vault.settle(self.chain, self.gate)?;
        }

        let available = vault.balance(self.chain);
        if amount > available {
            return Err(SwapError::ExceedsBalance {
                requested: amount,
                available,
            });
        }
        if amount > 0 && amount == available {
            self.state.ownership.burn(id, &mut self.state.events)?;
            self.state.pool.release(vault.address())?;
        }
        Ok(vault)
    }
}
