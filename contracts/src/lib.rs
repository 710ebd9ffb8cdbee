//! # SynthSwap Contracts
//!
//! The position/vault lifecycle engine. A caller swaps any listed coin into
//! a synth of another asset class; the synth lands in a dedicated vault,
//! and ownership of that vault's delay-gated balance is a non-fungible
//! position that can be topped up, transferred, partially withdrawn,
//! re-routed into another coin, or drained.
//!
//! - **registry**: [`SynthSwap`]: every public operation.
//! - **vault / vault_pool**: custody accounts and their allocator
//!   (deploy on demand, recycle on drain).
//! - **ownership**: ERC-721 style owner/approval books.
//! - **position**: 256-bit ids derived from vault address + generation.
//! - **quoting**: dry runs that match the mutating calls exactly.
//! - **events / error**: what callers observe.
//!
//! ## Design Principles
//!
//! 1. The registry never caches balances or readiness. Vault balances are
//!    read from the ledger, readiness from the settlement gate.
//! 2. Every operation is all-or-nothing. Registry state and chain state
//!    are drafted together and committed together.
//! 3. Collaborators (pools, the gate) get a `&mut Chain` and nothing else.

pub mod error;
pub mod events;
pub mod ownership;
pub mod position;
pub mod quoting;
pub mod registry;
pub mod vault;
pub mod vault_pool;

pub use error::{ErrorKind, SwapError};
pub use events::PositionEvent;
pub use position::{PositionId, TokenInfo};
pub use registry::{SwapInto, SynthSwap};
