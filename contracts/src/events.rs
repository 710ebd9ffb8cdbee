//! Registry events.
//!
//! Events accumulate in the registry's draft state during an operation and
//! only become visible when the operation commits. A reverted operation
//! therefore emits nothing.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::position::PositionId;

/// Something observable happened to a position or vault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum PositionEvent {
    /// Ownership change. Mint is `from == 0`, burn is `to == 0`, and a
    /// top-up of an existing position is `from == to == owner`.
    Transfer {
        from: Address,
        to: Address,
        token_id: PositionId,
    },
    /// Single-position approval set (or cleared with the zero address).
    Approval {
        owner: Address,
        approved: Address,
        token_id: PositionId,
    },
    /// Blanket operator approval toggled.
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
    /// A vault was deployed.
    NewVault { address: Address },
}

/// Ordered log of emitted events.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<PositionEvent>,
}

impl EventLog {
    pub fn emit(&mut self, event: PositionEvent) {
        debug!(?event, "event emitted");
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PositionEvent> {
        self.events.iter()
    }

    /// Drains every event emitted so far.
    pub fn take(&mut self) -> Vec<PositionEvent> {
        std::mem::take(&mut self.events)
    }
}
