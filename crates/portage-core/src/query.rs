//! Read-only query API for inspecting network state.
//!
//! Snapshot types are owned copies for UI and debug consumers -- no
//! references into the network, and nothing written to them flows back.

use crate::fixed::{Fixed64, Quantity};
use crate::id::{HostId, ResourceKind};
use crate::ledger::Capacity;
use crate::port::{Port, PortAccess};
use crate::production::CraftState;
use std::collections::BTreeMap;

/// A read-only view of one port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSnapshot {
    pub name: String,
    pub access: PortAccess,
    pub capacity: Capacity,
    pub locked_kind: Option<ResourceKind>,
    pub contents: BTreeMap<ResourceKind, Quantity>,
}

impl From<&Port> for PortSnapshot {
    fn from(port: &Port) -> Self {
        Self {
            name: port.name().to_string(),
            access: port.access(),
            capacity: port.ledger().capacity(),
            locked_kind: port.locked_kind(),
            contents: port.ledger().snapshot(),
        }
    }
}

/// A read-only view of one host and its behaviours.
#[derive(Debug, Clone, PartialEq)]
pub struct HostSnapshot {
    pub id: HostId,
    pub name: String,
    pub active: bool,
    pub ports: Vec<PortSnapshot>,
    /// Totals per kind across all ports.
    pub totals: BTreeMap<ResourceKind, Quantity>,
    pub incoming_links: u32,
    pub outgoing_links: u32,
    /// `None` when the host has no production unit.
    pub craft_state: Option<CraftState>,
    /// Craft progress as a 0..1 fraction; 0 without a production unit.
    pub craft_progress: Fixed64,
    /// `None` when the host has no upgrade gate.
    pub upgrade_level: Option<usize>,
}
