//! Inventory hosts: ordered ports plus host-level admission.
//!
//! Admission is layered. The host whitelist is checked first, then a
//! dedicated upgrade port claims the currently required upgrade material,
//! and otherwise the first input-capable port in declared order is chosen.
//! The chosen port re-validates compatibility before anything is stored.

use crate::error::ConfigError;
use crate::fixed::{Fixed64, Quantity};
use crate::id::{PortIndex, ResourceKind};
use crate::ledger::Capacity;
use crate::port::{Port, PortConfig, PortEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Which resource kinds a host admits at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    #[default]
    AcceptAll,
    Whitelist(BTreeSet<ResourceKind>),
}

impl Admission {
    pub fn admits(&self, kind: ResourceKind) -> bool {
        match self {
            Admission::AcceptAll => true,
            Admission::Whitelist(kinds) => kinds.contains(&kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection bookkeeping
// ---------------------------------------------------------------------------

/// Side of a physical link, as seen from a host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// Bounded counts of physical links. Independent of what the ports hold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCounters {
    pub incoming: u32,
    pub max_incoming: u32,
    pub outgoing: u32,
    pub max_outgoing: u32,
}

impl ConnectionCounters {
    pub fn new(max_incoming: u32, max_outgoing: u32) -> Self {
        Self {
            incoming: 0,
            max_incoming,
            outgoing: 0,
            max_outgoing,
        }
    }

    pub fn current(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Incoming => self.incoming,
            Direction::Outgoing => self.outgoing,
        }
    }

    /// Count one more link. Returns `false` when the bound is reached.
    pub fn register(&mut self, direction: Direction) -> bool {
        let (current, max) = match direction {
            Direction::Incoming => (&mut self.incoming, self.max_incoming),
            Direction::Outgoing => (&mut self.outgoing, self.max_outgoing),
        };
        if *current >= max {
            return false;
        }
        *current += 1;
        true
    }

    /// Release one link. Returns `false` when nothing was registered.
    pub fn unregister(&mut self, direction: Direction) -> bool {
        let current = match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        };
        if *current == 0 {
            return false;
        }
        *current -= 1;
        true
    }
}

// ---------------------------------------------------------------------------
// Host configuration
// ---------------------------------------------------------------------------

/// Serialized description of a host, handed over by the spawn system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub name: String,
    pub ports: Vec<PortConfig>,
    #[serde(default)]
    pub admission: Admission,
    #[serde(default)]
    pub max_incoming: u32,
    #[serde(default)]
    pub max_outgoing: u32,
    /// Name of the port dedicated to upgrade deposits.
    #[serde(default)]
    pub upgrade_port: Option<String>,
}

impl HostConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ports: Vec::new(),
            admission: Admission::AcceptAll,
            max_incoming: 0,
            max_outgoing: 0,
            upgrade_port: None,
        }
    }

    pub fn with_port(mut self, port: PortConfig) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_admission(mut self, admission: Admission) -> Self {
        self.admission = admission;
        self
    }

    pub fn with_connections(mut self, max_incoming: u32, max_outgoing: u32) -> Self {
        self.max_incoming = max_incoming;
        self.max_outgoing = max_outgoing;
        self
    }

    pub fn with_upgrade_port(mut self, name: impl Into<String>) -> Self {
        self.upgrade_port = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() {
            return Err(ConfigError::NoPorts {
                host: self.name.clone(),
            });
        }
        let mut seen = BTreeSet::new();
        for port in &self.ports {
            if !seen.insert(port.name.as_str()) {
                return Err(ConfigError::DuplicatePort {
                    host: self.name.clone(),
                    port: port.name.clone(),
                });
            }
            if let Capacity::Bounded(cap) = port.capacity
                && cap <= Fixed64::ZERO
            {
                return Err(ConfigError::ZeroCapacity {
                    host: self.name.clone(),
                    port: port.name.clone(),
                });
            }
        }
        if let Some(upgrade) = &self.upgrade_port
            && !seen.contains(upgrade.as_str())
        {
            return Err(ConfigError::UnknownUpgradePort {
                host: self.name.clone(),
                port: upgrade.clone(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InventoryHost
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InventoryHost {
    name: String,
    ports: Vec<Port>,
    admission: Admission,
    connections: ConnectionCounters,
    upgrade_port: Option<PortIndex>,
    /// Material the upgrade gate currently waits for, if a gate is attached.
    upgrade_requirement: Option<ResourceKind>,
}

impl InventoryHost {
    /// Build the host and initialize its ports. This is the one-time init
    /// hook; it runs before the host takes part in any tick.
    pub fn from_config(config: &HostConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let ports: Vec<Port> = config.ports.iter().map(Port::new).collect();
        let upgrade_port = config.upgrade_port.as_ref().and_then(|name| {
            ports
                .iter()
                .position(|p| p.name() == name)
                .map(PortIndex)
        });
        Ok(Self {
            name: config.name.clone(),
            ports,
            admission: config.admission.clone(),
            connections: ConnectionCounters::new(config.max_incoming, config.max_outgoing),
            upgrade_port,
            upgrade_requirement: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, index: PortIndex) -> Option<&Port> {
        self.ports.get(index.0)
    }

    pub fn port_mut(&mut self, index: PortIndex) -> Option<&mut Port> {
        self.ports.get_mut(index.0)
    }

    pub fn port_index(&self, name: &str) -> Option<PortIndex> {
        self.ports.iter().position(|p| p.name() == name).map(PortIndex)
    }

    pub fn get_port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    /// Indices of ports that accept deposits, in declared order.
    pub fn input_ports(&self) -> Vec<PortIndex> {
        self.ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.access().accepts_deposits())
            .map(|(i, _)| PortIndex(i))
            .collect()
    }

    /// Indices of ports that provide withdrawals, in declared order.
    pub fn output_ports(&self) -> Vec<PortIndex> {
        self.ports
            .iter()
            .enumerate()
            .filter(|(_, p)| p.access().provides_withdrawals())
            .map(|(i, _)| PortIndex(i))
            .collect()
    }

    /// First input-capable port.
    pub fn get_input(&self) -> Option<PortIndex> {
        self.input_ports().first().copied()
    }

    /// First output-capable port.
    pub fn get_output(&self) -> Option<PortIndex> {
        self.output_ports().first().copied()
    }

    /// The output port the next physical connection should claim: the
    /// output-capable port at the position given by the outgoing counter.
    pub fn get_next_output_port(&self) -> Option<PortIndex> {
        let next = self.connections.outgoing as usize;
        self.output_ports().get(next).copied()
    }

    pub fn connections(&self) -> &ConnectionCounters {
        &self.connections
    }

    pub fn register_connection(&mut self, direction: Direction) -> bool {
        self.connections.register(direction)
    }

    pub fn unregister_connection(&mut self, direction: Direction) -> bool {
        self.connections.unregister(direction)
    }

    pub fn upgrade_port(&self) -> Option<PortIndex> {
        self.upgrade_port
    }

    pub fn upgrade_requirement(&self) -> Option<ResourceKind> {
        self.upgrade_requirement
    }

    pub fn set_upgrade_requirement(&mut self, kind: Option<ResourceKind>) {
        self.upgrade_requirement = kind;
    }

    /// Pick the target port for a deposit, or `None` when the host refuses.
    pub fn route(&self, kind: ResourceKind) -> Option<PortIndex> {
        if !self.admission.admits(kind) {
            return None;
        }
        if let (Some(port), Some(required)) = (self.upgrade_port, self.upgrade_requirement)
            && required == kind
        {
            return Some(port);
        }
        self.ports
            .iter()
            .enumerate()
            .find(|(i, p)| {
                p.access().accepts_deposits() && Some(PortIndex(*i)) != self.upgrade_port
            })
            .map(|(i, _)| PortIndex(i))
    }

    /// Deposit through the admission layers. Returns the amount stored.
    pub fn insert(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        let Some(target) = self.route(kind) else {
            return Fixed64::ZERO;
        };
        let port = &mut self.ports[target.0];
        if !port.can_accept(kind, amount) {
            return Fixed64::ZERO;
        }
        port.add(kind, amount)
    }

    /// How much of `amount` an [`insert`](Self::insert) would store right
    /// now, without storing anything.
    pub fn acceptance(&self, kind: ResourceKind, amount: Quantity) -> Quantity {
        let Some(port) = self.route(kind).and_then(|i| self.port(i)) else {
            return Fixed64::ZERO;
        };
        if !port.can_accept(kind, amount) {
            return Fixed64::ZERO;
        }
        match port.free_space_for(kind) {
            Some(space) => amount.min(space),
            None => amount,
        }
    }

    pub fn try_insert(&mut self, kind: ResourceKind, amount: Quantity) -> bool {
        self.insert(kind, amount) > Fixed64::ZERO
    }

    /// Total held per kind across every port. An owned copy; writing to it
    /// has no effect on the host.
    pub fn get_all(&self) -> BTreeMap<ResourceKind, Quantity> {
        let mut totals = BTreeMap::new();
        for port in &self.ports {
            for (kind, amount) in port.ledger().snapshot() {
                let total = totals.entry(kind).or_insert(Fixed64::ZERO);
                *total = total.saturating_add(amount);
            }
        }
        totals
    }

    /// Sum of `kind` over the given ports.
    pub fn stock_in(&self, ports: &[PortIndex], kind: ResourceKind) -> Quantity {
        ports
            .iter()
            .filter_map(|i| self.port(*i))
            .fold(Fixed64::ZERO, |total, p| total.saturating_add(p.get(kind)))
    }

    /// Take every port event recorded since the last drain, tagged with the
    /// port it came from, in port order.
    pub fn drain_events(&mut self) -> Vec<(PortIndex, PortEvent)> {
        let mut events = Vec::new();
        for (i, port) in self.ports.iter_mut().enumerate() {
            events.extend(port.drain_events().into_iter().map(|e| (PortIndex(i), e)));
        }
        events
    }
}
