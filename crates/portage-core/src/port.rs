//! Typed, directional access points.
//!
//! A [`Port`] exclusively owns one [`Ledger`] and locks itself to the first
//! resource kind successfully deposited. Every change is recorded in the
//! port's outbox as a [`PortEvent`]; the owner drains it after the mutation
//! completes, so listeners never observe a ledger mid-update.

use crate::fixed::{Fixed64, Quantity};
use crate::id::ResourceKind;
use crate::ledger::{Capacity, Ledger};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which capabilities a port exposes to outside clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortAccess {
    Input,
    Output,
    Both,
}

impl PortAccess {
    /// Whether external deposits may target this port.
    pub const fn accepts_deposits(self) -> bool {
        matches!(self, PortAccess::Input | PortAccess::Both)
    }

    /// Whether external withdrawals may draw from this port.
    pub const fn provides_withdrawals(self) -> bool {
        matches!(self, PortAccess::Output | PortAccess::Both)
    }
}

/// What happens to the kind lock once the ledger empties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockPolicy {
    /// The lock clears and any kind may be deposited again.
    #[default]
    ResetOnEmpty,
    /// The first kind ever deposited stays locked for the port's lifetime.
    Persistent,
}

/// Declarative description of a port, as authored by the placement system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub name: String,
    pub access: PortAccess,
    pub capacity: Capacity,
    /// Nominal transfer rate in units per second. Carried for consumers of
    /// the port description; admission does not depend on it.
    #[serde(default)]
    pub rate: Quantity,
    #[serde(default)]
    pub lock_policy: LockPolicy,
}

impl PortConfig {
    pub fn new(name: impl Into<String>, access: PortAccess, capacity: Capacity) -> Self {
        Self {
            name: name.into(),
            access,
            capacity,
            rate: Fixed64::ZERO,
            lock_policy: LockPolicy::ResetOnEmpty,
        }
    }

    pub fn with_rate(mut self, rate: Quantity) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A change to a port's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    ItemAdded { kind: ResourceKind, amount: Quantity },
    ItemRemoved { kind: ResourceKind, amount: Quantity },
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Port {
    name: String,
    access: PortAccess,
    rate: Quantity,
    lock_policy: LockPolicy,
    locked_kind: Option<ResourceKind>,
    ledger: Ledger,
    outbox: Vec<PortEvent>,
}

impl Port {
    pub fn new(config: &PortConfig) -> Self {
        Self {
            name: config.name.clone(),
            access: config.access,
            rate: config.rate,
            lock_policy: config.lock_policy,
            locked_kind: None,
            ledger: Ledger::new(config.capacity),
            outbox: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> PortAccess {
        self.access
    }

    pub fn rate(&self) -> Quantity {
        self.rate
    }

    pub fn lock_policy(&self) -> LockPolicy {
        self.lock_policy
    }

    pub fn locked_kind(&self) -> Option<ResourceKind> {
        self.locked_kind
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    fn matches_lock(&self, kind: ResourceKind) -> bool {
        self.locked_kind.is_none_or(|locked| locked == kind)
    }

    /// External admission test: direction, kind lock and free space.
    pub fn can_accept(&self, kind: ResourceKind, amount: Quantity) -> bool {
        amount > Fixed64::ZERO
            && self.access.accepts_deposits()
            && self.matches_lock(kind)
            && self.ledger.has_free_space()
    }

    /// External withdrawal test: direction, kind lock and non-empty ledger.
    pub fn can_provide(&self, kind: ResourceKind, amount: Quantity) -> bool {
        amount > Fixed64::ZERO
            && self.access.provides_withdrawals()
            && self.matches_lock(kind)
            && !self.ledger.is_empty()
    }

    /// Headroom available to `kind`: zero when the lock excludes it, `None`
    /// when the ledger is unbounded.
    pub fn free_space_for(&self, kind: ResourceKind) -> Option<Quantity> {
        if !self.matches_lock(kind) {
            return Some(Fixed64::ZERO);
        }
        self.ledger.free_space()
    }

    /// Owner-side deposit. Checks the kind lock and headroom but not
    /// direction, so a host may fill its own output ports.
    #[must_use = "returns the quantity actually stored, which may be less than requested"]
    pub fn add(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        let added = self.store(kind, amount);
        if added > Fixed64::ZERO {
            self.outbox.push(PortEvent::ItemAdded {
                kind,
                amount: added,
            });
        }
        added
    }

    /// Put back material that was withdrawn and could not be delivered.
    /// Identical to [`Port::add`] except that no `ItemAdded` is recorded.
    #[must_use = "returns the quantity actually restored"]
    pub fn restore(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        self.store(kind, amount)
    }

    fn store(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        if amount <= Fixed64::ZERO || !self.matches_lock(kind) {
            return Fixed64::ZERO;
        }
        let added = self.ledger.add(kind, amount);
        if added > Fixed64::ZERO {
            self.locked_kind = Some(kind);
        }
        added
    }

    /// Withdraw up to `amount` of `kind`. Open to any client; turrets and
    /// other consumers call this directly.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        if !self.matches_lock(kind) {
            return Fixed64::ZERO;
        }
        let removed = self.ledger.remove(kind, amount);
        if removed > Fixed64::ZERO {
            if self.ledger.is_empty() && self.lock_policy == LockPolicy::ResetOnEmpty {
                self.locked_kind = None;
            }
            self.outbox.push(PortEvent::ItemRemoved {
                kind,
                amount: removed,
            });
        }
        removed
    }

    pub fn get(&self, kind: ResourceKind) -> Quantity {
        self.ledger.get(kind)
    }

    /// The kind currently held, if any.
    pub fn current_kind(&self) -> Option<ResourceKind> {
        self.ledger.first_kind()
    }

    pub fn is_empty(&self) -> bool {
        self.ledger.is_empty()
    }

    pub fn is_full(&self) -> bool {
        !self.ledger.has_free_space()
    }

    /// Take every event recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<PortEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn pending_events(&self) -> &[PortEvent] {
        &self.outbox
    }
}
