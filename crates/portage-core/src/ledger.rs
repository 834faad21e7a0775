//! Capacity-bounded quantity store.
//!
//! A [`Ledger`] holds fungible amounts keyed by [`ResourceKind`]. Capacity is
//! shared across every kind it holds. Ledgers raise no events; announcing
//! changes is the owning [`Port`](crate::port::Port)'s job.

use crate::fixed::{Fixed64, QUANTITY_EPSILON, Quantity};
use crate::id::ResourceKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum total amount a ledger can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Capacity {
    Bounded(Quantity),
    Unbounded,
}

impl Capacity {
    /// Free space left when `used` is already stored. `None` means unlimited.
    pub fn headroom(&self, used: Quantity) -> Option<Quantity> {
        match self {
            Capacity::Bounded(cap) => Some((*cap - used).max(Fixed64::ZERO)),
            Capacity::Unbounded => None,
        }
    }
}

/// Quantity store for resource kinds. Entries exist only while positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    capacity: Capacity,
    contents: BTreeMap<ResourceKind, Quantity>,
}

impl Ledger {
    pub fn new(capacity: Capacity) -> Self {
        Self {
            capacity,
            contents: BTreeMap::new(),
        }
    }

    pub fn bounded(capacity: Quantity) -> Self {
        Self::new(Capacity::Bounded(capacity))
    }

    pub fn unbounded() -> Self {
        Self::new(Capacity::Unbounded)
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Add up to `amount`. Returns the amount actually stored, which is
    /// clamped to the remaining headroom. Non-positive amounts store nothing.
    #[must_use = "returns the quantity actually stored, which may be less than requested"]
    pub fn add(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        if amount <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        let used = self.used();
        // Unbounded ledgers still stop at the largest representable total.
        let space = self
            .capacity
            .headroom(used)
            .unwrap_or(Fixed64::MAX.saturating_sub(used));
        let to_add = amount.min(space);
        if to_add > Fixed64::ZERO {
            *self.contents.entry(kind).or_insert(Fixed64::ZERO) += to_add;
        }
        to_add
    }

    /// Remove up to `amount`. Returns the amount actually removed.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, kind: ResourceKind, amount: Quantity) -> Quantity {
        if amount <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        let Some(stored) = self.contents.get_mut(&kind) else {
            return Fixed64::ZERO;
        };
        let to_remove = amount.min(*stored);
        *stored -= to_remove;
        if *stored <= QUANTITY_EPSILON {
            self.contents.remove(&kind);
        }
        to_remove
    }

    /// Stored amount of `kind` (zero when absent).
    pub fn get(&self, kind: ResourceKind) -> Quantity {
        self.contents.get(&kind).copied().unwrap_or(Fixed64::ZERO)
    }

    /// Total stored across all kinds.
    pub fn used(&self) -> Quantity {
        self.contents
            .values()
            .fold(Fixed64::ZERO, |total, amount| total.saturating_add(*amount))
    }

    /// Remaining headroom. `None` means unbounded.
    pub fn free_space(&self) -> Option<Quantity> {
        self.capacity.headroom(self.used())
    }

    pub fn has_free_space(&self) -> bool {
        self.free_space().is_none_or(|space| space > Fixed64::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contains(&self, kind: ResourceKind, amount: Quantity) -> bool {
        self.get(kind) >= amount
    }

    /// First kind held, in kind order. Ports hold one kind at a time, so this
    /// is the port's current material.
    pub fn first_kind(&self) -> Option<ResourceKind> {
        self.contents.keys().next().copied()
    }

    /// Owned copy of the contents for read-only consumers.
    pub fn snapshot(&self) -> BTreeMap<ResourceKind, Quantity> {
        self.contents.clone()
    }
}
