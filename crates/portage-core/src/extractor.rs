//! Resource extractors (miners, pumps).
//!
//! An [`Extractor`] accumulates fractional production every tick and
//! deposits whole units into one port of its host. A full port stalls it;
//! production attempted against a full port is dropped.

use crate::fixed::{Fixed64, Quantity, Seconds};
use crate::host::InventoryHost;
use crate::id::{PortIndex, ResourceKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extractor {
    pub kind: ResourceKind,
    /// Units per second.
    pub rate: Quantity,
    pub port: PortIndex,
    /// Fractional production carried between ticks.
    accumulated: Quantity,
}

impl Extractor {
    pub fn new(kind: ResourceKind, rate: Quantity, port: PortIndex) -> Self {
        Self {
            kind,
            rate,
            port,
            accumulated: Fixed64::ZERO,
        }
    }

    pub fn accumulated(&self) -> Quantity {
        self.accumulated
    }

    /// Advance by `dt`. Returns the amount deposited this tick.
    pub fn tick(&mut self, host: &mut InventoryHost, dt: Seconds) -> Quantity {
        if self.rate <= Fixed64::ZERO || dt <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        self.accumulated = self.accumulated.saturating_add(self.rate.saturating_mul(dt));
        let whole = self.accumulated.floor();
        if whole <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }
        self.accumulated -= whole;
        match host.port_mut(self.port) {
            Some(port) => port.add(self.kind, whole),
            None => Fixed64::ZERO,
        }
    }
}
