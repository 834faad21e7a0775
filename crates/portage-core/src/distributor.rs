//! Round-robin splitter.
//!
//! A [`Distributor`] reacts to material arriving on its host's receive port
//! and forwards one unit per arrival to the next active output port. An
//! output is active when a physical connection has claimed it and it still
//! has room. The rotation always advances, even when the chosen output
//! refuses the unit, so one blocked output cannot starve the others.
//! Undelivered units wait in the receive port; its capacity bounds the
//! backlog.

use crate::fixed::{Fixed64, Quantity};
use crate::host::InventoryHost;
use crate::id::{PortIndex, ResourceKind};

/// Units moved per arrival.
pub const UNIT: Quantity = Fixed64::ONE;

/// Outcome of one distribution step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub target: PortIndex,
    pub kind: ResourceKind,
    pub delivered: Quantity,
    /// Withdrawn but refused by the target, put back into the receive port.
    pub returned: Quantity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distributor {
    receive: PortIndex,
    rotation_index: usize,
}

impl Distributor {
    pub fn new(receive: PortIndex) -> Self {
        Self {
            receive,
            rotation_index: 0,
        }
    }

    pub fn receive_port(&self) -> PortIndex {
        self.receive
    }

    pub fn rotation_index(&self) -> usize {
        self.rotation_index
    }

    /// Connected, non-full output ports in declared order.
    pub fn active_outputs(&self, host: &InventoryHost) -> Vec<PortIndex> {
        let connected = host.connections().outgoing as usize;
        host.output_ports()
            .into_iter()
            .filter(|i| *i != self.receive)
            .enumerate()
            .filter(|(position, index)| {
                *position < connected && host.port(*index).is_some_and(|p| !p.is_full())
            })
            .map(|(_, index)| index)
            .collect()
    }

    /// Handle an `ItemAdded` of `kind` on the receive port.
    pub fn on_item_added(
        &mut self,
        host: &mut InventoryHost,
        kind: ResourceKind,
    ) -> Option<Delivery> {
        let active = self.active_outputs(host);
        if active.is_empty() {
            return None;
        }
        let target = active[self.rotation_index % active.len()];
        self.rotation_index = (self.rotation_index + 1) % active.len();

        let removed = host.port_mut(self.receive)?.remove(kind, UNIT);
        let delivered = match host.port_mut(target) {
            Some(port) => port.add(kind, removed),
            None => Fixed64::ZERO,
        };
        let mut returned = Fixed64::ZERO;
        if delivered < removed
            && let Some(receive) = host.port_mut(self.receive)
        {
            returned = receive.restore(kind, removed - delivered);
        }

        Some(Delivery {
            target,
            kind,
            delivered,
            returned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64 as q;
    use crate::host::{Direction, HostConfig};
    use crate::ledger::Capacity;
    use crate::port::{PortAccess, PortConfig};

    fn ore() -> ResourceKind {
        ResourceKind(0)
    }
    fn crystal() -> ResourceKind {
        ResourceKind(1)
    }

    fn splitter(outputs: usize, out_capacity: f64) -> InventoryHost {
        let mut config = HostConfig::new("splitter")
            .with_port(PortConfig::new("receive", PortAccess::Input, Capacity::Bounded(q(50.0))))
            .with_connections(1, outputs as u32);
        for i in 0..outputs {
            config = config.with_port(PortConfig::new(
                format!("out_{i}"),
                PortAccess::Output,
                Capacity::Bounded(q(out_capacity)),
            ));
        }
        InventoryHost::from_config(&config).unwrap()
    }

    fn connect_all(host: &mut InventoryHost, count: usize) {
        for _ in 0..count {
            assert!(host.register_connection(Direction::Outgoing));
        }
    }

    fn deposit(
        host: &mut InventoryHost,
        dist: &mut Distributor,
        kind: ResourceKind,
    ) -> Option<Delivery> {
        assert!(host.try_insert(kind, UNIT));
        dist.on_item_added(host, kind)
    }

    #[test]
    fn rotates_across_connected_outputs() {
        let mut host = splitter(3, 10.0);
        connect_all(&mut host, 3);
        let mut dist = Distributor::new(PortIndex(0));

        let targets: Vec<PortIndex> = (0..6)
            .map(|_| deposit(&mut host, &mut dist, ore()).unwrap().target)
            .collect();
        assert_eq!(
            targets,
            vec![
                PortIndex(1),
                PortIndex(2),
                PortIndex(3),
                PortIndex(1),
                PortIndex(2),
                PortIndex(3)
            ]
        );
        for i in 1..=3 {
            assert_eq!(host.port(PortIndex(i)).unwrap().get(ore()), q(2.0));
        }
        assert!(host.port(PortIndex(0)).unwrap().is_empty());
    }

    #[test]
    fn unconnected_outputs_are_skipped() {
        let mut host = splitter(3, 10.0);
        connect_all(&mut host, 1);
        let mut dist = Distributor::new(PortIndex(0));
        for _ in 0..3 {
            assert_eq!(deposit(&mut host, &mut dist, ore()).unwrap().target, PortIndex(1));
        }
        assert_eq!(host.port(PortIndex(1)).unwrap().get(ore()), q(3.0));
    }

    #[test]
    fn nothing_happens_without_active_outputs() {
        let mut host = splitter(2, 10.0);
        let mut dist = Distributor::new(PortIndex(0));
        assert_eq!(deposit(&mut host, &mut dist, ore()), None);
        assert_eq!(host.port(PortIndex(0)).unwrap().get(ore()), UNIT);
        assert_eq!(dist.rotation_index(), 0);
    }

    #[test]
    fn full_outputs_leave_the_rotation() {
        let mut host = splitter(2, 1.0);
        connect_all(&mut host, 2);
        let mut dist = Distributor::new(PortIndex(0));
        let _ = deposit(&mut host, &mut dist, ore());
        let _ = deposit(&mut host, &mut dist, ore());
        // Both outputs now full.
        assert!(dist.active_outputs(&host).is_empty());
        assert_eq!(deposit(&mut host, &mut dist, ore()), None);
        assert_eq!(host.port(PortIndex(0)).unwrap().get(ore()), UNIT);
    }

    #[test]
    fn refused_unit_returns_and_rotation_still_advances() {
        let mut host = splitter(2, 10.0);
        connect_all(&mut host, 2);
        let _ = host.port_mut(PortIndex(1)).unwrap().add(crystal(), q(1.0));
        let mut dist = Distributor::new(PortIndex(0));

        let refused = deposit(&mut host, &mut dist, ore()).unwrap();
        assert_eq!(refused.target, PortIndex(1));
        assert_eq!(refused.delivered, Fixed64::ZERO);
        assert_eq!(refused.returned, UNIT);
        assert_eq!(host.port(PortIndex(0)).unwrap().get(ore()), UNIT);
        assert_eq!(dist.rotation_index(), 1);

        let next = dist.on_item_added(&mut host, ore()).unwrap();
        assert_eq!(next.target, PortIndex(2));
        assert_eq!(next.delivered, UNIT);
    }

    #[test]
    fn receive_port_is_not_an_output_even_if_both() {
        let config = HostConfig::new("splitter")
            .with_port(PortConfig::new("out_0", PortAccess::Output, Capacity::Bounded(q(5.0))))
            .with_port(PortConfig::new("receive", PortAccess::Both, Capacity::Bounded(q(5.0))))
            .with_connections(0, 1);
        let mut host = InventoryHost::from_config(&config).unwrap();
        assert!(host.register_connection(Direction::Outgoing));
        let dist = Distributor::new(PortIndex(1));
        assert_eq!(dist.active_outputs(&host), vec![PortIndex(0)]);
    }
}
