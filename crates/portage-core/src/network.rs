//! The network: owns every host, behaviour, link and timer, and is the single
//! entry point the external scheduler drives.
//!
//! # Reactive propagation
//!
//! Ports never call out of themselves. Every mutation is recorded in the
//! port's outbox; after the mutation returns, the network drains those
//! outboxes into a FIFO signal queue and reacts to each signal in turn
//! (distributors, upgrade gates, link forwarding). Reactions may enqueue
//! further signals, so one deposit can cascade miner -> splitter -> link ->
//! downstream host inside a single public call. The queue is always empty
//! again before that call returns, unless the cascade limit was hit.
//!
//! # Tick phases
//!
//! Each `tick(dt)` runs:
//! 1. **Timers** -- expired delayed actions deactivate or destroy hosts
//! 2. **Extractors** -- miners deposit whole units
//! 3. **Production** -- crafting units consume, count down and place outputs
//! 4. **Link retry** -- material stuck in claimed output ports is re-offered
//! 5. **Delivery** -- buffered events are handed to listeners

use crate::component::ComponentStorage;
use crate::distributor::Distributor;
use crate::error::NetworkError;
use crate::event::{Event, EventBus};
use crate::extractor::Extractor;
use crate::fixed::{Fixed64, Quantity, Seconds, Ticks};
use crate::host::{Direction, HostConfig, InventoryHost};
use crate::id::{HostId, LinkId, PortIndex, ResourceKind, TimerId};
use crate::port::{PortAccess, PortEvent};
use crate::production::{CraftState, ProductionUnit};
use crate::query::{HostSnapshot, PortSnapshot};
use crate::recipe::Recipe;
use crate::timer::{TimedAction, TimerQueue};
use crate::upgrade::{LevelUp, UpgradeGate, UpgradeLevel, validate_levels};
use slotmap::{SecondaryMap, SlotMap};
use std::collections::VecDeque;

/// Maximum number of signals handled by one propagation pass. Cyclic link
/// layouts would otherwise bounce material forever.
pub const DEFAULT_CASCADE_LIMIT: usize = 4096;

/// Callback run on the owning entity when its upgrade gate levels up.
pub type UpgradeHandler = Box<dyn FnMut(HostId, &LevelUp)>;

// ---------------------------------------------------------------------------
// Links and signals
// ---------------------------------------------------------------------------

/// A physical connection (belt) from one host's claimed output port to
/// another host's routed input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub from: HostId,
    /// The output port claimed on `from` when the link was made.
    pub port: PortIndex,
    pub to: HostId,
}

#[derive(Debug)]
struct HostEntry {
    host: InventoryHost,
    active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Signal {
    host: HostId,
    port: PortIndex,
    event: PortEvent,
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

pub struct Network {
    hosts: SlotMap<HostId, HostEntry>,
    components: ComponentStorage,
    links: SlotMap<LinkId, Link>,
    timers: TimerQueue,
    events: EventBus,
    upgrade_handlers: SecondaryMap<HostId, UpgradeHandler>,
    signals: VecDeque<Signal>,
    tick: Ticks,
    cascade_limit: usize,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("hosts", &self.hosts)
            .field("components", &self.components)
            .field("links", &self.links)
            .field("timers", &self.timers)
            .field("events", &self.events)
            .field("upgrade_handlers", &self.upgrade_handlers.len())
            .field("pending_signals", &self.signals.len())
            .field("tick", &self.tick)
            .finish()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            hosts: SlotMap::with_key(),
            components: ComponentStorage::new(),
            links: SlotMap::with_key(),
            timers: TimerQueue::new(),
            events: EventBus::default(),
            upgrade_handlers: SecondaryMap::new(),
            signals: VecDeque::new(),
            tick: 0,
            cascade_limit: DEFAULT_CASCADE_LIMIT,
        }
    }

    pub fn with_cascade_limit(mut self, limit: usize) -> Self {
        self.cascade_limit = limit.max(1);
        self
    }

    // -----------------------------------------------------------------------
    // Host lifecycle
    // -----------------------------------------------------------------------

    /// Validate `config`, build the host and run its one-time init.
    pub fn spawn(&mut self, config: HostConfig) -> Result<HostId, NetworkError> {
        let host = InventoryHost::from_config(&config)?;
        let id = self.hosts.insert(HostEntry { host, active: true });
        self.events.emit(Event::HostSpawned {
            host: id,
            tick: self.tick,
        });
        tracing::debug!(
            target: "portage::network",
            host = ?id,
            name = %config.name,
            "spawned host"
        );
        Ok(id)
    }

    /// Remove a host with everything attached to it: ledgers, behaviours,
    /// links touching it, its timers and any queued signals. In-flight
    /// crafts are dropped without refund.
    pub fn destroy(&mut self, id: HostId) -> Result<(), NetworkError> {
        let entry = self.hosts.remove(id).ok_or(NetworkError::HostNotFound(id))?;
        self.components.remove_host(id);
        self.upgrade_handlers.remove(id);
        self.timers.cancel_host(id);
        self.signals.retain(|s| s.host != id);

        let touching: Vec<LinkId> = self
            .links
            .iter()
            .filter(|(_, l)| l.from == id || l.to == id)
            .map(|(link, _)| link)
            .collect();
        for link in touching {
            self.remove_link(link);
        }

        self.events.emit(Event::HostDestroyed {
            host: id,
            tick: self.tick,
        });
        tracing::debug!(
            target: "portage::network",
            host = ?id,
            name = %entry.host.name(),
            "destroyed host"
        );
        Ok(())
    }

    /// Stop a host's behaviours and make it refuse deposits. Its contents
    /// stay readable and removable.
    pub fn deactivate(&mut self, id: HostId) -> Result<(), NetworkError> {
        let entry = self.hosts.get_mut(id).ok_or(NetworkError::HostNotFound(id))?;
        if !entry.active {
            return Ok(());
        }
        entry.active = false;
        self.events.emit(Event::HostDeactivated {
            host: id,
            tick: self.tick,
        });
        tracing::debug!(target: "portage::network", host = ?id, "deactivated host");
        Ok(())
    }

    /// Run `action` against `host` once `delay` seconds of ticks have passed.
    pub fn schedule(
        &mut self,
        host: HostId,
        delay: Seconds,
        action: TimedAction,
    ) -> Result<TimerId, NetworkError> {
        if !self.hosts.contains_key(host) {
            return Err(NetworkError::HostNotFound(host));
        }
        Ok(self.timers.schedule(host, delay, action))
    }

    // -----------------------------------------------------------------------
    // Behaviours
    // -----------------------------------------------------------------------

    /// Attach a crafting unit. A misconfigured unit is still attached, but
    /// disabled; `UnitDisabled` is emitted and it never ticks.
    pub fn attach_production(&mut self, id: HostId, recipe: Recipe) -> Result<(), NetworkError> {
        let entry = self.hosts.get(id).ok_or(NetworkError::HostNotFound(id))?;
        let mut unit = ProductionUnit::new(recipe);
        if unit.start(&entry.host).is_err() {
            self.events.emit(Event::UnitDisabled {
                host: id,
                tick: self.tick,
            });
        }
        self.components.production.insert(id, unit);
        Ok(())
    }

    /// Attach a splitter that fans units arriving on `receive_port` out over
    /// the host's connected outputs. The receive port must be input-only.
    pub fn attach_distributor(
        &mut self,
        id: HostId,
        receive_port: &str,
    ) -> Result<(), NetworkError> {
        let index = self.port_index(id, receive_port)?;
        let entry = self.hosts.get(id).ok_or(NetworkError::HostNotFound(id))?;
        match entry.host.port(index).map(|p| p.access()) {
            Some(PortAccess::Input) => {}
            _ => {
                return Err(NetworkError::InvalidReceivePort {
                    host: id,
                    port: receive_port.to_string(),
                });
            }
        }
        self.components.distributors.insert(id, Distributor::new(index));
        Ok(())
    }

    /// Attach an upgrade track to the host's dedicated upgrade port and
    /// start routing the first level's material there.
    pub fn attach_upgrade_gate(
        &mut self,
        id: HostId,
        levels: Vec<UpgradeLevel>,
    ) -> Result<(), NetworkError> {
        let entry = self.hosts.get_mut(id).ok_or(NetworkError::HostNotFound(id))?;
        let port = entry.host.upgrade_port().ok_or(NetworkError::NoUpgradePort(id))?;
        validate_levels(&levels)?;
        let gate = UpgradeGate::new(port, levels);
        entry.host.set_upgrade_requirement(gate.required_material());
        self.components.upgrade_gates.insert(id, gate);
        Ok(())
    }

    /// Attach a miner producing `rate` units of `kind` per second into `port`.
    pub fn attach_extractor(
        &mut self,
        id: HostId,
        kind: ResourceKind,
        rate: Quantity,
        port: &str,
    ) -> Result<(), NetworkError> {
        let index = self.port_index(id, port)?;
        self.components
            .extractors
            .insert(id, Extractor::new(kind, rate, index));
        Ok(())
    }

    /// Register the owning entity's callback for level-ups. Replaces any
    /// previous handler.
    pub fn on_upgrade(&mut self, id: HostId, handler: UpgradeHandler) -> Result<(), NetworkError> {
        if !self.hosts.contains_key(id) {
            return Err(NetworkError::HostNotFound(id));
        }
        self.upgrade_handlers.insert(id, handler);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Links
    // -----------------------------------------------------------------------

    /// Connect `from` to `to`, claiming `from`'s next free output port.
    /// Material already waiting in that port is forwarded immediately.
    pub fn connect(&mut self, from: HostId, to: HostId) -> Result<LinkId, NetworkError> {
        if from == to {
            return Err(NetworkError::SelfLink(from));
        }
        if !self.hosts.contains_key(to) {
            return Err(NetworkError::HostNotFound(to));
        }

        let source = self.hosts.get_mut(from).ok_or(NetworkError::HostNotFound(from))?;
        let port = source
            .host
            .get_next_output_port()
            .ok_or(NetworkError::NoFreeOutput(from))?;
        if !source.host.register_connection(Direction::Outgoing) {
            return Err(NetworkError::NoFreeOutput(from));
        }

        let registered = self
            .hosts
            .get_mut(to)
            .is_some_and(|target| target.host.register_connection(Direction::Incoming));
        if !registered {
            if let Some(source) = self.hosts.get_mut(from) {
                source.host.unregister_connection(Direction::Outgoing);
            }
            return Err(NetworkError::IncomingLimit(to));
        }

        let link = self.links.insert(Link { from, port, to });
        self.events.emit(Event::LinkAdded {
            link,
            from,
            to,
            tick: self.tick,
        });
        tracing::debug!(
            target: "portage::network",
            ?link,
            ?from,
            ?to,
            port = port.0,
            "connected hosts"
        );

        self.forward(link);
        self.propagate();
        Ok(link)
    }

    /// Remove a link and release both hosts' connection counters.
    pub fn disconnect(&mut self, link: LinkId) -> Result<(), NetworkError> {
        if !self.links.contains_key(link) {
            return Err(NetworkError::LinkNotFound(link));
        }
        self.remove_link(link);
        Ok(())
    }

    fn remove_link(&mut self, link: LinkId) {
        let Some(removed) = self.links.remove(link) else {
            return;
        };
        if let Some(entry) = self.hosts.get_mut(removed.from) {
            entry.host.unregister_connection(Direction::Outgoing);
        }
        if let Some(entry) = self.hosts.get_mut(removed.to) {
            entry.host.unregister_connection(Direction::Incoming);
        }
        self.events.emit(Event::LinkRemoved {
            link,
            tick: self.tick,
        });
        tracing::debug!(target: "portage::network", ?link, "disconnected hosts");
    }

    /// Move whatever the link's output port holds into the target host, up
    /// to what the target will take. Returns the amount moved.
    fn forward(&mut self, link: LinkId) -> Quantity {
        let Some(&Link { from, port, to }) = self.links.get(link) else {
            return Fixed64::ZERO;
        };
        if !self.is_active(from) || !self.is_active(to) {
            return Fixed64::ZERO;
        }
        let Some((kind, available)) = self.hosts.get(from).and_then(|e| {
            let port = e.host.port(port)?;
            let kind = port.ledger().first_kind()?;
            Some((kind, port.get(kind)))
        }) else {
            return Fixed64::ZERO;
        };

        let accepted = match self.hosts.get(to) {
            Some(entry) => entry.host.acceptance(kind, available),
            None => Fixed64::ZERO,
        };
        if accepted <= Fixed64::ZERO {
            return Fixed64::ZERO;
        }

        let removed = self
            .hosts
            .get_mut(from)
            .and_then(|e| e.host.port_mut(port))
            .map_or(Fixed64::ZERO, |p| p.remove(kind, accepted));
        let inserted = self
            .hosts
            .get_mut(to)
            .map_or(Fixed64::ZERO, |e| e.host.insert(kind, removed));
        if inserted < removed
            && let Some(source) = self.hosts.get_mut(from).and_then(|e| e.host.port_mut(port))
        {
            let rejected = removed - inserted;
            let restored = source.restore(kind, rejected);
            if restored < rejected {
                tracing::warn!(
                    target: "portage::network",
                    ?link,
                    lost = %(rejected - restored),
                    "link could not restore rejected material"
                );
            }
        }

        self.collect(from);
        self.collect(to);
        inserted
    }

    // -----------------------------------------------------------------------
    // Client surface
    // -----------------------------------------------------------------------

    /// Deposit into `id` through its routing rules. Stores whatever fits and
    /// returns whether anything was stored; an inactive or unknown host
    /// refuses.
    pub fn try_insert(&mut self, id: HostId, kind: ResourceKind, amount: Quantity) -> bool {
        let accepted = match self.hosts.get_mut(id) {
            Some(entry) if entry.active => entry.host.try_insert(kind, amount),
            _ => return false,
        };
        self.collect(id);
        self.propagate();
        accepted
    }

    /// Deposit into `id`, keeping whatever fits. Returns the amount stored.
    pub fn insert(&mut self, id: HostId, kind: ResourceKind, amount: Quantity) -> Quantity {
        let stored = match self.hosts.get_mut(id) {
            Some(entry) if entry.active => entry.host.insert(kind, amount),
            _ => return Fixed64::ZERO,
        };
        self.collect(id);
        self.propagate();
        stored
    }

    /// Withdraw from a specific port. Returns the amount actually removed.
    pub fn remove(
        &mut self,
        id: HostId,
        port: PortIndex,
        kind: ResourceKind,
        amount: Quantity,
    ) -> Quantity {
        let removed = self
            .hosts
            .get_mut(id)
            .and_then(|e| e.host.port_mut(port))
            .map_or(Fixed64::ZERO, |p| p.remove(kind, amount));
        self.collect(id);
        self.propagate();
        removed
    }

    /// Run `f` against a host's inventory, then propagate whatever it changed.
    pub fn with_host_mut<R>(
        &mut self,
        id: HostId,
        f: impl FnOnce(&mut InventoryHost) -> R,
    ) -> Option<R> {
        let result = f(&mut self.hosts.get_mut(id)?.host);
        self.collect(id);
        self.propagate();
        Some(result)
    }

    pub fn port_index(&self, id: HostId, name: &str) -> Result<PortIndex, NetworkError> {
        let entry = self.hosts.get(id).ok_or(NetworkError::HostNotFound(id))?;
        entry.host.port_index(name).ok_or_else(|| NetworkError::PortNotFound {
            host: id,
            port: name.to_string(),
        })
    }

    // -----------------------------------------------------------------------
    // Propagation
    // -----------------------------------------------------------------------

    /// Move a host's pending port events onto the signal queue.
    fn collect(&mut self, id: HostId) {
        let Some(entry) = self.hosts.get_mut(id) else {
            return;
        };
        for (port, event) in entry.host.drain_events() {
            self.signals.push_back(Signal {
                host: id,
                port,
                event,
            });
        }
    }

    /// Flush the signal queue.
    fn propagate(&mut self) {
        let mut handled = 0;
        while let Some(signal) = self.signals.pop_front() {
            if handled >= self.cascade_limit {
                self.signals.push_front(signal);
                tracing::warn!(
                    target: "portage::network",
                    limit = self.cascade_limit,
                    pending = self.signals.len(),
                    "cascade limit reached, deferring remaining signals"
                );
                return;
            }
            handled += 1;
            self.react(signal);
        }
    }

    fn react(&mut self, signal: Signal) {
        let Signal { host, port, event } = signal;
        let tick = self.tick;
        match event {
            PortEvent::ItemRemoved { kind, amount } => {
                self.events.emit(Event::ItemRemoved {
                    host,
                    port,
                    kind,
                    amount,
                    tick,
                });
            }
            PortEvent::ItemAdded { kind, amount } => {
                self.events.emit(Event::ItemAdded {
                    host,
                    port,
                    kind,
                    amount,
                    tick,
                });
                if !self.is_active(host) {
                    return;
                }
                self.run_distributor(host, port, kind);
                self.run_upgrade_gate(host, port);

                let outgoing: Vec<LinkId> = self
                    .links
                    .iter()
                    .filter(|(_, l)| l.from == host && l.port == port)
                    .map(|(id, _)| id)
                    .collect();
                for link in outgoing {
                    self.forward(link);
                }
            }
        }
    }

    fn run_distributor(&mut self, host: HostId, port: PortIndex, kind: ResourceKind) {
        let (Some(distributor), Some(entry)) = (
            self.components.distributors.get_mut(host),
            self.hosts.get_mut(host),
        ) else {
            return;
        };
        if distributor.receive_port() != port {
            return;
        }
        if let Some(delivery) = distributor.on_item_added(&mut entry.host, kind) {
            tracing::trace!(
                target: "portage::distributor",
                ?host,
                target_port = delivery.target.0,
                delivered = %delivery.delivered,
                "distributed unit"
            );
        }
        self.collect(host);
    }

    fn run_upgrade_gate(&mut self, host: HostId, port: PortIndex) {
        let (Some(gate), Some(entry)) = (
            self.components.upgrade_gates.get_mut(host),
            self.hosts.get_mut(host),
        ) else {
            return;
        };
        if gate.port() != port {
            return;
        }
        let level_up = gate.on_item_added(&mut entry.host);
        self.collect(host);
        let Some(level_up) = level_up else {
            return;
        };

        tracing::debug!(
            target: "portage::upgrade",
            ?host,
            level = level_up.level,
            consumed = %level_up.consumed,
            "upgrade applied"
        );
        if let Some(handler) = self.upgrade_handlers.get_mut(host) {
            handler(host, &level_up);
        }
        self.events.emit(Event::UpgradeApplied {
            host,
            level: level_up.level,
            tick: self.tick,
        });
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance the network by `dt` seconds.
    pub fn tick(&mut self, dt: Seconds) {
        self.phase_timers(dt);
        self.phase_extractors(dt);
        self.phase_production(dt);
        self.phase_link_retry();
        self.events.deliver();
        self.tick += 1;
    }

    fn phase_timers(&mut self, dt: Seconds) {
        for timer in self.timers.advance(dt) {
            // The host may already be gone if an earlier timer destroyed it.
            let _ = match timer.action {
                TimedAction::Deactivate => self.deactivate(timer.host),
                TimedAction::Destroy => self.destroy(timer.host),
            };
        }
    }

    fn phase_extractors(&mut self, dt: Seconds) {
        let ids: Vec<HostId> = self.components.extractors.keys().collect();
        for id in ids {
            let (Some(extractor), Some(entry)) =
                (self.components.extractors.get_mut(id), self.hosts.get_mut(id))
            else {
                continue;
            };
            if !entry.active {
                continue;
            }
            extractor.tick(&mut entry.host, dt);
            self.collect(id);
            self.propagate();
        }
    }

    fn phase_production(&mut self, dt: Seconds) {
        let ids: Vec<HostId> = self.components.production.keys().collect();
        for id in ids {
            let (Some(unit), Some(entry)) =
                (self.components.production.get_mut(id), self.hosts.get_mut(id))
            else {
                continue;
            };
            if !entry.active {
                continue;
            }
            let result = unit.tick(&mut entry.host, dt);

            let tick = self.tick;
            if result.started {
                self.events.emit(Event::CraftStarted { host: id, tick });
            }
            if result.completed {
                self.events.emit(Event::CraftCompleted { host: id, tick });
            }
            for (kind, amount) in result.discarded {
                tracing::warn!(
                    target: "portage::production",
                    host = ?id,
                    ?kind,
                    %amount,
                    "no room for craft output, discarded"
                );
                self.events.emit(Event::OutputDiscarded {
                    host: id,
                    kind,
                    amount,
                    tick,
                });
            }
            self.collect(id);
            self.propagate();
        }
    }

    fn phase_link_retry(&mut self) {
        let ids: Vec<LinkId> = self.links.keys().collect();
        for link in ids {
            self.forward(link);
            self.propagate();
        }
    }

    /// Hand buffered events to listeners without advancing time.
    pub fn deliver_events(&mut self) {
        self.events.deliver();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn host(&self, id: HostId) -> Option<&InventoryHost> {
        self.hosts.get(id).map(|e| &e.host)
    }

    pub fn contains(&self, id: HostId) -> bool {
        self.hosts.contains_key(id)
    }

    pub fn is_active(&self, id: HostId) -> bool {
        self.hosts.get(id).is_some_and(|e| e.active)
    }

    pub fn production(&self, id: HostId) -> Option<&ProductionUnit> {
        self.components.production.get(id)
    }

    pub fn distributor(&self, id: HostId) -> Option<&Distributor> {
        self.components.distributors.get(id)
    }

    pub fn upgrade_gate(&self, id: HostId) -> Option<&UpgradeGate> {
        self.components.upgrade_gates.get(id)
    }

    pub fn extractor(&self, id: HostId) -> Option<&Extractor> {
        self.components.extractors.get(id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn current_tick(&self) -> Ticks {
        self.tick
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn pending_signals(&self) -> usize {
        self.signals.len()
    }

    /// Resume a propagation pass that stopped at the cascade limit.
    pub fn flush(&mut self) {
        self.propagate();
    }

    pub fn snapshot(&self, id: HostId) -> Option<HostSnapshot> {
        let entry = self.hosts.get(id)?;
        let connections = entry.host.connections();
        let unit = self.components.production.get(id);
        Some(HostSnapshot {
            id,
            name: entry.host.name().to_string(),
            active: entry.active,
            ports: entry.host.ports().iter().map(PortSnapshot::from).collect(),
            totals: entry.host.get_all(),
            incoming_links: connections.current(Direction::Incoming),
            outgoing_links: connections.current(Direction::Outgoing),
            craft_state: unit.map(|u| u.state()),
            craft_progress: unit.map_or(Fixed64::ZERO, |u| u.progress()),
            upgrade_level: self.components.upgrade_gates.get(id).map(|g| g.current_level()),
        })
    }

    pub fn snapshot_all(&self) -> Vec<HostSnapshot> {
        self.hosts.keys().filter_map(|id| self.snapshot(id)).collect()
    }

    /// Whether `id`'s production unit is mid-craft.
    pub fn is_crafting(&self, id: HostId) -> bool {
        matches!(
            self.components.production.get(id).map(|u| u.state()),
            Some(CraftState::Crafting { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::event::EventKind;
    use crate::fixed::f64_to_fixed64 as q;
    use crate::host::Admission;
    use crate::ledger::Capacity;
    use crate::port::PortConfig;
    use crate::recipe::RecipeEntry;
    use std::cell::RefCell;
    use std::rc::Rc;

    const ORE: ResourceKind = ResourceKind(1);
    const INGOT: ResourceKind = ResourceKind(2);
    const CRYSTAL: ResourceKind = ResourceKind(3);

    fn bounded(name: &str, access: PortAccess, capacity: f64) -> PortConfig {
        PortConfig::new(name, access, Capacity::Bounded(q(capacity)))
    }

    fn chest(name: &str, capacity: f64) -> HostConfig {
        HostConfig::new(name)
            .with_port(PortConfig::new(
                "store",
                PortAccess::Input,
                Capacity::Bounded(q(capacity)),
            ))
            .with_connections(4, 0)
    }

    fn miner() -> HostConfig {
        HostConfig::new("miner")
            .with_port(PortConfig::new("out", PortAccess::Output, Capacity::Bounded(q(5.0))))
            .with_connections(0, 1)
    }

    fn splitter(outputs: usize) -> HostConfig {
        let mut config = HostConfig::new("splitter").with_port(PortConfig::new(
            "in",
            PortAccess::Input,
            Capacity::Bounded(q(10.0)),
        ));
        for i in 0..outputs {
            config = config.with_port(PortConfig::new(
                format!("out{i}"),
                PortAccess::Output,
                Capacity::Bounded(q(1.0)),
            ));
        }
        config.with_connections(1, outputs as u32)
    }

    fn store_of(net: &Network, id: HostId, kind: ResourceKind) -> Quantity {
        net.host(id).map_or(Fixed64::ZERO, |h| {
            h.ports().iter().map(|p| p.get(kind)).sum()
        })
    }

    #[test]
    fn spawn_rejects_invalid_config() {
        let mut net = Network::new();
        let err = net.spawn(HostConfig::new("empty")).unwrap_err();
        assert!(matches!(err, NetworkError::Config(_)));
        assert_eq!(net.host_count(), 0);
    }

    #[test]
    fn try_insert_flushes_reactive_cascade() {
        let mut net = Network::new();
        let split = net.spawn(splitter(2)).unwrap();
        net.attach_distributor(split, "in").unwrap();
        let a = net.spawn(chest("a", 10.0)).unwrap();
        let b = net.spawn(chest("b", 10.0)).unwrap();
        net.connect(split, a).unwrap();
        net.connect(split, b).unwrap();

        for _ in 0..4 {
            assert!(net.try_insert(split, ORE, q(1.0)));
        }
        assert_eq!(store_of(&net, a, ORE), q(2.0));
        assert_eq!(store_of(&net, b, ORE), q(2.0));
        assert_eq!(net.pending_signals(), 0);
    }

    #[test]
    fn miner_cascades_through_link_within_one_tick() {
        let mut net = Network::new();
        let m = net.spawn(miner()).unwrap();
        net.attach_extractor(m, ORE, q(1.0), "out").unwrap();
        let sink = net.spawn(chest("sink", 10.0)).unwrap();
        net.connect(m, sink).unwrap();

        net.tick(q(1.0));
        assert_eq!(store_of(&net, sink, ORE), q(1.0));
        assert_eq!(store_of(&net, m, ORE), Fixed64::ZERO);
    }

    #[test]
    fn stuck_material_moves_once_downstream_frees_up() {
        let mut net = Network::new();
        let m = net.spawn(miner()).unwrap();
        net.attach_extractor(m, ORE, q(1.0), "out").unwrap();
        let sink = net.spawn(chest("sink", 1.0)).unwrap();
        net.connect(m, sink).unwrap();

        net.tick(q(1.0));
        net.tick(q(1.0));
        assert_eq!(store_of(&net, sink, ORE), q(1.0));
        assert_eq!(store_of(&net, m, ORE), q(1.0));

        let store = net.port_index(sink, "store").unwrap();
        assert_eq!(net.remove(sink, store, ORE, q(1.0)), q(1.0));
        net.tick(q(0.5));
        assert_eq!(store_of(&net, sink, ORE), q(1.0));
        assert_eq!(store_of(&net, m, ORE), Fixed64::ZERO);
    }

    #[test]
    fn connect_enforces_bounds() {
        let mut net = Network::new();
        let m = net.spawn(miner()).unwrap();
        let a = net.spawn(chest("a", 1.0)).unwrap();
        let b = net.spawn(chest("b", 1.0)).unwrap();

        assert_eq!(net.connect(m, m), Err(NetworkError::SelfLink(m)));
        let link = net.connect(m, a).unwrap();
        assert_eq!(net.connect(m, b), Err(NetworkError::NoFreeOutput(m)));

        net.disconnect(link).unwrap();
        assert!(net.connect(m, b).is_ok());
        assert_eq!(net.disconnect(link), Err(NetworkError::LinkNotFound(link)));
    }

    #[test]
    fn incoming_limit_rolls_back_outgoing_claim() {
        let mut net = Network::new();
        let a = net.spawn(miner()).unwrap();
        let b = net.spawn(miner()).unwrap();
        let sink = net.spawn(chest("sink", 1.0).with_connections(1, 0)).unwrap();

        net.connect(a, sink).unwrap();
        assert_eq!(net.connect(b, sink), Err(NetworkError::IncomingLimit(sink)));
        assert_eq!(net.snapshot(b).unwrap().outgoing_links, 0);
    }

    #[test]
    fn distributor_receive_port_must_be_input() {
        let mut net = Network::new();
        let split = net.spawn(splitter(1)).unwrap();
        assert!(matches!(
            net.attach_distributor(split, "out0"),
            Err(NetworkError::InvalidReceivePort { .. })
        ));
        assert!(matches!(
            net.attach_distributor(split, "missing"),
            Err(NetworkError::PortNotFound { .. })
        ));
    }

    #[test]
    fn production_runs_and_emits_events() {
        let mut net = Network::new();
        let smelter = net
            .spawn(
                HostConfig::new("smelter")
                    .with_port(bounded("in", PortAccess::Input, 10.0))
                    .with_port(bounded("out", PortAccess::Output, 10.0)),
            )
            .unwrap();
        net.attach_production(
            smelter,
            Recipe::new(
                vec![RecipeEntry::new(ORE, q(2.0))],
                vec![RecipeEntry::new(INGOT, q(1.0))],
                q(1.0),
            ),
        )
        .unwrap();

        let completed = Rc::new(RefCell::new(0));
        let seen = completed.clone();
        net.events_mut().subscribe(
            EventKind::CraftCompleted,
            Box::new(move |_: &Event| *seen.borrow_mut() += 1),
        );

        assert!(net.try_insert(smelter, ORE, q(4.0)));
        net.tick(q(0.5));
        assert!(net.is_crafting(smelter));
        net.tick(q(0.5));
        assert_eq!(store_of(&net, smelter, INGOT), q(1.0));
        assert_eq!(*completed.borrow(), 1);
    }

    #[test]
    fn disabled_unit_emits_event_and_never_crafts() {
        let mut net = Network::new();
        let host = net.spawn(chest("box", 5.0)).unwrap();
        net.attach_production(
            host,
            Recipe::new(vec![], vec![RecipeEntry::new(INGOT, q(1.0))], q(1.0)),
        )
        .unwrap();
        assert!(!net.production(host).unwrap().is_enabled());
        assert_eq!(net.events().buffered_count(EventKind::UnitDisabled), 1);
    }

    #[test]
    fn upgrade_gate_levels_up_and_notifies() {
        let mut net = Network::new();
        let turret = net
            .spawn(
                HostConfig::new("turret")
                    .with_port(bounded("ammo", PortAccess::Input, 10.0))
                    .with_port(bounded("upgrade", PortAccess::Input, 10.0))
                    .with_upgrade_port("upgrade"),
            )
            .unwrap();
        net.attach_upgrade_gate(
            turret,
            vec![
                UpgradeLevel::new(CRYSTAL, q(3.0)),
                UpgradeLevel::new(INGOT, q(2.0)),
            ],
        )
        .unwrap();

        let levels = Rc::new(RefCell::new(Vec::new()));
        let sink = levels.clone();
        net.on_upgrade(
            turret,
            Box::new(move |_, up: &LevelUp| sink.borrow_mut().push(up.level)),
        )
        .unwrap();

        assert!(net.try_insert(turret, CRYSTAL, q(2.0)));
        assert!(levels.borrow().is_empty());
        assert!(net.try_insert(turret, CRYSTAL, q(1.0)));
        assert_eq!(*levels.borrow(), vec![1]);
        assert_eq!(net.snapshot(turret).unwrap().upgrade_level, Some(1));

        // Next level's material routes to the upgrade port now.
        assert!(net.try_insert(turret, INGOT, q(2.0)));
        assert_eq!(*levels.borrow(), vec![1, 2]);
        assert!(net.upgrade_gate(turret).unwrap().is_maxed());
    }

    #[test]
    fn upgrade_requires_dedicated_port() {
        let mut net = Network::new();
        let host = net.spawn(chest("box", 1.0)).unwrap();
        assert_eq!(
            net.attach_upgrade_gate(host, vec![UpgradeLevel::new(CRYSTAL, q(1.0))]),
            Err(NetworkError::NoUpgradePort(host))
        );
    }

    #[test]
    fn upgrade_level_without_cost_is_rejected() {
        let mut net = Network::new();
        let turret = net
            .spawn(
                HostConfig::new("turret")
                    .with_port(bounded("ammo", PortAccess::Input, 10.0))
                    .with_port(bounded("upgrade", PortAccess::Input, 10.0))
                    .with_upgrade_port("upgrade"),
            )
            .unwrap();
        let levels = vec![
            UpgradeLevel::new(CRYSTAL, q(2.0)),
            UpgradeLevel::new(INGOT, Fixed64::ZERO),
        ];
        assert_eq!(
            net.attach_upgrade_gate(turret, levels),
            Err(NetworkError::Config(ConfigError::NonPositiveUpgradeAmount { level: 2 }))
        );
        assert!(net.upgrade_gate(turret).is_none());
        assert_eq!(net.host(turret).unwrap().upgrade_requirement(), None);
    }

    #[test]
    fn deactivate_timer_stops_behaviours() {
        let mut net = Network::new();
        let m = net.spawn(miner()).unwrap();
        net.attach_extractor(m, ORE, q(1.0), "out").unwrap();
        net.schedule(m, q(1.0), TimedAction::Deactivate).unwrap();

        net.tick(q(0.5));
        net.tick(q(0.5));
        assert!(!net.is_active(m));
        let before = store_of(&net, m, ORE);
        net.tick(q(2.0));
        assert_eq!(store_of(&net, m, ORE), before);
        assert!(!net.try_insert(m, ORE, q(1.0)));
    }

    #[test]
    fn destroy_timer_removes_host_and_links() {
        let mut net = Network::new();
        let m = net.spawn(miner()).unwrap();
        let sink = net.spawn(chest("sink", 1.0)).unwrap();
        net.connect(m, sink).unwrap();
        net.schedule(m, q(1.0), TimedAction::Destroy).unwrap();

        net.tick(q(1.0));
        assert!(!net.contains(m));
        assert_eq!(net.link_count(), 0);
        assert_eq!(net.snapshot(sink).unwrap().incoming_links, 0);
        assert_eq!(net.pending_timers(), 0);
    }

    #[test]
    fn whitelist_blocks_link_forwarding() {
        let mut net = Network::new();
        let m = net.spawn(miner()).unwrap();
        net.attach_extractor(m, ORE, q(1.0), "out").unwrap();
        let picky = net
            .spawn(chest("picky", 5.0).with_admission(Admission::Whitelist([INGOT].into())))
            .unwrap();
        net.connect(m, picky).unwrap();

        net.tick(q(1.0));
        assert_eq!(store_of(&net, picky, ORE), Fixed64::ZERO);
        assert_eq!(store_of(&net, m, ORE), q(1.0));
    }

    #[test]
    fn cascade_limit_defers_remaining_signals() {
        let mut net = Network::new().with_cascade_limit(1);
        let m = net.spawn(miner()).unwrap();
        let sink = net.spawn(chest("sink", 5.0)).unwrap();
        net.connect(m, sink).unwrap();

        let out = net.port_index(m, "out").unwrap();
        net.with_host_mut(m, |h| h.port_mut(out).map(|p| p.add(ORE, q(1.0))));
        assert!(net.pending_signals() > 0);
        while net.pending_signals() > 0 {
            net.flush();
        }
        assert_eq!(store_of(&net, sink, ORE), q(1.0));
    }
}
