//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::fixed::{Fixed64, Quantity};
use crate::host::HostConfig;
use crate::id::{HostId, ResourceKind};
use crate::ledger::Capacity;
use crate::network::Network;
use crate::port::{PortAccess, PortConfig};
use crate::recipe::{Recipe, RecipeEntry};
use crate::upgrade::UpgradeLevel;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Resource constructors
// ===========================================================================

pub fn ore() -> ResourceKind {
    ResourceKind(0)
}
pub fn ingot() -> ResourceKind {
    ResourceKind(1)
}
pub fn crystal() -> ResourceKind {
    ResourceKind(2)
}
pub fn ammo() -> ResourceKind {
    ResourceKind(3)
}
pub fn plate() -> ResourceKind {
    ResourceKind(4)
}

// ===========================================================================
// Port and host configs
// ===========================================================================

pub fn input(name: &str, capacity: f64) -> PortConfig {
    PortConfig::new(name, PortAccess::Input, Capacity::Bounded(fixed(capacity)))
}

pub fn output(name: &str, capacity: f64) -> PortConfig {
    PortConfig::new(name, PortAccess::Output, Capacity::Bounded(fixed(capacity)))
}

/// A storage host with one input port and room for `max_incoming` links.
pub fn chest(name: &str, capacity: f64, max_incoming: u32) -> HostConfig {
    HostConfig::new(name)
        .with_port(input("store", capacity))
        .with_connections(max_incoming, 0)
}

/// A mining host with one output port and a single outgoing link.
pub fn miner(capacity: f64) -> HostConfig {
    HostConfig::new("miner")
        .with_port(output("out", capacity))
        .with_connections(0, 1)
}

/// A splitter host: one input-only receive port and `outputs` single-unit
/// output ports, one outgoing link per output.
pub fn splitter(outputs: usize, receive_capacity: f64) -> HostConfig {
    let mut config = HostConfig::new("splitter").with_port(input("in", receive_capacity));
    for i in 0..outputs {
        config = config.with_port(output(&format!("out{i}"), 1.0));
    }
    config.with_connections(1, outputs as u32)
}

/// A crafting host with one input and one output port.
pub fn factory(name: &str, input_capacity: f64, output_capacity: f64) -> HostConfig {
    HostConfig::new(name)
        .with_port(input("in", input_capacity))
        .with_port(output("out", output_capacity))
        .with_connections(1, 1)
}

/// A host with a general input port plus a dedicated upgrade port.
pub fn upgradable(name: &str, capacity: f64) -> HostConfig {
    HostConfig::new(name)
        .with_port(input("ammo", capacity))
        .with_port(input("upgrade", capacity))
        .with_upgrade_port("upgrade")
        .with_connections(2, 0)
}

// ===========================================================================
// Recipes and upgrade tracks
// ===========================================================================

/// `inputs` -> `outputs` over `duration` seconds.
pub fn recipe(
    inputs: &[(ResourceKind, f64)],
    outputs: &[(ResourceKind, f64)],
    duration: f64,
) -> Recipe {
    let entries = |list: &[(ResourceKind, f64)]| {
        list.iter()
            .map(|&(kind, amount)| RecipeEntry::new(kind, fixed(amount)))
            .collect()
    };
    Recipe::new(entries(inputs), entries(outputs), fixed(duration))
}

pub fn levels(track: &[(ResourceKind, f64)]) -> Vec<UpgradeLevel> {
    track
        .iter()
        .map(|&(kind, amount)| UpgradeLevel::new(kind, fixed(amount)))
        .collect()
}

// ===========================================================================
// Network helpers
// ===========================================================================

/// Total of `kind` across every port of `host`, or zero for an unknown host.
pub fn stock(net: &Network, host: HostId, kind: ResourceKind) -> Quantity {
    net.host(host)
        .and_then(|h| h.get_all().get(&kind).copied())
        .unwrap_or(Fixed64::ZERO)
}

/// Stock held in the named port of `host`.
pub fn stock_in(net: &Network, host: HostId, port: &str, kind: ResourceKind) -> Quantity {
    net.host(host)
        .and_then(|h| h.get_port(port))
        .map_or(Fixed64::ZERO, |p| p.get(kind))
}

/// Run `n` ticks of `dt` seconds each.
pub fn run(net: &mut Network, n: usize, dt: f64) {
    for _ in 0..n {
        net.tick(fixed(dt));
    }
}

/// miner -> splitter -> `branches` chests, each link claimed in order.
/// Returns `(miner, splitter, chests)`.
pub fn build_splitter_chain(
    net: &mut Network,
    branches: usize,
    rate: f64,
) -> (HostId, HostId, Vec<HostId>) {
    let m = net.spawn(miner(5.0)).expect("miner config is valid");
    net.attach_extractor(m, ore(), fixed(rate), "out")
        .expect("miner has an out port");
    let split = net
        .spawn(splitter(branches, 10.0))
        .expect("splitter config is valid");
    net.attach_distributor(split, "in")
        .expect("splitter has an input receive port");
    net.connect(m, split).expect("miner has a free output");

    let chests = (0..branches)
        .map(|i| {
            let c = net
                .spawn(chest(&format!("chest{i}"), 1000.0, 1))
                .expect("chest config is valid");
            net.connect(split, c).expect("splitter has a free output");
            c
        })
        .collect();
    (m, split, chests)
}
