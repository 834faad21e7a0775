//! Portage Core -- port-based resource logistics for building games.
//!
//! Buildings own typed, capacity-bounded ports. Material moves between them
//! through deposits, crafting units, splitters, upgrade gates and links, all
//! driven by an external scheduler through a single [`network::Network`].
//!
//! # Tick Pipeline
//!
//! Each call to [`network::Network::tick`] runs:
//!
//! 1. **Timers** -- Expired delayed actions deactivate or destroy hosts.
//! 2. **Extractors** -- Miners deposit whole units into their ports.
//! 3. **Production** -- Crafting units consume inputs and place outputs.
//! 4. **Link retry** -- Material stuck behind a full link is re-offered.
//! 5. **Delivery** -- Buffered events are handed to listeners.
//!
//! Reactions to a deposit (splitting, upgrading, forwarding along a link)
//! are queued and flushed before the call that caused them returns:
//!
//! ```rust,ignore
//! let splitter = net.spawn(config)?;
//! net.attach_distributor(splitter, "in")?;
//! net.connect(splitter, chest)?;
//! assert!(net.try_insert(splitter, ore, Fixed64::ONE)); // already in `chest`
//! ```
//!
//! # Key Types
//!
//! - [`network::Network`] -- Owner of hosts, behaviours, links and timers.
//! - [`host::InventoryHost`] -- Ordered ports plus admission and routing.
//! - [`port::Port`] -- Direction, kind lock and a [`ledger::Ledger`].
//! - [`production::ProductionUnit`] -- Timed recipe crafting.
//! - [`distributor::Distributor`] -- Round-robin splitter.
//! - [`upgrade::UpgradeGate`] -- Material-gated level progression.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`registry::Registry`] -- Immutable name registry for resource kinds
//!   and recipes.
//! - [`event::EventBus`] -- Subscription-based event bus with buffered delivery.

pub mod component;
pub mod distributor;
pub mod error;
pub mod event;
pub mod extractor;
pub mod fixed;
pub mod host;
pub mod id;
pub mod ledger;
pub mod network;
pub mod port;
pub mod production;
pub mod query;
pub mod recipe;
pub mod registry;
pub mod timer;
pub mod upgrade;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
