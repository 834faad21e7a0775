//! Recipe-driven production units.
//!
//! A [`ProductionUnit`] cycles between `Idle` and `Crafting`. It starts a
//! craft only when every input is in stock across its host's input ports and
//! every output has room across its output ports. Inputs are drained at the
//! start; outputs are placed at completion.
//!
//! Output space is checked only when a craft starts. Anything that no longer
//! fits at completion is discarded and reported in [`CraftResult::discarded`].

use crate::error::ConfigError;
use crate::fixed::{Fixed64, Quantity, Seconds};
use crate::host::InventoryHost;
use crate::id::{PortIndex, ResourceKind};
use crate::recipe::Recipe;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Runtime state of a production unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CraftState {
    #[default]
    Idle,
    Crafting { remaining: Seconds },
}

/// Why a unit switched itself off.
#[derive(Debug, Clone, PartialEq)]
pub enum DisableReason {
    InvalidRecipe(ConfigError),
    NoInputPorts,
    NoOutputPorts,
}

impl std::fmt::Display for DisableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisableReason::InvalidRecipe(err) => write!(f, "invalid recipe: {err}"),
            DisableReason::NoInputPorts => {
                write!(f, "recipe needs inputs but host has no input ports")
            }
            DisableReason::NoOutputPorts => {
                write!(f, "recipe has outputs but host has no output ports")
            }
        }
    }
}

/// Lifecycle of the unit itself, separate from the craft cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum UnitStatus {
    /// Not yet started against a host.
    #[default]
    Pending,
    Running,
    /// Permanently off. Never retried.
    Disabled(DisableReason),
}

/// What happened during one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CraftResult {
    pub started: bool,
    pub completed: bool,
    pub consumed: Vec<(ResourceKind, Quantity)>,
    pub produced: Vec<(ResourceKind, Quantity)>,
    /// Output that found no room at completion.
    pub discarded: Vec<(ResourceKind, Quantity)>,
}

// ---------------------------------------------------------------------------
// ProductionUnit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProductionUnit {
    recipe: Recipe,
    state: CraftState,
    status: UnitStatus,
    input_ports: Vec<PortIndex>,
    output_ports: Vec<PortIndex>,
}

impl ProductionUnit {
    pub fn new(recipe: Recipe) -> Self {
        Self {
            recipe,
            state: CraftState::Idle,
            status: UnitStatus::Pending,
            input_ports: Vec::new(),
            output_ports: Vec::new(),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn state(&self) -> CraftState {
        self.state
    }

    pub fn status(&self) -> &UnitStatus {
        &self.status
    }

    pub fn is_enabled(&self) -> bool {
        self.status == UnitStatus::Running
    }

    /// Fraction of the current craft completed, 0 when idle.
    pub fn progress(&self) -> Fixed64 {
        match self.state {
            CraftState::Idle => Fixed64::ZERO,
            CraftState::Crafting { remaining } => {
                let done = self.recipe.craft_duration - remaining;
                (done / self.recipe.craft_duration).clamp(Fixed64::ZERO, Fixed64::ONE)
            }
        }
    }

    /// Validate against the host and cache its ports by direction. On
    /// failure the unit logs once and disables itself for good.
    pub fn start(&mut self, host: &InventoryHost) -> Result<(), DisableReason> {
        if let UnitStatus::Disabled(reason) = &self.status {
            return Err(reason.clone());
        }
        match self.validate(host) {
            Ok((inputs, outputs)) => {
                self.input_ports = inputs;
                self.output_ports = outputs;
                self.status = UnitStatus::Running;
                Ok(())
            }
            Err(reason) => {
                tracing::error!(
                    target: "portage::production",
                    host = host.name(),
                    reason = %reason,
                    "production unit disabled"
                );
                self.status = UnitStatus::Disabled(reason.clone());
                Err(reason)
            }
        }
    }

    fn validate(
        &self,
        host: &InventoryHost,
    ) -> Result<(Vec<PortIndex>, Vec<PortIndex>), DisableReason> {
        self.recipe.validate().map_err(DisableReason::InvalidRecipe)?;
        let upgrade = host.upgrade_port();
        let inputs: Vec<PortIndex> = host
            .input_ports()
            .into_iter()
            .filter(|i| Some(*i) != upgrade)
            .collect();
        let outputs = host.output_ports();
        if !self.recipe.inputs.is_empty() && inputs.is_empty() {
            return Err(DisableReason::NoInputPorts);
        }
        if !self.recipe.outputs.is_empty() && outputs.is_empty() {
            return Err(DisableReason::NoOutputPorts);
        }
        Ok((inputs, outputs))
    }

    /// Whether a craft could start right now: all inputs in stock and room
    /// for all outputs, checked together.
    pub fn can_start_craft(&self, host: &InventoryHost) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let inputs_ready = self
            .recipe
            .inputs
            .iter()
            .all(|e| host.stock_in(&self.input_ports, e.kind) >= e.amount);
        inputs_ready && self.recipe.outputs.iter().all(|e| self.has_room(host, e.kind, e.amount))
    }

    fn has_room(&self, host: &InventoryHost, kind: ResourceKind, amount: Quantity) -> bool {
        let mut total = Fixed64::ZERO;
        for port in self.output_ports.iter().filter_map(|i| host.port(*i)) {
            match port.free_space_for(kind) {
                None => return true,
                Some(space) => total = total.saturating_add(space),
            }
        }
        total >= amount
    }

    /// Advance by `dt` seconds. A craft that starts this tick also counts
    /// this tick's time.
    pub fn tick(&mut self, host: &mut InventoryHost, dt: Seconds) -> CraftResult {
        let mut result = CraftResult::default();
        if !self.is_enabled() {
            return result;
        }

        if self.state == CraftState::Idle {
            if !self.can_start_craft(host) {
                return result;
            }
            result.consumed = self.drain_inputs(host);
            result.started = true;
            self.state = CraftState::Crafting {
                remaining: self.recipe.craft_duration,
            };
        }

        let finished = match &mut self.state {
            CraftState::Crafting { remaining } => {
                *remaining -= dt;
                *remaining <= Fixed64::ZERO
            }
            CraftState::Idle => false,
        };
        if finished {
            self.place_outputs(host, &mut result);
            self.state = CraftState::Idle;
            result.completed = true;
        }

        result
    }

    /// Draw each requirement from input ports in declared order, emptying the
    /// first port with stock before moving to the next.
    fn drain_inputs(&self, host: &mut InventoryHost) -> Vec<(ResourceKind, Quantity)> {
        let mut consumed = Vec::with_capacity(self.recipe.inputs.len());
        for entry in &self.recipe.inputs {
            let mut still_needed = entry.amount;
            for index in &self.input_ports {
                if still_needed <= Fixed64::ZERO {
                    break;
                }
                if let Some(port) = host.port_mut(*index) {
                    still_needed -= port.remove(entry.kind, still_needed);
                }
            }
            consumed.push((entry.kind, entry.amount - still_needed));
        }
        consumed
    }

    /// Fill output ports in declared order, spilling to the next port.
    fn place_outputs(&self, host: &mut InventoryHost, result: &mut CraftResult) {
        for entry in &self.recipe.outputs {
            let mut left = entry.amount;
            for index in &self.output_ports {
                if left <= Fixed64::ZERO {
                    break;
                }
                if let Some(port) = host.port_mut(*index) {
                    left -= port.add(entry.kind, left);
                }
            }
            let placed = entry.amount - left;
            if placed > Fixed64::ZERO {
                result.produced.push((entry.kind, placed));
            }
            if left > Fixed64::ZERO {
                result.discarded.push((entry.kind, left));
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::f64_to_fixed64 as q;
    use crate::host::HostConfig;
    use crate::ledger::Capacity;
    use crate::port::{PortAccess, PortConfig};
    use crate::recipe::RecipeEntry;

    fn ore() -> ResourceKind {
        ResourceKind(0)
    }
    fn ingot() -> ResourceKind {
        ResourceKind(1)
    }
    fn slag() -> ResourceKind {
        ResourceKind(2)
    }

    fn smelt() -> Recipe {
        Recipe::new(
            vec![RecipeEntry::new(ore(), q(2.0))],
            vec![RecipeEntry::new(ingot(), q(1.0))],
            q(3.0),
        )
    }

    fn furnace(out_capacity: f64) -> InventoryHost {
        let config = HostConfig::new("furnace")
            .with_port(PortConfig::new("in", PortAccess::Input, Capacity::Bounded(q(10.0))))
            .with_port(PortConfig::new(
                "out",
                PortAccess::Output,
                Capacity::Bounded(q(out_capacity)),
            ));
        InventoryHost::from_config(&config).unwrap()
    }

    fn started(recipe: Recipe, host: &InventoryHost) -> ProductionUnit {
        let mut unit = ProductionUnit::new(recipe);
        unit.start(host).unwrap();
        unit
    }

    #[test]
    fn smelts_ore_into_ingot_over_duration() {
        let mut host = furnace(10.0);
        let mut unit = started(smelt(), &host);

        assert!(host.try_insert(ore(), q(1.0)));
        assert!(!unit.can_start_craft(&host));
        assert!(host.try_insert(ore(), q(1.0)));
        assert!(unit.can_start_craft(&host));

        let first = unit.tick(&mut host, q(1.0));
        assert!(first.started);
        assert_eq!(first.consumed, vec![(ore(), q(2.0))]);
        assert!(!first.completed);
        let _ = unit.tick(&mut host, q(1.0));
        let last = unit.tick(&mut host, q(1.0));
        assert!(last.completed);
        assert_eq!(last.produced, vec![(ingot(), q(1.0))]);

        assert_eq!(host.get_port("out").unwrap().get(ingot()), q(1.0));
        assert_eq!(host.get_port("in").unwrap().get(ore()), Fixed64::ZERO);
        assert_eq!(unit.state(), CraftState::Idle);
    }

    #[test]
    fn stays_idle_without_output_room() {
        let mut host = furnace(1.0);
        let mut unit = started(smelt(), &host);
        let out = host.port_index("out").unwrap();
        let _ = host.port_mut(out).unwrap().add(ingot(), q(1.0));
        let _ = host.insert(ore(), q(2.0));

        assert!(!unit.can_start_craft(&host));
        let result = unit.tick(&mut host, q(5.0));
        assert!(!result.started);
        assert_eq!(host.get_port("in").unwrap().get(ore()), q(2.0));
    }

    #[test]
    fn output_locked_to_other_kind_has_no_room() {
        let mut host = furnace(10.0);
        let unit = started(smelt(), &host);
        let out = host.port_index("out").unwrap();
        let _ = host.port_mut(out).unwrap().add(slag(), q(1.0));
        let _ = host.insert(ore(), q(2.0));
        assert!(!unit.can_start_craft(&host));
    }

    #[test]
    fn progress_tracks_remaining_time() {
        let mut host = furnace(10.0);
        let mut unit = started(smelt(), &host);
        let _ = host.insert(ore(), q(2.0));
        assert_eq!(unit.progress(), Fixed64::ZERO);
        let _ = unit.tick(&mut host, q(1.5));
        assert_eq!(unit.progress(), q(0.5));
    }

    #[test]
    fn output_filled_mid_craft_is_discarded() {
        let mut host = furnace(1.0);
        let mut unit = started(smelt(), &host);
        let _ = host.insert(ore(), q(2.0));
        let first = unit.tick(&mut host, q(1.0));
        assert!(first.started);

        // Someone else fills the output while the craft runs.
        let out = host.port_index("out").unwrap();
        let _ = host.port_mut(out).unwrap().add(ingot(), q(1.0));

        let done = unit.tick(&mut host, q(2.0));
        assert!(done.completed);
        assert!(done.produced.is_empty());
        assert_eq!(done.discarded, vec![(ingot(), q(1.0))]);
        assert_eq!(host.get_port("out").unwrap().get(ingot()), q(1.0));
    }

    #[test]
    fn drains_inputs_greedily_in_port_order() {
        let config = HostConfig::new("assembler")
            .with_port(PortConfig::new("in_a", PortAccess::Input, Capacity::Bounded(q(1.0))))
            .with_port(PortConfig::new("in_b", PortAccess::Input, Capacity::Bounded(q(5.0))))
            .with_port(PortConfig::new("out", PortAccess::Output, Capacity::Bounded(q(5.0))));
        let mut host = InventoryHost::from_config(&config).unwrap();
        let mut unit = started(smelt(), &host);

        let a = host.port_index("in_a").unwrap();
        let b = host.port_index("in_b").unwrap();
        let _ = host.port_mut(a).unwrap().add(ore(), q(1.0));
        let _ = host.port_mut(b).unwrap().add(ore(), q(3.0));

        let result = unit.tick(&mut host, q(0.5));
        assert!(result.started);
        assert!(host.port(a).unwrap().is_empty());
        assert_eq!(host.port(b).unwrap().get(ore()), q(2.0));
    }

    #[test]
    fn outputs_spill_to_next_port() {
        let config = HostConfig::new("press")
            .with_port(PortConfig::new("in", PortAccess::Input, Capacity::Bounded(q(5.0))))
            .with_port(PortConfig::new("out_a", PortAccess::Output, Capacity::Bounded(q(1.0))))
            .with_port(PortConfig::new("out_b", PortAccess::Output, Capacity::Bounded(q(5.0))));
        let mut host = InventoryHost::from_config(&config).unwrap();
        let recipe = Recipe::new(
            vec![RecipeEntry::new(ore(), q(1.0))],
            vec![RecipeEntry::new(ingot(), q(3.0))],
            q(1.0),
        );
        let mut unit = started(recipe, &host);
        let _ = host.insert(ore(), q(1.0));

        let result = unit.tick(&mut host, q(1.0));
        assert!(result.completed);
        assert_eq!(host.get_port("out_a").unwrap().get(ingot()), q(1.0));
        assert_eq!(host.get_port("out_b").unwrap().get(ingot()), q(2.0));
    }

    #[test]
    fn invalid_recipe_disables_permanently() {
        let mut host = furnace(10.0);
        let mut recipe = smelt();
        recipe.craft_duration = Fixed64::ZERO;
        let mut unit = ProductionUnit::new(recipe);

        let err = unit.start(&host).unwrap_err();
        assert_eq!(err, DisableReason::InvalidRecipe(ConfigError::NonPositiveDuration));
        assert!(!unit.is_enabled());

        let _ = host.insert(ore(), q(2.0));
        assert_eq!(unit.tick(&mut host, q(10.0)), CraftResult::default());
        assert!(unit.start(&host).is_err());
    }

    #[test]
    fn missing_output_ports_disable_the_unit() {
        let config = HostConfig::new("sink")
            .with_port(PortConfig::new("in", PortAccess::Input, Capacity::Bounded(q(10.0))));
        let host = InventoryHost::from_config(&config).unwrap();
        let mut unit = ProductionUnit::new(smelt());
        assert_eq!(unit.start(&host), Err(DisableReason::NoOutputPorts));
        assert!(matches!(unit.status(), UnitStatus::Disabled(_)));
    }

    #[test]
    fn pending_unit_does_not_tick() {
        let mut host = furnace(10.0);
        let mut unit = ProductionUnit::new(smelt());
        let _ = host.insert(ore(), q(2.0));
        assert!(!unit.can_start_craft(&host));
        assert!(!unit.tick(&mut host, q(1.0)).started);
    }
}
