//! Material-gated level advancement.
//!
//! An [`UpgradeGate`] watches its host's upgrade port. Each arrival checks
//! the current level's requirement once; when met, exactly the required
//! amount is consumed and the level advances. Surplus stays in the port and
//! only counts toward a later level if that level wants the same material.
//! Levels never decrease, and deposits past the last level are inert.

use crate::error::ConfigError;
use crate::fixed::{Fixed64, Quantity};
use crate::host::InventoryHost;
use crate::id::{PortIndex, ResourceKind};
use serde::{Deserialize, Serialize};

/// A stat change granted by an upgrade level. The owning entity interprets
/// the stat names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatModifier {
    Add { stat: String, value: Fixed64 },
    Multiply { stat: String, factor: Fixed64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeLevel {
    pub required_material: ResourceKind,
    pub amount_required: Quantity,
    #[serde(default)]
    pub modifiers: Vec<StatModifier>,
}

impl UpgradeLevel {
    pub fn new(required_material: ResourceKind, amount_required: Quantity) -> Self {
        Self {
            required_material,
            amount_required,
            modifiers: Vec::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: StatModifier) -> Self {
        self.modifiers.push(modifier);
        self
    }
}

/// Reject tracks with a level that would advance without consuming
/// anything. Levels are numbered from 1 in the error.
pub fn validate_levels(levels: &[UpgradeLevel]) -> Result<(), ConfigError> {
    match levels
        .iter()
        .position(|l| l.amount_required <= Fixed64::ZERO)
    {
        Some(index) => Err(ConfigError::NonPositiveUpgradeAmount { level: index + 1 }),
        None => Ok(()),
    }
}

/// Emitted when a level is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUp {
    /// The level now in effect (1 after the first upgrade).
    pub level: usize,
    pub consumed: Quantity,
    pub applied: UpgradeLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeGate {
    port: PortIndex,
    levels: Vec<UpgradeLevel>,
    current_level: usize,
}

impl UpgradeGate {
    pub fn new(port: PortIndex, levels: Vec<UpgradeLevel>) -> Self {
        Self {
            port,
            levels,
            current_level: 0,
        }
    }

    pub fn port(&self) -> PortIndex {
        self.port
    }

    pub fn levels(&self) -> &[UpgradeLevel] {
        &self.levels
    }

    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub fn is_maxed(&self) -> bool {
        self.current_level >= self.levels.len()
    }

    /// Material the next level waits for, or `None` once maxed.
    pub fn required_material(&self) -> Option<ResourceKind> {
        self.levels
            .get(self.current_level)
            .map(|l| l.required_material)
    }

    /// Handle an `ItemAdded` on the upgrade port. Checks the current level
    /// once and advances at most one level.
    pub fn on_item_added(&mut self, host: &mut InventoryHost) -> Option<LevelUp> {
        let level = self.levels.get(self.current_level)?.clone();
        let port = host.port_mut(self.port)?;
        if port.get(level.required_material) < level.amount_required {
            return None;
        }
        let consumed = port.remove(level.required_material, level.amount_required);
        self.current_level += 1;
        host.set_upgrade_requirement(self.required_material());
        Some(LevelUp {
            level: self.current_level,
            consumed,
            applied: level,
        })
    }
}
