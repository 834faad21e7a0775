use crate::error::ConfigError;
use crate::fixed::{Fixed64, Quantity, Seconds};
use crate::id::ResourceKind;
use serde::{Deserialize, Serialize};

/// One `(kind, amount)` line of a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub kind: ResourceKind,
    pub amount: Quantity,
}

impl RecipeEntry {
    pub fn new(kind: ResourceKind, amount: Quantity) -> Self {
        Self { kind, amount }
    }
}

/// Immutable crafting recipe: consume `inputs`, wait `craft_duration`,
/// produce `outputs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub inputs: Vec<RecipeEntry>,
    pub outputs: Vec<RecipeEntry>,
    pub craft_duration: Seconds,
}

impl Recipe {
    pub fn new(
        inputs: Vec<RecipeEntry>,
        outputs: Vec<RecipeEntry>,
        craft_duration: Seconds,
    ) -> Self {
        Self {
            inputs,
            outputs,
            craft_duration,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.craft_duration <= Fixed64::ZERO {
            return Err(ConfigError::NonPositiveDuration);
        }
        if self.inputs.is_empty() && self.outputs.is_empty() {
            return Err(ConfigError::EmptyRecipe);
        }
        if self
            .inputs
            .iter()
            .chain(&self.outputs)
            .any(|e| e.amount <= Fixed64::ZERO)
        {
            return Err(ConfigError::NonPositiveAmount);
        }
        Ok(())
    }
}
