use crate::error::ConfigError;
use crate::id::{RecipeId, ResourceKind};
use crate::recipe::Recipe;
use std::collections::HashMap;

/// A resource kind definition in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDef {
    pub name: String,
}

/// A named recipe definition.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDef {
    pub name: String,
    pub recipe: Recipe,
}

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    resources: Vec<ResourceDef>,
    resource_name_to_id: HashMap<String, ResourceKind>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a resource kind. Returns its ID.
    pub fn register_resource(&mut self, name: &str) -> Result<ResourceKind, RegistryError> {
        if self.resource_name_to_id.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        let id = ResourceKind(self.resources.len() as u32);
        self.resources.push(ResourceDef {
            name: name.to_string(),
        });
        self.resource_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Phase 1: Register a recipe. Returns its ID.
    pub fn register_recipe(
        &mut self,
        name: &str,
        recipe: Recipe,
    ) -> Result<RecipeId, RegistryError> {
        if self.recipe_name_to_id.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(RecipeDef {
            name: name.to_string(),
            recipe,
        });
        self.recipe_name_to_id.insert(name.to_string(), id);
        Ok(id)
    }

    /// Phase 2: Mutate an existing recipe by name.
    pub fn mutate_recipe<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut Recipe),
    {
        let id = self
            .recipe_name_to_id
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        f(&mut self.recipes[id.0 as usize].recipe);
        Ok(())
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceKind> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    /// Phase 3: Finalize and build the immutable registry.
    pub fn build(self) -> Result<Registry, RegistryError> {
        for def in &self.recipes {
            def.recipe
                .validate()
                .map_err(|source| RegistryError::InvalidRecipe {
                    name: def.name.clone(),
                    source,
                })?;
            for entry in def.recipe.inputs.iter().chain(def.recipe.outputs.iter()) {
                if entry.kind.0 as usize >= self.resources.len() {
                    return Err(RegistryError::InvalidResourceRef(entry.kind));
                }
            }
        }

        Ok(Registry {
            resources: self.resources,
            resource_name_to_id: self.resource_name_to_id,
            recipes: self.recipes,
            recipe_name_to_id: self.recipe_name_to_id,
        })
    }
}

/// Immutable registry. Frozen after build().
#[derive(Debug, Clone, Default)]
pub struct Registry {
    resources: Vec<ResourceDef>,
    resource_name_to_id: HashMap<String, ResourceKind>,
    recipes: Vec<RecipeDef>,
    recipe_name_to_id: HashMap<String, RecipeId>,
}

impl Registry {
    pub fn get_resource(&self, id: ResourceKind) -> Option<&ResourceDef> {
        self.resources.get(id.0 as usize)
    }

    pub fn get_recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.0 as usize)
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceKind> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn resource_name(&self, id: ResourceKind) -> Option<&str> {
        self.get_resource(id).map(|r| r.name.as_str())
    }

    pub fn recipe_id(&self, name: &str) -> Option<RecipeId> {
        self.recipe_name_to_id.get(name).copied()
    }

    /// The recipe registered under `name`.
    pub fn recipe(&self, name: &str) -> Option<&Recipe> {
        self.recipe_id(name)
            .and_then(|id| self.get_recipe(id))
            .map(|def| &def.recipe)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    Duplicate(String),
    #[error("invalid resource reference: {0:?}")]
    InvalidResourceRef(ResourceKind),
    #[error("invalid recipe '{name}': {source}")]
    InvalidRecipe { name: String, source: ConfigError },
}
