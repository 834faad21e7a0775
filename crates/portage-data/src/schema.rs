//! Serde data file structs for logistics content definitions.
//!
//! These structs define the on-disk format for resources, recipes, hosts
//! and upgrade tracks. They are deserialized from RON, JSON, or TOML data
//! files and then resolved into core types by the loader.

use portage_core::port::{LockPolicy, PortAccess};
use serde::Deserialize;

// ===========================================================================
// Resources
// ===========================================================================

/// A resource kind definition in a data file.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceData {
    pub name: String,
}

// ===========================================================================
// Recipes
// ===========================================================================

/// A recipe definition. Entries are `("resource_name", amount)` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<(String, f64)>,
    #[serde(default)]
    pub outputs: Vec<(String, f64)>,
    /// Craft time in seconds.
    pub duration: f64,
}

// ===========================================================================
// Hosts
// ===========================================================================

/// A port on a host. A missing `capacity` means unbounded.
#[derive(Debug, Clone, Deserialize)]
pub struct PortData {
    pub name: String,
    pub access: PortAccess,
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(default)]
    pub rate: f64,
    #[serde(default)]
    pub lock: LockPolicy,
}

/// A miner attached to a host.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractorData {
    pub resource: String,
    /// Units per second.
    pub rate: f64,
    pub port: String,
}

/// A host template: ports, admission, link limits and the behaviours to
/// attach when it is spawned.
#[derive(Debug, Clone, Deserialize)]
pub struct HostData {
    pub name: String,
    pub ports: Vec<PortData>,
    /// Admitted resource names; absent means accept everything.
    #[serde(default)]
    pub whitelist: Option<Vec<String>>,
    #[serde(default)]
    pub max_incoming: u32,
    #[serde(default)]
    pub max_outgoing: u32,
    #[serde(default)]
    pub upgrade_port: Option<String>,
    /// Name of a recipe to craft.
    #[serde(default)]
    pub recipe: Option<String>,
    /// Receive port of a splitter.
    #[serde(default)]
    pub distributor: Option<String>,
    #[serde(default)]
    pub extractor: Option<ExtractorData>,
    /// Name of an upgrade track.
    #[serde(default)]
    pub upgrades: Option<String>,
}

// ===========================================================================
// Upgrades
// ===========================================================================

/// A stat change applied when a level is reached.
#[derive(Debug, Clone, Deserialize)]
pub enum ModifierData {
    Add { stat: String, value: f64 },
    Multiply { stat: String, factor: f64 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeLevelData {
    pub material: String,
    pub amount: f64,
    #[serde(default)]
    pub modifiers: Vec<ModifierData>,
}

/// A named sequence of upgrade levels.
#[derive(Debug, Clone, Deserialize)]
pub struct UpgradeTrackData {
    pub name: String,
    pub levels: Vec<UpgradeLevelData>,
}
