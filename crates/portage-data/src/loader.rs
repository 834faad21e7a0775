//! Data directory loading.
//!
//! A data directory holds up to four lists, each in one of RON, JSON or TOML:
//! `resources` (required), `recipes`, `upgrades` and `hosts`. Later lists
//! refer to earlier ones by name; [`load_game_data`] resolves those names
//! into core types and spawnable [`HostTemplate`]s.

use crate::schema::{
    HostData, ModifierData, PortData, RecipeData, ResourceData, UpgradeTrackData,
};
use crate::template::{ExtractorTemplate, HostTemplate};
use portage_core::error::ConfigError;
use portage_core::fixed::{Quantity, checked_f64_to_fixed64};
use portage_core::host::{Admission, HostConfig};
use portage_core::id::ResourceKind;
use portage_core::ledger::Capacity;
use portage_core::port::PortConfig;
use portage_core::recipe::{Recipe, RecipeEntry};
use portage_core::registry::{Registry, RegistryBuilder, RegistryError};
use portage_core::upgrade::{StatModifier, UpgradeLevel, validate_levels};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required list has no file in the data directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// The same list exists in more than one format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A number cannot be represented as a fixed-point quantity.
    #[error("{field} in {file} is out of range: {value}")]
    InvalidValue {
        file: PathBuf,
        field: String,
        value: f64,
    },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    #[error("invalid host in {file}: {source}")]
    InvalidHost { file: PathBuf, source: ConfigError },

    #[error("invalid upgrade track '{track}' in {file}: {source}")]
    InvalidUpgradeTrack {
        file: PathBuf,
        track: String,
        source: ConfigError,
    },

    /// The registry rejected the resolved content.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats and files
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    /// Format named by the file's extension.
    pub fn from_path(path: &Path) -> Result<Self, DataLoadError> {
        let ext = path.extension().and_then(|e| e.to_str());
        Self::ALL
            .into_iter()
            .find(|f| Some(f.extension()) == ext)
            .ok_or_else(|| DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            })
    }

    /// Parse a list of `T`. TOML has no top-level arrays, so a TOML file
    /// keeps the list under `toml_key` (`[[resources]]`, `[[hosts]]`, ...).
    fn parse_list<T: DeserializeOwned>(
        self,
        content: &str,
        toml_key: &str,
    ) -> Result<Vec<T>, String> {
        match self {
            Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Format::Toml => {
                let mut table: toml::Table =
                    toml::from_str(content).map_err(|e| e.to_string())?;
                table
                    .remove(toml_key)
                    .ok_or_else(|| format!("missing key '{toml_key}' in TOML file"))?
                    .try_into()
                    .map_err(|e: toml::de::Error| e.to_string())
            }
        }
    }
}

/// A directory of data files, addressed by list name.
#[derive(Debug, Clone, Copy)]
pub struct DataDir<'a> {
    dir: &'a Path,
}

impl<'a> DataDir<'a> {
    pub fn new(dir: &'a Path) -> Self {
        Self { dir }
    }

    /// The file holding list `name`, in whichever format is present.
    /// Two formats for the same list is an error.
    pub fn find(&self, name: &str) -> Result<Option<PathBuf>, DataLoadError> {
        let mut present = Format::ALL
            .into_iter()
            .map(|f| self.dir.join(format!("{name}.{}", f.extension())))
            .filter(|path| path.exists());
        let first = present.next();
        if let (Some(a), Some(b)) = (&first, present.next()) {
            return Err(DataLoadError::ConflictingFormats {
                a: a.clone(),
                b,
            });
        }
        Ok(first)
    }

    pub fn require(&self, name: &str) -> Result<PathBuf, DataLoadError> {
        self.find(name)?.ok_or_else(|| DataLoadError::MissingRequired {
            file: name.to_string(),
            dir: self.dir.to_path_buf(),
        })
    }

    /// Read list `name` from `path`; the name doubles as the TOML key.
    pub fn read_list<T: DeserializeOwned>(
        &self,
        path: &Path,
        name: &str,
    ) -> Result<Vec<T>, DataLoadError> {
        let format = Format::from_path(path)?;
        let content = std::fs::read_to_string(path)?;
        format
            .parse_list(&content, name)
            .map_err(|detail| DataLoadError::Parse {
                file: path.to_path_buf(),
                detail,
            })
    }
}

// ===========================================================================
// Name tables
// ===========================================================================

/// Definitions of one kind read so far, keyed by name. Every error names
/// the file being resolved.
#[derive(Debug)]
struct NameTable<V> {
    kind: &'static str,
    entries: HashMap<String, V>,
}

impl<V> NameTable<V> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    /// Define `name`, building its value only once the name is known to be
    /// new.
    fn define(
        &mut self,
        name: &str,
        file: &Path,
        build: impl FnOnce() -> Result<V, DataLoadError>,
    ) -> Result<(), DataLoadError> {
        if self.entries.contains_key(name) {
            return Err(DataLoadError::DuplicateName {
                file: file.to_path_buf(),
                name: name.to_string(),
            });
        }
        let value = build()?;
        self.entries.insert(name.to_string(), value);
        Ok(())
    }

    fn lookup(&self, name: &str, file: &Path) -> Result<&V, DataLoadError> {
        self.entries
            .get(name)
            .ok_or_else(|| DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                name: name.to_string(),
                expected_kind: self.kind,
            })
    }

    fn into_map(self) -> HashMap<String, V> {
        self.entries
    }
}

/// Convert a number read from `file`, refusing values the fixed-point
/// representation cannot hold.
fn quantity(
    value: f64,
    file: &Path,
    field: impl FnOnce() -> String,
) -> Result<Quantity, DataLoadError> {
    checked_f64_to_fixed64(value).ok_or_else(|| DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        field: field(),
        value,
    })
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Everything resolved from a data directory.
#[derive(Debug, Clone)]
pub struct GameData {
    pub registry: Registry,
    pub hosts: HashMap<String, HostTemplate>,
    pub upgrades: HashMap<String, Vec<UpgradeLevel>>,
}

impl GameData {
    pub fn host(&self, name: &str) -> Option<&HostTemplate> {
        self.hosts.get(name)
    }

    pub fn resource(&self, name: &str) -> Option<ResourceKind> {
        self.registry.resource_id(name)
    }
}

/// Load `resources` (required), then `recipes`, `upgrades` and `hosts`
/// (optional) from `dir`, resolving every name reference.
pub fn load_game_data(dir: &Path) -> Result<GameData, DataLoadError> {
    let data_dir = DataDir::new(dir);
    let mut builder = RegistryBuilder::new();

    let path = data_dir.require("resources")?;
    let mut resources = NameTable::new("resource");
    for resource in data_dir.read_list::<ResourceData>(&path, "resources")? {
        resources.define(&resource.name, &path, || {
            Ok(builder.register_resource(&resource.name)?)
        })?;
    }

    let mut recipes = NameTable::new("recipe");
    if let Some(path) = data_dir.find("recipes")? {
        for data in data_dir.read_list::<RecipeData>(&path, "recipes")? {
            recipes.define(&data.name, &path, || {
                let recipe = resolve_recipe(&data, &resources, &path)?;
                builder.register_recipe(&data.name, recipe.clone())?;
                Ok(recipe)
            })?;
        }
    }

    let mut upgrades = NameTable::new("upgrade track");
    if let Some(path) = data_dir.find("upgrades")? {
        for track in data_dir.read_list::<UpgradeTrackData>(&path, "upgrades")? {
            upgrades.define(&track.name, &path, || resolve_track(&track, &resources, &path))?;
        }
    }

    let mut hosts = NameTable::new("host");
    if let Some(path) = data_dir.find("hosts")? {
        for data in data_dir.read_list::<HostData>(&path, "hosts")? {
            hosts.define(&data.name, &path, || {
                resolve_host(&data, &resources, &recipes, &upgrades, &path)
            })?;
        }
    }

    let registry = builder.build()?;
    let hosts = hosts.into_map();
    let upgrades = upgrades.into_map();
    tracing::debug!(
        target: "portage::data",
        dir = %dir.display(),
        resources = registry.resource_count(),
        recipes = registry.recipe_count(),
        hosts = hosts.len(),
        upgrade_tracks = upgrades.len(),
        "loaded game data"
    );

    Ok(GameData {
        registry,
        hosts,
        upgrades,
    })
}

fn resolve_entries(
    recipe: &str,
    side: &str,
    entries: &[(String, f64)],
    resources: &NameTable<ResourceKind>,
    file: &Path,
) -> Result<Vec<RecipeEntry>, DataLoadError> {
    entries
        .iter()
        .map(|(name, amount)| {
            let kind = *resources.lookup(name, file)?;
            let amount = quantity(*amount, file, || {
                format!("recipe '{recipe}' {side} amount of '{name}'")
            })?;
            Ok(RecipeEntry::new(kind, amount))
        })
        .collect()
}

fn resolve_recipe(
    data: &RecipeData,
    resources: &NameTable<ResourceKind>,
    file: &Path,
) -> Result<Recipe, DataLoadError> {
    let name = &data.name;
    Ok(Recipe::new(
        resolve_entries(name, "input", &data.inputs, resources, file)?,
        resolve_entries(name, "output", &data.outputs, resources, file)?,
        quantity(data.duration, file, || format!("recipe '{name}' duration"))?,
    ))
}

fn resolve_modifier(
    data: &ModifierData,
    track: &str,
    file: &Path,
) -> Result<StatModifier, DataLoadError> {
    Ok(match data {
        ModifierData::Add { stat, value } => StatModifier::Add {
            stat: stat.clone(),
            value: quantity(*value, file, || format!("track '{track}' modifier '{stat}'"))?,
        },
        ModifierData::Multiply { stat, factor } => StatModifier::Multiply {
            stat: stat.clone(),
            factor: quantity(*factor, file, || format!("track '{track}' modifier '{stat}'"))?,
        },
    })
}

fn resolve_track(
    track: &UpgradeTrackData,
    resources: &NameTable<ResourceKind>,
    file: &Path,
) -> Result<Vec<UpgradeLevel>, DataLoadError> {
    let name = &track.name;
    let mut levels = Vec::with_capacity(track.levels.len());
    for (index, level) in track.levels.iter().enumerate() {
        let material = *resources.lookup(&level.material, file)?;
        let amount = quantity(level.amount, file, || {
            format!("track '{name}' level {} amount", index + 1)
        })?;
        let mut resolved = UpgradeLevel::new(material, amount);
        for modifier in &level.modifiers {
            resolved = resolved.with_modifier(resolve_modifier(modifier, name, file)?);
        }
        levels.push(resolved);
    }
    validate_levels(&levels).map_err(|source| DataLoadError::InvalidUpgradeTrack {
        file: file.to_path_buf(),
        track: name.clone(),
        source,
    })?;
    Ok(levels)
}

fn port_config(host: &str, data: &PortData, file: &Path) -> Result<PortConfig, DataLoadError> {
    let field = |what: &str| format!("host '{host}' port '{}' {what}", data.name);
    let capacity = match data.capacity {
        Some(cap) => Capacity::Bounded(quantity(cap, file, || field("capacity"))?),
        None => Capacity::Unbounded,
    };
    let rate = quantity(data.rate, file, || field("rate"))?;
    Ok(PortConfig::new(&data.name, data.access, capacity)
        .with_rate(rate)
        .with_lock_policy(data.lock))
}

fn resolve_host(
    data: &HostData,
    resources: &NameTable<ResourceKind>,
    recipes: &NameTable<Recipe>,
    upgrades: &NameTable<Vec<UpgradeLevel>>,
    file: &Path,
) -> Result<HostTemplate, DataLoadError> {
    let mut config = HostConfig::new(&data.name)
        .with_connections(data.max_incoming, data.max_outgoing);
    for port in &data.ports {
        config = config.with_port(port_config(&data.name, port, file)?);
    }
    if let Some(whitelist) = &data.whitelist {
        let kinds = whitelist
            .iter()
            .map(|name| resources.lookup(name, file).copied())
            .collect::<Result<BTreeSet<_>, _>>()?;
        config = config.with_admission(Admission::Whitelist(kinds));
    }
    if let Some(port) = &data.upgrade_port {
        config = config.with_upgrade_port(port);
    }
    config
        .validate()
        .map_err(|source| DataLoadError::InvalidHost {
            file: file.to_path_buf(),
            source,
        })?;

    let mut template = HostTemplate::new(config);
    if let Some(name) = &data.recipe {
        template.recipe = Some(recipes.lookup(name, file)?.clone());
    }
    template.distributor = data.distributor.clone();
    if let Some(extractor) = &data.extractor {
        template.extractor = Some(ExtractorTemplate {
            kind: *resources.lookup(&extractor.resource, file)?,
            rate: quantity(extractor.rate, file, || {
                format!("host '{}' extractor rate", data.name)
            })?,
            port: extractor.port.clone(),
        });
    }
    if let Some(name) = &data.upgrades {
        template.upgrades = upgrades.lookup(name, file)?.clone();
    }
    Ok(template)
}

// ===========================================================================
// Tests
// ===========================================================================
