//! Resolved host templates: everything needed to spawn a configured host
//! and attach its behaviours in one call.

use portage_core::error::NetworkError;
use portage_core::fixed::Quantity;
use portage_core::host::HostConfig;
use portage_core::id::{HostId, ResourceKind};
use portage_core::network::Network;
use portage_core::recipe::Recipe;
use portage_core::upgrade::UpgradeLevel;

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractorTemplate {
    pub kind: ResourceKind,
    pub rate: Quantity,
    pub port: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HostTemplate {
    pub config: HostConfig,
    pub recipe: Option<Recipe>,
    /// Receive port name when the host is a splitter.
    pub distributor: Option<String>,
    pub extractor: Option<ExtractorTemplate>,
    /// Empty when the host has no upgrade track.
    pub upgrades: Vec<UpgradeLevel>,
}

impl HostTemplate {
    pub fn new(config: HostConfig) -> Self {
        Self {
            config,
            recipe: None,
            distributor: None,
            extractor: None,
            upgrades: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Spawn the host into `net` and attach every configured behaviour.
    /// On failure the half-built host is destroyed again.
    pub fn spawn(&self, net: &mut Network) -> Result<HostId, NetworkError> {
        let id = net.spawn(self.config.clone())?;
        if let Err(err) = self.attach(net, id) {
            net.destroy(id)?;
            return Err(err);
        }
        Ok(id)
    }

    fn attach(&self, net: &mut Network, id: HostId) -> Result<(), NetworkError> {
        if let Some(recipe) = &self.recipe {
            net.attach_production(id, recipe.clone())?;
        }
        if let Some(port) = &self.distributor {
            net.attach_distributor(id, port)?;
        }
        if let Some(extractor) = &self.extractor {
            net.attach_extractor(id, extractor.kind, extractor.rate, &extractor.port)?;
        }
        if !self.upgrades.is_empty() {
            net.attach_upgrade_gate(id, self.upgrades.clone())?;
        }
        Ok(())
    }
}
