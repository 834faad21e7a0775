use crate::distributor::Distributor;
use crate::extractor::Extractor;
use crate::id::HostId;
use crate::production::ProductionUnit;
use crate::upgrade::UpgradeGate;
use slotmap::SecondaryMap;

/// SoA behaviour storage. Each behaviour type has its own SecondaryMap
/// keyed by HostId; a host carries at most one of each.
#[derive(Debug, Default)]
pub struct ComponentStorage {
    pub production: SecondaryMap<HostId, ProductionUnit>,
    pub distributors: SecondaryMap<HostId, Distributor>,
    pub upgrade_gates: SecondaryMap<HostId, UpgradeGate>,
    pub extractors: SecondaryMap<HostId, Extractor>,
}

impl ComponentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all behaviours for a host. In-flight crafts are dropped.
    pub fn remove_host(&mut self, host: HostId) {
        self.production.remove(host);
        self.distributors.remove(host);
        self.upgrade_gates.remove(host);
        self.extractors.remove(host);
    }
}
