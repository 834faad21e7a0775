use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies an inventory host (a building-like entity) in the network.
    pub struct HostId;

    /// Identifies a physical link (belt) between two hosts.
    pub struct LinkId;

    /// Identifies a pending one-shot timed action.
    pub struct TimerId;

    /// Handle returned when registering an event listener. Pass it back to
    /// unsubscribe.
    pub struct SubscriptionId;
}

/// Identifies a fungible resource kind. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKind(pub u32);

/// Identifies a named recipe in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);

/// Position of a port inside its host, in declared order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PortIndex(pub usize);
