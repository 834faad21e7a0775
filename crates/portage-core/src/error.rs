//! Construction-time errors.
//!
//! Gameplay operations (insert, remove, tick) never fail loudly; they return
//! zero or `false`. These errors cover building hosts and wiring behaviours,
//! where a caller mistake should surface immediately.

use crate::id::{HostId, LinkId};

/// Invalid host, port or recipe configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("host '{host}' declares no ports")]
    NoPorts { host: String },

    #[error("host '{host}' declares port '{port}' more than once")]
    DuplicatePort { host: String, port: String },

    #[error("port '{port}' on host '{host}' has a non-positive capacity")]
    ZeroCapacity { host: String, port: String },

    #[error("upgrade port '{port}' is not declared on host '{host}'")]
    UnknownUpgradePort { host: String, port: String },

    #[error("recipe craft duration must be positive")]
    NonPositiveDuration,

    #[error("recipe declares neither inputs nor outputs")]
    EmptyRecipe,

    #[error("recipe entry amount must be positive")]
    NonPositiveAmount,

    #[error("upgrade level {level} requires a non-positive amount")]
    NonPositiveUpgradeAmount { level: usize },
}

/// Errors raised while wiring hosts, behaviours and links.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    #[error("host not found: {0:?}")]
    HostNotFound(HostId),

    #[error("link not found: {0:?}")]
    LinkNotFound(LinkId),

    #[error("port '{port}' not found on host {host:?}")]
    PortNotFound { host: HostId, port: String },

    #[error("host {0:?} has no free output port to connect")]
    NoFreeOutput(HostId),

    #[error("host {0:?} cannot link to itself")]
    SelfLink(HostId),

    #[error("host {0:?} cannot accept another incoming connection")]
    IncomingLimit(HostId),

    #[error("host {0:?} declares no upgrade port")]
    NoUpgradePort(HostId),

    #[error("distributor receive port '{port}' on host {host:?} must be input-only")]
    InvalidReceivePort { host: HostId, port: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
