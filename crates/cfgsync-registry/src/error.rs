//! Error types for the registry layer.

use cfgsync_protocol::{ConfigClass, ConfigKey, ProtocolError};

/// Errors that can occur while reading or mutating a registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No group is registered for this config class.
    #[error("no group registered for config class {0}")]
    UnknownClass(ConfigClass),

    /// Two groups were registered under the same class.
    #[error("config class {0} registered twice")]
    DuplicateClass(ConfigClass),

    /// The group exists but holds no config with this name.
    #[error("config {0} not found")]
    Missing(ConfigKey),

    /// A stored value couldn't be decoded into the group's config type.
    #[error("bad value for {key}: {source}")]
    Value {
        key: ConfigKey,
        #[source]
        source: ProtocolError,
    },
}
