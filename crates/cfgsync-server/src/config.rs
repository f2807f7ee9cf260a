//! Server configuration.

use cfgsync_session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Settings for a [`SyncServer`](crate::SyncServer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Capacity of the actor's command channel. Callers wait when it fills.
    ///
    /// Default: 64.
    pub command_channel_size: usize,

    /// Subscriber limits.
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command_channel_size: 64,
            session: SessionConfig::default(),
        }
    }
}
