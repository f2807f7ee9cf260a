//! `SyncServer` builder.

use std::collections::HashMap;

use cfgsync_registry::{ConfigRegistry, ConfigUpdater};
use cfgsync_session::{Authorizer, SessionManager};
use tokio::sync::mpsc;

use crate::actor::SyncActor;
use crate::{ServerConfig, ServerSyncManager, SyncHandle};

/// Entry point for starting a sync actor.
///
/// # Example
///
/// ```rust,no_run
/// use cfgsync_registry::{ConfigRegistry, MemoryGroup};
/// use cfgsync_server::SyncServer;
/// use cfgsync_session::AllowAll;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = ConfigRegistry::new().with_group(MemoryGroup::new("Weapon"))?;
/// let handle = SyncServer::builder(AllowAll)
///     .local_registry(registry)
///     .spawn();
/// let snapshot = handle.snapshot().await?;
/// assert!(snapshot.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct SyncServer;

impl SyncServer {
    /// Creates a builder that gates mutations with `authorizer`.
    pub fn builder<A: Authorizer>(authorizer: A) -> SyncServerBuilder<A> {
        SyncServerBuilder {
            authorizer,
            config: ServerConfig::default(),
            local: None,
        }
    }
}

/// Builder for configuring and spawning a sync actor.
pub struct SyncServerBuilder<A: Authorizer> {
    authorizer: A,
    config: ServerConfig,
    local: Option<ConfigRegistry>,
}

impl<A: Authorizer> SyncServerBuilder<A> {
    /// Sets the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Gives the server its own registry. Every committed batch is
    /// applied to it, like on any subscriber.
    pub fn local_registry(mut self, registry: ConfigRegistry) -> Self {
        self.local = Some(registry);
        self
    }

    /// Spawns the actor task and returns a handle to it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> SyncHandle {
        let (tx, rx) = mpsc::channel(self.config.command_channel_size.max(1));

        let actor = SyncActor {
            manager: ServerSyncManager::new(self.authorizer),
            sessions: SessionManager::new(self.config.session),
            subscribers: HashMap::new(),
            local: self.local.map(ConfigUpdater::new),
            receiver: rx,
        };

        tokio::spawn(actor.run());

        SyncHandle::new(tx)
    }
}
