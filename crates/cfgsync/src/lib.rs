//! # cfgsync
//!
//! Keeps a shared registry of named configuration objects consistent
//! across a server and many clients.
//!
//! One sync actor owns the authoritative `added`, `updated` and `removed`
//! sets. Admin clients submit changes, the actor applies each request as
//! one transaction, and every subscriber replays the resulting commit
//! onto its own registry. Clients skip commits they originated, so a
//! local edit never bounces back onto itself.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cfgsync::prelude::*;
//!
//! # async fn run() -> Result<(), CfgsyncError> {
//! let server = SyncServer::builder(AdminList::new([ClientId(1)])).spawn();
//!
//! let registry = ConfigRegistry::new().with_group(MemoryGroup::new("Weapon"))?;
//! let admin = ClientLink::connect(ClientId(1), registry, server.clone()).await?;
//!
//! let sword = ConfigEntry::new(ConfigKey::new("Weapon", "sword"), ConfigValue(vec![7]));
//! admin.edit(move |registry| registry.add(&sword)).await??;
//! # Ok(())
//! # }
//! ```
//!
//! ## Crates
//!
//! - `cfgsync-protocol`: keys, entries, events and the codec
//! - `cfgsync-session`: authorization and subscriber tracking
//! - `cfgsync-registry`: local config groups and the updater
//! - `cfgsync-server`: shared sets and the sync actor
//! - `cfgsync-client`: the director with echo suppression
//! - `cfgsync-scene`: acknowledged-baseline scene deltas

mod error;
mod link;

pub use error::CfgsyncError;
pub use link::{ChannelUpstream, ClientLink};

pub use cfgsync_client as client;
pub use cfgsync_protocol as protocol;
pub use cfgsync_registry as registry;
pub use cfgsync_scene as scene;
pub use cfgsync_server as server;
pub use cfgsync_session as session;

pub mod prelude {
    //! The types most programs need.

    pub use crate::{CfgsyncError, ClientLink};
    pub use cfgsync_client::{ClientSyncDirector, Upstream};
    pub use cfgsync_protocol::{
        ClientId, ConfigEntry, ConfigKey, ConfigValue, JsonCodec, SyncEvent,
        UpdateConfigs,
    };
    pub use cfgsync_registry::{
        ConfigGroup, ConfigHandle, ConfigRegistry, MemoryGroup, TypedGroup,
    };
    pub use cfgsync_server::{ServerConfig, SyncHandle, SyncServer};
    pub use cfgsync_session::{AdminList, AllowAll, Authorizer, Privilege};
}
