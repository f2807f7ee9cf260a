//! The authoritative side of cfgsync.
//!
//! One sync actor per process owns the three shared sets (`added`,
//! `updated`, `removed`). It authorizes every mutation request, applies it
//! as a single transaction, and broadcasts the resulting [`Commit`] to all
//! subscribers.
//!
//! # Key types
//!
//! - [`SharedEntrySets`]: the sets and their reconciliation rules
//! - [`ServerSyncManager`]: authorization gate in front of the sets
//! - [`SyncServer`]: builds and spawns the actor
//! - [`SyncHandle`]: send commands to a running actor
//!
//! [`Commit`]: cfgsync_protocol::Commit

mod actor;
mod builder;
mod config;
mod error;
mod manager;
mod sets;

pub use actor::{SubscriberSender, SyncHandle};
pub use builder::{SyncServer, SyncServerBuilder};
pub use config::ServerConfig;
pub use error::SyncError;
pub use manager::ServerSyncManager;
pub use sets::SharedEntrySets;
