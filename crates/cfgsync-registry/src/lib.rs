//! The local config registry and the updater that keeps it in sync.
//!
//! A process holds its configs in a [`ConfigRegistry`]: a table from
//! [`ConfigClass`](cfgsync_protocol::ConfigClass) tags to the
//! [`ConfigGroup`] that stores configs of that type. The table is built
//! once at startup from an explicit list of groups; there is no lookup
//! by runtime type.
//!
//! The [`ConfigUpdater`] applies shared-set changes (a bootstrap
//! [`SetSnapshot`](cfgsync_protocol::SetSnapshot) or live
//! [`EntryEvent`](cfgsync_protocol::EntryEvent)s) to a registry. It never
//! fails: every inconsistency is logged and the entry skipped.
//!
//! # Key types
//!
//! - [`ConfigGroup`]: the per-type storage seam
//! - [`MemoryGroup`]: raw bytes, no decoding
//! - [`TypedGroup`]: decoded `T` instances behind shared handles
//! - [`ConfigRegistry`]: the class → group table plus a change queue
//! - [`ConfigUpdater`]: applies add/update/remove events

mod error;
mod group;
mod registry;
mod typed;
mod updater;

pub use error::RegistryError;
pub use group::{ConfigGroup, GroupWrite, MemoryGroup};
pub use registry::{ConfigRegistry, RegistryEvent};
pub use typed::{ConfigHandle, TypedGroup};
pub use updater::ConfigUpdater;
