//! The subscriber side of cfgsync.
//!
//! A [`ClientSyncDirector`] owns one local registry. It forwards local
//! edits to the server through an [`Upstream`] and applies the server's
//! [`SyncEvent`](cfgsync_protocol::SyncEvent)s back onto the registry,
//! using a [`ChangeBlock`] so neither direction triggers the other.

mod director;
mod error;
mod guard;

pub use director::{ClientSyncDirector, Upstream};
pub use error::ClientError;
pub use guard::{ChangeBlock, ChangeGuard};
