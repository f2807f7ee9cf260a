//! Error types for the sync server.

use cfgsync_session::SessionError;

/// Errors returned through a [`SyncHandle`](crate::SyncHandle).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The sync actor has stopped or its command channel is closed.
    #[error("sync actor is unavailable")]
    Unavailable,

    /// Attaching or detaching the subscriber failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}
