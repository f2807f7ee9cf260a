//! Unified error type for cfgsync.

use cfgsync_client::ClientError;
use cfgsync_protocol::ProtocolError;
use cfgsync_registry::RegistryError;
use cfgsync_scene::DeltaError;
use cfgsync_server::SyncError;
use cfgsync_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impl,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CfgsyncError {
    /// Encoding or decoding a config value failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Attaching or detaching a subscriber failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A local registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The sync actor rejected or couldn't take a command.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// A director couldn't reach its upstream.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A scene delta couldn't be composed or applied.
    #[error(transparent)]
    Delta(#[from] DeltaError),

    /// The client link's task has stopped.
    #[error("client link stopped")]
    LinkStopped,
}
