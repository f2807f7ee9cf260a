//! Error types for the session layer.

use cfgsync_protocol::ClientId;

/// Errors that can occur while attaching or detaching subscribers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The client is already attached. A client holds at most one
    /// subscription at a time.
    #[error("client {0} is already attached")]
    AlreadyAttached(ClientId),

    /// No session exists for the client.
    #[error("no session for client {0}")]
    NotFound(ClientId),

    /// The configured subscriber limit has been reached.
    #[error("subscriber limit of {0} reached")]
    Full(usize),
}
