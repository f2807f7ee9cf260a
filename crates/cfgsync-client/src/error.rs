//! Error types for the client side.

/// Errors an [`Upstream`](crate::Upstream) reports back to the director.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The link to the server is gone; the request was not sent.
    #[error("upstream closed")]
    UpstreamClosed,

    /// The director has no upstream attached.
    #[error("not connected")]
    NotConnected,
}
