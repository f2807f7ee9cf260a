//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding config values.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serializing a config into a [`ConfigValue`](crate::ConfigValue) failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The bytes of a [`ConfigValue`](crate::ConfigValue) don't describe
    /// the requested config type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A failure reported by a codec other than [`JsonCodec`](crate::JsonCodec).
    #[error("codec error: {0}")]
    Codec(String),
}
