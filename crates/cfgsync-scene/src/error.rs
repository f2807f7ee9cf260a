//! Error types for scene deltas.

/// Errors from composing or applying a [`SceneDelta`](crate::SceneDelta).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// The delta was computed against a snapshot the receiver doesn't
    /// hold. The sender has to fall back to a self-contained delta.
    #[error("no snapshot at reference {reference}")]
    MissingReference { reference: u64 },

    /// A delta's timestamp must be greater than the previous one sent.
    #[error("timestamp {timestamp} is not after {last}")]
    NonMonotonic { last: u64, timestamp: u64 },
}
