//! Session types: the server's record of one subscriber.

use std::time::{Duration, Instant};

use cfgsync_protocol::ClientId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Limits for the session layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of simultaneously attached subscribers.
    ///
    /// Default: 0, meaning unlimited.
    pub max_subscribers: usize,

    /// How long (in seconds) a detached session is remembered. A client
    /// that attaches again within this window is resumed; after it, the
    /// session is forgotten and the next attach is fresh.
    ///
    /// Default: 300 seconds. Set to 0 to forget on detach.
    pub detached_retention_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 0,
            detached_retention_secs: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Whether a subscriber is currently receiving broadcasts.
///
/// ```text
///   Attached ──(detach)──→ Detached ──(retention elapsed)──→ forgotten
///       ↑                     │
///       └──────(attach)───────┘
/// ```
///
/// A detached session is kept for a while so that the next attach can be
/// recognized as a resync rather than a first contact.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Receiving snapshot and commits.
    Attached,
    /// Not receiving anything since the given instant.
    Detached { since: Instant },
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A single subscriber's session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Which client this session belongs to.
    pub client_id: ClientId,

    /// Current state.
    pub state: SessionState,

    /// How many times this client has attached, counting the first.
    pub attach_count: u32,
}

impl Session {
    /// Returns `true` while the client is attached.
    pub fn is_attached(&self) -> bool {
        matches!(self.state, SessionState::Attached)
    }

    /// Returns `true` if the session has been detached for at least
    /// `retention`.
    pub fn is_expired(&self, retention: Duration) -> bool {
        match self.state {
            SessionState::Attached => false,
            SessionState::Detached { since } => since.elapsed() >= retention,
        }
    }
}
