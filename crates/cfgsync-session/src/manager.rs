//! The session manager: tracks every client attached to the shared object.
//!
//! # Concurrency note
//!
//! `SessionManager` is a plain `HashMap` wrapper. It is owned by the
//! server's sync actor and only ever touched from that task, the same
//! single-threaded discipline the shared sets follow.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use cfgsync_protocol::ClientId;

use crate::{Session, SessionConfig, SessionError, SessionState};

/// The outcome of a successful [`SessionManager::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attach {
    /// First time this client attaches.
    Fresh,
    /// The client was attached before and is coming back; `attach_count`
    /// includes this attach.
    Resumed { attach_count: u32 },
}

/// Tracks attached and recently detached subscribers.
///
/// ## Lifecycle
///
/// ```text
/// attach() ──→ [Attached] ──detach()──→ [Detached] ──attach()──→ [Attached]
///                                            │
///                                            ▼ (after detached_retention_secs)
///                                     expire_detached()
/// ```
pub struct SessionManager {
    sessions: HashMap<ClientId, Session>,
    config: SessionConfig,
}

impl SessionManager {
    /// Creates an empty manager.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    /// Attaches `client_id`, creating its session if needed.
    ///
    /// # Errors
    /// - [`SessionError::AlreadyAttached`] if the client is attached.
    /// - [`SessionError::Full`] if `max_subscribers` would be exceeded.
    pub fn attach(
        &mut self,
        client_id: ClientId,
    ) -> Result<Attach, SessionError> {
        let limit = self.config.max_subscribers;
        if limit > 0 && self.attached_count() >= limit {
            return Err(SessionError::Full(limit));
        }

        if let Some(session) = self.sessions.get_mut(&client_id) {
            if session.is_attached() {
                return Err(SessionError::AlreadyAttached(client_id));
            }
            session.state = SessionState::Attached;
            session.attach_count += 1;
            tracing::info!(
                %client_id,
                attach_count = session.attach_count,
                "subscriber re-attached"
            );
            return Ok(Attach::Resumed {
                attach_count: session.attach_count,
            });
        }

        self.sessions.insert(
            client_id,
            Session {
                client_id,
                state: SessionState::Attached,
                attach_count: 1,
            },
        );
        tracing::info!(%client_id, "subscriber attached");
        Ok(Attach::Fresh)
    }

    /// Marks `client_id` as detached.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the client never attached.
    pub fn detach(&mut self, client_id: ClientId) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get_mut(&client_id)
            .ok_or(SessionError::NotFound(client_id))?;

        session.state = SessionState::Detached {
            since: Instant::now(),
        };
        tracing::info!(%client_id, "subscriber detached");
        Ok(())
    }

    /// Forgets every session detached for longer than the retention
    /// window and returns their ids.
    pub fn expire_detached(&mut self) -> Vec<ClientId> {
        let retention = Duration::from_secs(self.config.detached_retention_secs);
        let mut expired = Vec::new();
        self.sessions.retain(|id, session| {
            if session.is_expired(retention) {
                expired.push(*id);
                false
            } else {
                true
            }
        });
        for client_id in &expired {
            tracing::info!(%client_id, "detached session expired");
        }
        expired
    }

    /// Returns `true` if `client_id` is attached.
    pub fn is_attached(&self, client_id: &ClientId) -> bool {
        self.sessions
            .get(client_id)
            .is_some_and(Session::is_attached)
    }

    /// Iterates over the ids of attached clients.
    pub fn attached(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.sessions
            .values()
            .filter(|s| s.is_attached())
            .map(|s| s.client_id)
    }

    /// Number of attached clients.
    pub fn attached_count(&self) -> usize {
        self.attached().count()
    }

    /// Looks up a session.
    pub fn get(&self, client_id: &ClientId) -> Option<&Session> {
        self.sessions.get(client_id)
    }

    /// Number of known sessions (attached or detached).
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns `true` if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
