//! Authorization and batching in front of the shared sets.

use cfgsync_protocol::{ClientId, Commit, SetSnapshot, UpdateConfigs};
use cfgsync_session::Authorizer;

use crate::SharedEntrySets;

/// Owns the [`SharedEntrySets`] and decides which requests reach them.
pub struct ServerSyncManager<A: Authorizer> {
    sets: SharedEntrySets,
    authorizer: A,
}

impl<A: Authorizer> ServerSyncManager<A> {
    /// Creates a manager over empty sets.
    pub fn new(authorizer: A) -> Self {
        Self {
            sets: SharedEntrySets::new(),
            authorizer,
        }
    }

    /// Read access to the shared sets.
    pub fn sets(&self) -> &SharedEntrySets {
        &self.sets
    }

    /// Copies the shared sets for a new subscriber.
    pub fn snapshot(&self) -> SetSnapshot {
        self.sets.snapshot()
    }

    /// Applies `request` on behalf of `caller`.
    ///
    /// Returns the resulting commit, or `None` when the caller lacks admin
    /// privilege or the request changed nothing. Rejected requests are
    /// logged and otherwise dropped; the caller is not told.
    pub fn request_update(
        &mut self,
        caller: ClientId,
        request: UpdateConfigs,
    ) -> Option<Commit> {
        if !self.authorizer.privilege(caller).is_admin() {
            tracing::warn!(%caller, "update from non-admin, dropping");
            return None;
        }

        let UpdateConfigs { add, update, remove } = request;
        let events = self.sets.apply_batch(add, update, remove);
        if events.is_empty() {
            tracing::debug!(%caller, "update changed nothing");
            return None;
        }

        tracing::debug!(%caller, events = events.len(), "update committed");
        Some(Commit {
            origin: caller,
            events,
        })
    }
}
