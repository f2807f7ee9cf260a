//! Sync actor: the Tokio task that owns the shared sets.
//!
//! Every mutation request, subscription and query goes through the
//! actor's command channel, so transactions are applied strictly one at a
//! time in arrival order and each subscriber sees them in that order.

use std::collections::HashMap;

use cfgsync_protocol::{
    ClientId, Commit, ConfigEntry, SetSnapshot, SyncEvent, UpdateConfigs,
};
use cfgsync_registry::ConfigUpdater;
use cfgsync_session::{Attach, Authorizer, SessionManager};
use tokio::sync::{mpsc, oneshot};

use crate::{ServerSyncManager, SyncError};

/// Channel sender for delivering sync events to one subscriber.
pub type SubscriberSender = mpsc::UnboundedSender<SyncEvent>;

/// Commands sent to the sync actor through its channel.
pub(crate) enum SyncCommand {
    /// Attach a subscriber. Its snapshot is sent before the reply.
    Subscribe {
        client_id: ClientId,
        sender: SubscriberSender,
        reply: oneshot::Sender<Result<Attach, SyncError>>,
    },

    /// Detach a subscriber.
    Unsubscribe {
        client_id: ClientId,
        reply: oneshot::Sender<Result<(), SyncError>>,
    },

    /// Apply a mutation request.
    Update {
        caller: ClientId,
        request: UpdateConfigs,
    },

    /// Copy the current shared sets.
    Snapshot {
        reply: oneshot::Sender<SetSnapshot>,
    },

    /// Read the colocated registry, if there is one.
    LocalConfigs {
        reply: oneshot::Sender<Option<Vec<ConfigEntry>>>,
    },

    /// Stop the actor.
    Shutdown,
}

/// Handle to a running sync actor.
///
/// Cheap to clone: it's an `mpsc::Sender` wrapper.
#[derive(Clone)]
pub struct SyncHandle {
    sender: mpsc::Sender<SyncCommand>,
}

impl SyncHandle {
    pub(crate) fn new(sender: mpsc::Sender<SyncCommand>) -> Self {
        Self { sender }
    }

    /// Subscribes `client_id` to the shared sets.
    ///
    /// The first event delivered on `sender` is always
    /// [`SyncEvent::Snapshot`]; commits follow in order.
    pub async fn subscribe(
        &self,
        client_id: ClientId,
        sender: SubscriberSender,
    ) -> Result<Attach, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SyncCommand::Subscribe {
            client_id,
            sender,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SyncError::Unavailable)?
    }

    /// Stops delivering events to `client_id`.
    pub async fn unsubscribe(&self, client_id: ClientId) -> Result<(), SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SyncCommand::Unsubscribe {
            client_id,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| SyncError::Unavailable)?
    }

    /// Submits a mutation request (fire-and-forget).
    ///
    /// An unauthorized request is dropped by the actor without notice.
    pub async fn update_configs(
        &self,
        caller: ClientId,
        request: UpdateConfigs,
    ) -> Result<(), SyncError> {
        self.send(SyncCommand::Update { caller, request }).await
    }

    /// Returns the current contents of the shared sets.
    pub async fn snapshot(&self) -> Result<SetSnapshot, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SyncCommand::Snapshot { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SyncError::Unavailable)
    }

    /// Returns every config in the server's colocated registry, sorted by
    /// key, or `None` if the server runs without one.
    pub async fn local_configs(&self) -> Result<Option<Vec<ConfigEntry>>, SyncError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SyncCommand::LocalConfigs { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| SyncError::Unavailable)
    }

    /// Tells the actor to stop.
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        self.send(SyncCommand::Shutdown).await
    }

    async fn send(&self, command: SyncCommand) -> Result<(), SyncError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| SyncError::Unavailable)
    }
}

/// The actor state. Runs inside a Tokio task.
pub(crate) struct SyncActor<A: Authorizer> {
    pub(crate) manager: ServerSyncManager<A>,
    pub(crate) sessions: SessionManager,
    pub(crate) subscribers: HashMap<ClientId, SubscriberSender>,
    /// The updater colocated with the shared sets.
    pub(crate) local: Option<ConfigUpdater>,
    pub(crate) receiver: mpsc::Receiver<SyncCommand>,
}

impl<A: Authorizer> SyncActor<A> {
    /// Runs the actor loop, processing commands until shutdown or until
    /// every handle is dropped.
    pub(crate) async fn run(mut self) {
        tracing::info!("sync actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SyncCommand::Subscribe {
                    client_id,
                    sender,
                    reply,
                } => {
                    let result = self.handle_subscribe(client_id, sender);
                    let _ = reply.send(result);
                }
                SyncCommand::Unsubscribe { client_id, reply } => {
                    let result = self.handle_unsubscribe(client_id);
                    let _ = reply.send(result);
                }
                SyncCommand::Update { caller, request } => {
                    self.handle_update(caller, request);
                }
                SyncCommand::Snapshot { reply } => {
                    let _ = reply.send(self.manager.snapshot());
                }
                SyncCommand::LocalConfigs { reply } => {
                    let _ = reply.send(self.local_configs());
                }
                SyncCommand::Shutdown => {
                    tracing::info!("sync actor shutting down");
                    break;
                }
            }
        }

        tracing::info!(
            subscribers = self.subscribers.len(),
            "sync actor stopped"
        );
    }

    fn handle_subscribe(
        &mut self,
        client_id: ClientId,
        sender: SubscriberSender,
    ) -> Result<Attach, SyncError> {
        self.expire_sessions();
        let attach = self.sessions.attach(client_id)?;
        if let Attach::Resumed { attach_count } = attach {
            tracing::debug!(%client_id, attach_count, "resyncing subscriber");
        }

        // Sent from inside this command, so no commit can overtake it.
        let snapshot = self.manager.snapshot();
        if sender.send(SyncEvent::Snapshot(snapshot)).is_err() {
            tracing::warn!(%client_id, "subscriber gone before snapshot");
            self.sessions.detach(client_id)?;
            return Err(SyncError::Unavailable);
        }
        self.subscribers.insert(client_id, sender);
        Ok(attach)
    }

    fn handle_unsubscribe(&mut self, client_id: ClientId) -> Result<(), SyncError> {
        self.sessions.detach(client_id)?;
        self.subscribers.remove(&client_id);
        self.expire_sessions();
        Ok(())
    }

    /// Forgets sessions detached for longer than the retention window.
    fn expire_sessions(&mut self) {
        let expired = self.sessions.expire_detached();
        if !expired.is_empty() {
            tracing::debug!(
                count = expired.len(),
                remaining = self.sessions.len(),
                "forgot detached sessions"
            );
        }
    }

    fn handle_update(&mut self, caller: ClientId, request: UpdateConfigs) {
        let Some(commit) = self.manager.request_update(caller, request) else {
            return;
        };

        if let Some(local) = &mut self.local {
            local.apply_commit(&commit);
            // The colocated registry only follows the sets; its change
            // queue has no listener.
            local.registry_mut().drain_events();
        }

        self.broadcast(commit);
    }

    /// Sends `commit` to every attached subscriber, detaching any whose
    /// receiver is gone.
    fn broadcast(&mut self, commit: Commit) {
        let event = SyncEvent::Commit(commit);
        let mut gone = Vec::new();
        for client_id in self.sessions.attached() {
            let delivered = self
                .subscribers
                .get(&client_id)
                .is_some_and(|sender| sender.send(event.clone()).is_ok());
            if !delivered {
                gone.push(client_id);
            }
        }

        for client_id in gone {
            tracing::debug!(%client_id, "subscriber channel closed, detaching");
            self.subscribers.remove(&client_id);
            let _ = self.sessions.detach(client_id);
        }
    }

    fn local_configs(&self) -> Option<Vec<ConfigEntry>> {
        let registry = self.local.as_ref()?.registry();
        let entries = registry
            .keys()
            .into_iter()
            .filter_map(|key| {
                let value = registry.raw(&key)?.clone();
                Some(ConfigEntry::new(key, value))
            })
            .collect();
        Some(entries)
    }
}
