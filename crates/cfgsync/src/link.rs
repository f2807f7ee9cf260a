//! Runs a client sync director against an in-process sync actor.
//!
//! A [`ClientLink`] owns a Tokio task holding the
//! [`ClientSyncDirector`] and its registry. The task waits on two
//! channels: sync events from the server and commands from the link
//! handle. Outbound requests go through a second task that forwards them
//! to the [`SyncHandle`] in order.
//!
//! ```text
//!             edit / read                 UpdateConfigs
//! ClientLink ────────────→ director task ──────────────→ forwarder ──→ SyncHandle
//!                               ▲                                         │
//!                               └─────────────── SyncEvent ───────────────┘
//! ```

use cfgsync_client::{ClientError, ClientSyncDirector, Upstream};
use cfgsync_protocol::{ClientId, SyncEvent, UpdateConfigs};
use cfgsync_registry::ConfigRegistry;
use cfgsync_server::SyncHandle;
use cfgsync_session::Attach;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::CfgsyncError;

type Edit = Box<dyn FnOnce(&mut ConfigRegistry) + Send>;
type Read = Box<dyn FnOnce(&ConfigRegistry) + Send>;

enum LinkCommand {
    Edit(Edit),
    Read(Read),
    Connect {
        events: mpsc::UnboundedReceiver<SyncEvent>,
        upstream: ChannelUpstream,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
}

/// Upstream that queues requests for a forwarder task.
pub struct ChannelUpstream {
    sender: mpsc::UnboundedSender<UpdateConfigs>,
}

impl ChannelUpstream {
    /// Spawns a forwarder that submits every queued request to `handle`
    /// on behalf of `client_id`. The forwarder exits when the upstream is
    /// dropped or the actor goes away.
    pub fn spawn(client_id: ClientId, handle: SyncHandle) -> Self {
        let (sender, mut requests) = mpsc::unbounded_channel::<UpdateConfigs>();
        tokio::spawn(async move {
            while let Some(request) = requests.recv().await {
                if let Err(e) = handle.update_configs(client_id, request).await {
                    tracing::warn!(%client_id, error = %e, "forwarding stopped");
                    break;
                }
            }
        });
        Self { sender }
    }
}

impl Upstream for ChannelUpstream {
    fn send(&mut self, request: UpdateConfigs) -> Result<(), ClientError> {
        self.sender
            .send(request)
            .map_err(|_| ClientError::UpstreamClosed)
    }
}

/// A subscribed client with its own registry.
///
/// # Example
///
/// ```rust,no_run
/// use cfgsync::prelude::*;
///
/// # async fn run() -> Result<(), CfgsyncError> {
/// let server = SyncServer::builder(AllowAll).spawn();
/// let registry = ConfigRegistry::new().with_group(MemoryGroup::new("Weapon"))?;
/// let link = ClientLink::connect(ClientId(1), registry, server).await?;
///
/// let entry = ConfigEntry::new(ConfigKey::new("Weapon", "sword"), ConfigValue(vec![1]));
/// link.edit(move |registry| registry.add(&entry)).await??;
/// # Ok(())
/// # }
/// ```
pub struct ClientLink {
    client_id: ClientId,
    handle: SyncHandle,
    commands: mpsc::Sender<LinkCommand>,
    task: JoinHandle<()>,
}

impl ClientLink {
    /// Subscribes `client_id` through `handle` and starts the director
    /// task. The registry is reseeded from the server's snapshot before
    /// any other event is applied.
    pub async fn connect(
        client_id: ClientId,
        registry: ConfigRegistry,
        handle: SyncHandle,
    ) -> Result<Self, CfgsyncError> {
        let director = ClientSyncDirector::new(client_id, registry);
        let (commands, receiver) = mpsc::channel(32);
        let task = tokio::spawn(run_director(director, receiver));

        let link = Self {
            client_id,
            handle,
            commands,
            task,
        };
        link.reconnect().await?;
        Ok(link)
    }

    /// The client this link subscribes as.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Subscribes again after [`disconnect`](Self::disconnect).
    pub async fn reconnect(&self) -> Result<Attach, CfgsyncError> {
        let (tx, events) = mpsc::unbounded_channel();
        let attach = self.handle.subscribe(self.client_id, tx).await?;
        let upstream = ChannelUpstream::spawn(self.client_id, self.handle.clone());
        self.send(LinkCommand::Connect { events, upstream }).await?;
        Ok(attach)
    }

    /// Unsubscribes and stops forwarding local edits. The registry keeps
    /// its current contents.
    pub async fn disconnect(&self) -> Result<(), CfgsyncError> {
        let (reply, done) = oneshot::channel();
        self.send(LinkCommand::Disconnect { reply }).await?;
        done.await.map_err(|_| CfgsyncError::LinkStopped)?;
        self.handle.unsubscribe(self.client_id).await?;
        Ok(())
    }

    /// Runs `f` against the local registry and forwards what it changed.
    pub async fn edit<R, F>(&self, f: F) -> Result<R, CfgsyncError>
    where
        R: Send + 'static,
        F: FnOnce(&mut ConfigRegistry) -> R + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.send(LinkCommand::Edit(Box::new(move |registry| {
            let _ = reply.send(f(registry));
        })))
        .await?;
        result.await.map_err(|_| CfgsyncError::LinkStopped)
    }

    /// Runs `f` against the local registry.
    pub async fn read<R, F>(&self, f: F) -> Result<R, CfgsyncError>
    where
        R: Send + 'static,
        F: FnOnce(&ConfigRegistry) -> R + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.send(LinkCommand::Read(Box::new(move |registry| {
            let _ = reply.send(f(registry));
        })))
        .await?;
        result.await.map_err(|_| CfgsyncError::LinkStopped)
    }

    /// Unsubscribes and waits for the director task to finish.
    pub async fn shutdown(self) -> Result<(), CfgsyncError> {
        let disconnected = self.disconnect().await;
        drop(self.commands);
        self.task.await.map_err(|_| CfgsyncError::LinkStopped)?;
        disconnected
    }

    async fn send(&self, command: LinkCommand) -> Result<(), CfgsyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CfgsyncError::LinkStopped)
    }
}

async fn run_director(
    mut director: ClientSyncDirector<ChannelUpstream>,
    mut commands: mpsc::Receiver<LinkCommand>,
) {
    let client_id = director.client_id();
    let mut events: Option<mpsc::UnboundedReceiver<SyncEvent>> = None;

    loop {
        tokio::select! {
            event = next_event(&mut events) => match event {
                Some(event) => director.handle_event(&event),
                None => {
                    tracing::warn!(%client_id, "sync actor closed the subscription");
                    events = None;
                    director.disconnect();
                }
            },
            command = commands.recv() => match command {
                Some(LinkCommand::Edit(f)) => director.edit(f),
                Some(LinkCommand::Read(f)) => f(director.registry()),
                Some(LinkCommand::Connect {
                    events: rx,
                    upstream,
                }) => {
                    director.connect(upstream);
                    events = Some(rx);
                }
                Some(LinkCommand::Disconnect { reply }) => {
                    director.disconnect();
                    events = None;
                    let _ = reply.send(());
                }
                None => break,
            },
        }
    }

    tracing::debug!(%client_id, "client link stopped");
}

async fn next_event(
    events: &mut Option<mpsc::UnboundedReceiver<SyncEvent>>,
) -> Option<SyncEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
