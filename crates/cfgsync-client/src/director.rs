//! The client sync director.
//!
//! Sits between one local [`ConfigRegistry`] and the server:
//!
//! ```text
//! local edits ──drain──→ flush_local ──→ Upstream::send ──→ server
//! server ──SyncEvent──→ handle_event ──→ ConfigUpdater ──→ local registry
//! ```
//!
//! Both directions run inside the same [`ChangeBlock`]. Registry events
//! produced while the block is entered are the director's own doing and
//! are thrown away instead of being forwarded, and commits that carry
//! this client's id are echoes of changes already applied locally.
//!
//! A snapshot only says what the shared sets hold now, not what left them.
//! The director therefore remembers which keys it holds because of the
//! sets, and which local adds the server may never have taken. On every
//! snapshot, the ones it no longer lists are deleted locally.

use std::collections::BTreeSet;

use cfgsync_protocol::{
    ClientId, Commit, ConfigKey, EntryEvent, SetName, SetSnapshot, SyncEvent,
    UpdateConfigs,
};
use cfgsync_registry::{ConfigRegistry, ConfigUpdater, RegistryEvent};

use crate::{ChangeBlock, ClientError};

/// Where the director sends mutation requests.
///
/// Sending is fire-and-forget: the server never answers a request, it
/// only broadcasts the resulting commit.
pub trait Upstream {
    /// Hands `request` to the server.
    ///
    /// # Errors
    /// Returns [`ClientError::UpstreamClosed`] if the link is gone.
    fn send(&mut self, request: UpdateConfigs) -> Result<(), ClientError>;
}

/// Keeps one local registry in step with the shared sets.
pub struct ClientSyncDirector<U: Upstream> {
    client_id: ClientId,
    updater: ConfigUpdater,
    block: ChangeBlock,
    upstream: Option<U>,
    seeded: bool,
    /// Keys last seen in the shared `added` or `updated` set.
    shared: BTreeSet<ConfigKey>,
    /// Local adds forwarded on the current connection and not yet seen in
    /// a commit.
    pending: BTreeSet<ConfigKey>,
    /// Local adds with no known fate: never forwarded, or still pending
    /// when the previous connection ended.
    orphaned: BTreeSet<ConfigKey>,
}

impl<U: Upstream> ClientSyncDirector<U> {
    /// Creates a disconnected director for `client_id` over `registry`.
    ///
    /// Anything already queued in the registry is treated as local
    /// history and discarded.
    pub fn new(client_id: ClientId, mut registry: ConfigRegistry) -> Self {
        registry.drain_events();
        Self {
            client_id,
            updater: ConfigUpdater::new(registry),
            block: ChangeBlock::new(),
            upstream: None,
            seeded: false,
            shared: BTreeSet::new(),
            pending: BTreeSet::new(),
            orphaned: BTreeSet::new(),
        }
    }

    /// This client's identity.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// The local registry.
    pub fn registry(&self) -> &ConfigRegistry {
        self.updater.registry()
    }

    /// The local registry, mutably. Call [`flush_local`](Self::flush_local)
    /// afterwards, or use [`edit`](Self::edit).
    pub fn registry_mut(&mut self) -> &mut ConfigRegistry {
        self.updater.registry_mut()
    }

    /// The shared change block.
    pub fn block(&self) -> &ChangeBlock {
        &self.block
    }

    /// Returns `true` if an upstream is attached.
    pub fn is_connected(&self) -> bool {
        self.upstream.is_some()
    }

    /// Returns `true` once a snapshot has been applied since the last
    /// connect.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Attaches `upstream`. The next event expected from the server is a
    /// snapshot, which reseeds the local registry.
    pub fn connect(&mut self, upstream: U) {
        tracing::info!(client_id = %self.client_id, "director connected");
        self.orphaned.append(&mut self.pending);
        self.upstream = Some(upstream);
        self.seeded = false;
    }

    /// Detaches and returns the upstream. Local edits made while
    /// disconnected are not forwarded; the next snapshot drops them.
    pub fn disconnect(&mut self) -> Option<U> {
        let upstream = self.upstream.take();
        if upstream.is_some() {
            tracing::info!(client_id = %self.client_id, "director disconnected");
        }
        self.orphaned.append(&mut self.pending);
        self.seeded = false;
        upstream
    }

    /// Runs `f` against the local registry, then forwards what it changed.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut ConfigRegistry) -> R) -> R {
        let result = f(self.updater.registry_mut());
        self.flush_local();
        result
    }

    /// Forwards queued local registry changes upstream, one request per
    /// change so the server sees them in the order they happened.
    ///
    /// Returns the number of requests sent.
    pub fn flush_local(&mut self) -> usize {
        let events = self.updater.registry_mut().drain_events();
        if events.is_empty() {
            return 0;
        }
        if self.block.is_entered() {
            tracing::trace!(
                client_id = %self.client_id,
                events = events.len(),
                "change block entered, not forwarding"
            );
            return 0;
        }
        let Some(upstream) = self.upstream.as_mut() else {
            tracing::debug!(
                client_id = %self.client_id,
                events = events.len(),
                "not connected, dropping local changes"
            );
            for event in &events {
                note_unsent(&mut self.orphaned, event);
            }
            return 0;
        };

        let _guard = self.block.enter();
        let mut sent = 0;
        let mut events = events.into_iter();
        for event in events.by_ref() {
            if let Err(e) = upstream.send(request_for(event.clone())) {
                tracing::warn!(
                    client_id = %self.client_id,
                    key = %event.key(),
                    error = %e,
                    "could not forward local change"
                );
                note_unsent(&mut self.orphaned, &event);
                break;
            }
            match &event {
                RegistryEvent::Added(entry) => {
                    self.pending.insert(entry.key.clone());
                }
                RegistryEvent::Removed(key) => {
                    self.pending.remove(key);
                    self.orphaned.remove(key);
                }
                RegistryEvent::Updated(_) => {}
            }
            sent += 1;
        }
        for event in events {
            note_unsent(&mut self.orphaned, &event);
        }
        sent
    }

    /// Applies one event from the server.
    ///
    /// Pending local changes are forwarded first so they aren't mistaken
    /// for side effects of the inbound change.
    pub fn handle_event(&mut self, event: &SyncEvent) {
        self.flush_local();
        match event {
            SyncEvent::Snapshot(snapshot) => self.on_snapshot(snapshot),
            SyncEvent::Commit(commit) => self.on_commit(commit),
        }
    }

    fn on_snapshot(&mut self, snapshot: &SetSnapshot) {
        let _guard = self.block.enter();
        let listed: BTreeSet<ConfigKey> = snapshot
            .added
            .iter()
            .chain(&snapshot.updated)
            .map(|entry| entry.key.clone())
            .collect();

        let registry = self.updater.registry();
        let stale: BTreeSet<ConfigKey> = self
            .shared
            .iter()
            .chain(&self.orphaned)
            .filter(|key| !listed.contains(*key) && !self.pending.contains(*key))
            // Resource configs outlive their overrides.
            .filter(|key| registry.is_resource_backed(&key.class) == Some(false))
            .filter(|key| registry.raw(key).is_some())
            .cloned()
            .collect();
        for key in &stale {
            tracing::debug!(client_id = %self.client_id, %key, "dropping stale config");
            self.updater.remove(key);
        }

        self.updater.initialize(snapshot);
        self.discard_own_events();
        self.shared = listed;
        self.orphaned.clear();
        self.seeded = true;
    }

    fn on_commit(&mut self, commit: &Commit) {
        if commit.origin == self.client_id {
            self.track(commit);
            tracing::debug!(
                client_id = %self.client_id,
                events = commit.events.len(),
                "skipping echo of own commit"
            );
            return;
        }
        if self.block.is_entered() {
            tracing::trace!(client_id = %self.client_id, "nested inbound commit, skipping");
            return;
        }
        if !self.seeded {
            tracing::warn!(
                client_id = %self.client_id,
                origin = %commit.origin,
                "commit before snapshot"
            );
        }

        let _guard = self.block.enter();
        self.updater.apply_commit(commit);
        self.discard_own_events();
        self.track(commit);
    }

    /// Follows which keys the shared entry sets hold.
    fn track(&mut self, commit: &Commit) {
        for event in &commit.events {
            match event {
                EntryEvent::Added {
                    set: SetName::Added | SetName::Updated,
                    record,
                } => {
                    let key = record.key();
                    self.pending.remove(key);
                    self.orphaned.remove(key);
                    self.shared.insert(key.clone());
                }
                EntryEvent::Removed {
                    set: SetName::Added | SetName::Updated,
                    key,
                } => {
                    self.shared.remove(key);
                }
                _ => {}
            }
        }
    }

    fn discard_own_events(&mut self) {
        let dropped = self.updater.registry_mut().drain_events();
        if !dropped.is_empty() {
            tracing::trace!(
                client_id = %self.client_id,
                count = dropped.len(),
                "suppressed registry events from inbound apply"
            );
        }
    }
}

/// Records a local change that never reached the server.
fn note_unsent(orphaned: &mut BTreeSet<ConfigKey>, event: &RegistryEvent) {
    match event {
        RegistryEvent::Added(entry) => {
            orphaned.insert(entry.key.clone());
        }
        RegistryEvent::Removed(key) => {
            orphaned.remove(key);
        }
        RegistryEvent::Updated(_) => {}
    }
}

fn request_for(event: RegistryEvent) -> UpdateConfigs {
    match event {
        RegistryEvent::Added(entry) => UpdateConfigs::add(entry),
        RegistryEvent::Updated(entry) => UpdateConfigs::update(entry),
        RegistryEvent::Removed(key) => UpdateConfigs::remove(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfgsync_protocol::{
        ConfigEntry, ConfigKey, ConfigValue, EntryEvent, SetName, SetRecord,
    };
    use cfgsync_registry::MemoryGroup;

    const ME: ClientId = ClientId(1);
    const OTHER: ClientId = ClientId(2);

    /// Records every request; optionally refuses them.
    #[derive(Default)]
    struct Recorder {
        sent: Vec<UpdateConfigs>,
        closed: bool,
    }

    impl Upstream for &mut Recorder {
        fn send(&mut self, request: UpdateConfigs) -> Result<(), ClientError> {
            if self.closed {
                return Err(ClientError::UpstreamClosed);
            }
            self.sent.push(request);
            Ok(())
        }
    }

    fn key(name: &str) -> ConfigKey {
        ConfigKey::new("Weapon", name)
    }

    fn entry(name: &str, value: &[u8]) -> ConfigEntry {
        ConfigEntry::new(key(name), ConfigValue(value.to_vec()))
    }

    fn added(origin: ClientId, e: ConfigEntry) -> SyncEvent {
        SyncEvent::Commit(Commit {
            origin,
            events: vec![EntryEvent::Added {
                set: SetName::Added,
                record: SetRecord::Entry(e),
            }],
        })
    }

    fn director<'a>(upstream: &'a mut Recorder) -> ClientSyncDirector<&'a mut Recorder> {
        let registry = ConfigRegistry::new()
            .with_group(MemoryGroup::new("Weapon"))
            .unwrap();
        let mut director = ClientSyncDirector::new(ME, registry);
        director.connect(upstream);
        director.handle_event(&SyncEvent::Snapshot(SetSnapshot::default()));
        director
    }

    fn raw(director: &ClientSyncDirector<&mut Recorder>, name: &str) -> Option<Vec<u8>> {
        director
            .registry()
            .raw(&key(name))
            .map(|v| v.as_bytes().to_vec())
    }

    #[test]
    fn test_local_add_is_forwarded_once() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);

        director.edit(|r| r.add(&entry("sword", b"1")).unwrap());
        director.handle_event(&added(ME, entry("sword", b"1")));
        drop(director);

        assert_eq!(upstream.sent, vec![UpdateConfigs::add(entry("sword", b"1"))]);
    }

    #[test]
    fn test_own_echo_is_not_reapplied() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        director.edit(|r| r.add(&entry("sword", b"1")).unwrap());
        // A later local edit the echo must not clobber.
        director.edit(|r| r.update(&entry("sword", b"2")).unwrap());

        director.handle_event(&added(ME, entry("sword", b"1")));

        assert_eq!(raw(&director, "sword"), Some(b"2".to_vec()));
        assert_eq!(director.flush_local(), 0);
    }

    #[test]
    fn test_remote_add_is_applied_and_not_forwarded() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);

        director.handle_event(&added(OTHER, entry("axe", b"A")));

        assert_eq!(raw(&director, "axe"), Some(b"A".to_vec()));
        assert_eq!(director.flush_local(), 0);
        drop(director);
        assert!(upstream.sent.is_empty());
    }

    #[test]
    fn test_snapshot_seeds_registry_without_forwarding() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);

        director.handle_event(&SyncEvent::Snapshot(SetSnapshot {
            added: vec![entry("bow", b"B")],
            ..SetSnapshot::default()
        }));

        assert!(director.is_seeded());
        assert_eq!(raw(&director, "bow"), Some(b"B".to_vec()));
        drop(director);
        assert!(upstream.sent.is_empty());
    }

    #[test]
    fn test_pending_local_changes_flush_before_inbound_apply() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        director
            .registry_mut()
            .add(&entry("sword", b"1"))
            .unwrap();

        director.handle_event(&added(OTHER, entry("axe", b"A")));
        drop(director);

        assert_eq!(upstream.sent, vec![UpdateConfigs::add(entry("sword", b"1"))]);
    }

    #[test]
    fn test_local_changes_while_block_entered_are_dropped() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);

        let guard = director.block().enter();
        director.registry_mut().add(&entry("sword", b"1")).unwrap();
        assert_eq!(director.flush_local(), 0);
        drop(guard);

        assert_eq!(director.flush_local(), 0);
    }

    #[test]
    fn test_inbound_commit_while_block_entered_is_skipped() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);

        let guard = director.block().enter();
        director.handle_event(&added(OTHER, entry("axe", b"A")));
        drop(guard);

        assert_eq!(raw(&director, "axe"), None);
    }

    #[test]
    fn test_disconnected_director_drops_local_changes() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        assert!(director.disconnect().is_some());

        director.edit(|r| r.add(&entry("sword", b"1")).unwrap());

        assert!(!director.is_connected());
        assert!(!director.is_seeded());
        assert_eq!(raw(&director, "sword"), Some(b"1".to_vec()));
        drop(director);
        assert!(upstream.sent.is_empty());
    }

    #[test]
    fn test_closed_upstream_stops_the_flush() {
        let mut upstream = Recorder {
            closed: true,
            ..Recorder::default()
        };
        let mut director = director(&mut upstream);
        director.registry_mut().add(&entry("a", b"1")).unwrap();
        director.registry_mut().add(&entry("b", b"1")).unwrap();

        assert_eq!(director.flush_local(), 0);
        assert!(!director.block().is_entered());
    }

    fn snapshot(added: Vec<ConfigEntry>, updated: Vec<ConfigEntry>) -> SyncEvent {
        SyncEvent::Snapshot(SetSnapshot {
            added,
            updated,
            removed: Vec::new(),
        })
    }

    fn resync(director: &mut ClientSyncDirector<&mut Recorder>) {
        let upstream = director.disconnect().unwrap();
        director.connect(upstream);
    }

    #[test]
    fn test_resync_removes_configs_retracted_while_disconnected() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        director.handle_event(&snapshot(vec![entry("axe", b"A")], Vec::new()));
        assert_eq!(raw(&director, "axe"), Some(b"A".to_vec()));

        resync(&mut director);
        director.handle_event(&snapshot(Vec::new(), Vec::new()));

        assert_eq!(raw(&director, "axe"), None);
        assert_eq!(director.flush_local(), 0);
        drop(director);
        assert!(upstream.sent.is_empty());
    }

    #[test]
    fn test_resync_removes_configs_added_by_commit_then_retracted() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        director.handle_event(&added(OTHER, entry("axe", b"A")));

        resync(&mut director);
        director.handle_event(&snapshot(Vec::new(), Vec::new()));

        assert_eq!(raw(&director, "axe"), None);
    }

    #[test]
    fn test_resync_drops_local_adds_the_server_never_took() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        // Forwarded but never echoed, as for a non-admin client.
        director.edit(|r| r.add(&entry("sword", b"1")).unwrap());
        let link = director.disconnect().unwrap();
        director.edit(|r| r.add(&entry("bow", b"2")).unwrap());

        director.connect(link);
        director.handle_event(&snapshot(Vec::new(), Vec::new()));

        assert_eq!(raw(&director, "sword"), None);
        assert_eq!(raw(&director, "bow"), None);
        assert_eq!(director.flush_local(), 0);
        drop(director);
        assert_eq!(upstream.sent, vec![UpdateConfigs::add(entry("sword", b"1"))]);
    }

    #[test]
    fn test_resync_keeps_own_adds_the_server_confirmed() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        director.edit(|r| r.add(&entry("sword", b"1")).unwrap());
        director.handle_event(&added(ME, entry("sword", b"1")));

        resync(&mut director);
        director.handle_event(&snapshot(vec![entry("sword", b"1")], Vec::new()));

        assert_eq!(raw(&director, "sword"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_resync_keeps_adds_sent_since_connecting() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);
        resync(&mut director);

        // Sent after the subscription, so the snapshot can't list it yet.
        director.edit(|r| r.add(&entry("sword", b"1")).unwrap());
        director.handle_event(&snapshot(Vec::new(), Vec::new()));

        assert_eq!(raw(&director, "sword"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_resync_leaves_resource_configs_in_place() {
        let registry = ConfigRegistry::new()
            .with_group(MemoryGroup::resource_backed(
                "Tileset",
                [("grass".to_string(), ConfigValue(b"g".to_vec()))],
            ))
            .unwrap();
        let grass = ConfigEntry::new(
            ConfigKey::new("Tileset", "grass"),
            ConfigValue(b"G2".to_vec()),
        );
        let mut upstream = Recorder::default();
        let mut director = ClientSyncDirector::new(ME, registry);
        director.connect(&mut upstream);
        director.handle_event(&snapshot(Vec::new(), vec![grass]));

        resync(&mut director);
        director.handle_event(&snapshot(Vec::new(), Vec::new()));

        assert!(director.registry().raw(&ConfigKey::new("Tileset", "grass")).is_some());
    }

    #[test]
    fn test_local_changes_are_sent_in_order() {
        let mut upstream = Recorder::default();
        let mut director = director(&mut upstream);

        director.edit(|r| {
            r.add(&entry("sword", b"1")).unwrap();
            r.remove(&key("sword")).unwrap();
        });
        drop(director);

        assert_eq!(
            upstream.sent,
            vec![
                UpdateConfigs::add(entry("sword", b"1")),
                UpdateConfigs::remove(key("sword")),
            ]
        );
    }
}
