//! Applies shared-set changes to a local registry.
//!
//! The same rules serve two purposes: seeding a freshly attached
//! registry from a [`SetSnapshot`], and applying the live [`EntryEvent`]s
//! of each commit. Both paths end in [`ConfigUpdater::add`],
//! [`ConfigUpdater::update`] and [`ConfigUpdater::remove`], which is what
//! makes a bootstrapped registry indistinguishable from one that saw every
//! event.
//!
//! Nothing here returns an error. Missing groups, removals of configs
//! that are already gone and updates of unknown resources all happen in
//! normal race windows; they're logged and the next entry is processed.

use cfgsync_protocol::{
    Commit, ConfigEntry, ConfigKey, EntryEvent, SetName, SetRecord,
    SetSnapshot,
};

use crate::ConfigRegistry;

/// Owns a [`ConfigRegistry`] and applies shared-set changes to it.
pub struct ConfigUpdater {
    registry: ConfigRegistry,
}

impl ConfigUpdater {
    /// Wraps `registry`.
    pub fn new(registry: ConfigRegistry) -> Self {
        Self { registry }
    }

    /// The wrapped registry.
    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    /// The wrapped registry, mutably. Local edits made through this
    /// reference are queued as registry events like any other.
    pub fn registry_mut(&mut self) -> &mut ConfigRegistry {
        &mut self.registry
    }

    /// Unwraps the registry.
    pub fn into_registry(self) -> ConfigRegistry {
        self.registry
    }

    /// Applies a full snapshot: every `added` entry as an add, every
    /// `updated` entry as an update, every `removed` key as a remove, in
    /// that order.
    pub fn initialize(&mut self, snapshot: &SetSnapshot) {
        tracing::debug!(
            added = snapshot.added.len(),
            updated = snapshot.updated.len(),
            removed = snapshot.removed.len(),
            "seeding registry from snapshot"
        );
        for entry in &snapshot.added {
            self.add(entry);
        }
        for entry in &snapshot.updated {
            self.update(entry);
        }
        for key in &snapshot.removed {
            self.remove(key);
        }
    }

    /// Applies every event of a commit, in order.
    pub fn apply_commit(&mut self, commit: &Commit) {
        for event in &commit.events {
            self.apply(event);
        }
    }

    /// Dispatches one event to the matching handler.
    pub fn apply(&mut self, event: &EntryEvent) {
        match event {
            EntryEvent::Added { set, record } => self.on_added(*set, record),
            EntryEvent::Updated { set, entry } => self.on_updated(*set, entry),
            EntryEvent::Removed { set, key } => self.on_removed(*set, key),
        }
    }

    /// A record was inserted into `set`.
    ///
    /// A key entering `removed` deletes the config; an entry entering
    /// `added` or `updated` is added (overwriting in place if present).
    pub fn on_added(&mut self, set: SetName, record: &SetRecord) {
        match (set, record) {
            (SetName::Removed, record) => self.remove(record.key()),
            (_, SetRecord::Entry(entry)) => self.add(entry),
            (_, SetRecord::Key(key)) => {
                tracing::warn!(
                    %key, %set,
                    "bare key added to an entry set, ignoring"
                );
            }
        }
    }

    /// An entry in `set` was replaced. Only `added` and `updated` carry
    /// values.
    pub fn on_updated(&mut self, set: SetName, entry: &ConfigEntry) {
        match set {
            SetName::Added | SetName::Updated => self.update(entry),
            SetName::Removed => {
                tracing::trace!(key = %entry.key, "update in removed set, ignoring");
            }
        }
    }

    /// A record left `set`.
    ///
    /// Only leaving `added` deletes the config. Leaving `updated` means the
    /// override is gone and the resource default applies again, which the
    /// registry handles itself; leaving `removed` is bookkeeping.
    pub fn on_removed(&mut self, set: SetName, key: &ConfigKey) {
        if set == SetName::Added {
            self.remove(key);
        }
    }

    /// Adds `entry` to the group of its class.
    pub fn add(&mut self, entry: &ConfigEntry) {
        if let Err(e) = self.registry.add(entry) {
            tracing::warn!(key = %entry.key, error = %e, "could not add config");
        }
    }

    /// Deletes the config stored under `key`, if there is one.
    pub fn remove(&mut self, key: &ConfigKey) {
        if self.registry.raw(key).is_none() {
            tracing::warn!(%key, "no config to remove");
            return;
        }
        if let Err(e) = self.registry.remove(key) {
            tracing::warn!(%key, error = %e, "could not remove config");
        }
    }

    /// Copies `entry`'s value onto the existing config.
    ///
    /// A missing config is created if its class isn't resource-backed.
    /// A missing resource-backed config can't be recovered locally and is
    /// skipped.
    pub fn update(&mut self, entry: &ConfigEntry) {
        let key = &entry.key;
        if self.registry.raw(key).is_some() {
            if let Err(e) = self.registry.update(entry) {
                tracing::warn!(%key, error = %e, "could not update config");
            }
            return;
        }
        match self.registry.is_resource_backed(&key.class) {
            Some(false) => self.add(entry),
            Some(true) => {
                tracing::warn!(%key, "update for unknown resource config, skipping");
            }
            None => {
                tracing::warn!(%key, "no group registered for config class");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryGroup, RegistryEvent};
    use cfgsync_protocol::{ClientId, ConfigValue};

    fn key(class: &str, name: &str) -> ConfigKey {
        ConfigKey::new(class, name)
    }

    fn entry(class: &str, name: &str, value: &[u8]) -> ConfigEntry {
        ConfigEntry::new(key(class, name), ConfigValue(value.to_vec()))
    }

    /// `Weapon` is created at runtime; `Tileset` comes from resources and
    /// ships with `grass` and `stone`.
    fn updater() -> ConfigUpdater {
        let registry = ConfigRegistry::new()
            .with_group(MemoryGroup::new("Weapon"))
            .unwrap()
            .with_group(MemoryGroup::resource_backed(
                "Tileset",
                [
                    ("grass".to_string(), ConfigValue(b"g".to_vec())),
                    ("stone".to_string(), ConfigValue(b"s".to_vec())),
                ],
            ))
            .unwrap();
        ConfigUpdater::new(registry)
    }

    fn raw(updater: &ConfigUpdater, class: &str, name: &str) -> Option<Vec<u8>> {
        updater
            .registry()
            .raw(&key(class, name))
            .map(|v| v.as_bytes().to_vec())
    }

    fn state(updater: &ConfigUpdater) -> Vec<(ConfigKey, Vec<u8>)> {
        let registry = updater.registry();
        registry
            .keys()
            .into_iter()
            .map(|k| {
                let bytes = registry.raw(&k).unwrap().as_bytes().to_vec();
                (k, bytes)
            })
            .collect()
    }

    #[test]
    fn test_add_unknown_class_is_skipped() {
        let mut updater = updater();

        updater.add(&entry("Armor", "plate", b"1"));

        assert_eq!(updater.registry().pending_events(), 0);
    }

    #[test]
    fn test_remove_absent_config_is_skipped() {
        let mut updater = updater();

        updater.remove(&key("Weapon", "sword"));

        assert_eq!(updater.registry().pending_events(), 0);
    }

    #[test]
    fn test_update_existing_config_overwrites_and_notifies() {
        let mut updater = updater();

        updater.update(&entry("Tileset", "grass", b"G2"));

        assert_eq!(raw(&updater, "Tileset", "grass"), Some(b"G2".to_vec()));
        assert_eq!(
            updater.registry_mut().drain_events(),
            vec![RegistryEvent::Updated(entry("Tileset", "grass", b"G2"))]
        );
    }

    #[test]
    fn test_update_missing_runtime_config_becomes_add() {
        let mut updater = updater();

        updater.update(&entry("Weapon", "sword", b"1"));

        assert_eq!(raw(&updater, "Weapon", "sword"), Some(b"1".to_vec()));
        assert_eq!(
            updater.registry_mut().drain_events(),
            vec![RegistryEvent::Added(entry("Weapon", "sword", b"1"))]
        );
    }

    #[test]
    fn test_update_missing_resource_config_is_skipped() {
        let mut updater = updater();

        updater.update(&entry("Tileset", "lava", b"l"));

        assert_eq!(raw(&updater, "Tileset", "lava"), None);
        assert_eq!(updater.registry().pending_events(), 0);
    }

    #[test]
    fn test_on_added_to_removed_set_deletes_config() {
        let mut updater = updater();

        updater.on_added(SetName::Removed, &SetRecord::Key(key("Tileset", "stone")));

        assert_eq!(raw(&updater, "Tileset", "stone"), None);
    }

    #[test]
    fn test_on_removed_only_acts_on_added_set() {
        let mut updater = updater();
        updater.add(&entry("Weapon", "sword", b"1"));

        updater.on_removed(SetName::Updated, &key("Weapon", "sword"));
        updater.on_removed(SetName::Removed, &key("Weapon", "sword"));
        assert!(raw(&updater, "Weapon", "sword").is_some());

        updater.on_removed(SetName::Added, &key("Weapon", "sword"));
        assert!(raw(&updater, "Weapon", "sword").is_none());
    }

    #[test]
    fn test_on_updated_ignores_removed_set() {
        let mut updater = updater();

        updater.on_updated(SetName::Removed, &entry("Weapon", "sword", b"1"));

        assert!(raw(&updater, "Weapon", "sword").is_none());
    }

    #[test]
    fn test_bad_entries_do_not_stop_the_rest_of_a_commit() {
        let mut updater = updater();
        let commit = Commit {
            origin: ClientId(1),
            events: vec![
                EntryEvent::Added {
                    set: SetName::Added,
                    record: SetRecord::Entry(entry("Armor", "plate", b"1")),
                },
                EntryEvent::Added {
                    set: SetName::Added,
                    record: SetRecord::Entry(entry("Weapon", "sword", b"1")),
                },
            ],
        };

        updater.apply_commit(&commit);

        assert_eq!(raw(&updater, "Weapon", "sword"), Some(b"1".to_vec()));
    }

    #[test]
    fn test_snapshot_bootstrap_matches_incremental_replay() {
        let a = entry("Weapon", "axe", b"A");
        let b = entry("Tileset", "grass", b"B");
        let c = key("Tileset", "stone");

        let mut bootstrapped = updater();
        bootstrapped.initialize(&SetSnapshot {
            added: vec![a.clone()],
            updated: vec![b.clone()],
            removed: vec![c.clone()],
        });

        let mut replayed = updater();
        replayed.apply_commit(&Commit {
            origin: ClientId(7),
            events: vec![
                EntryEvent::Added {
                    set: SetName::Added,
                    record: SetRecord::Entry(a),
                },
                EntryEvent::Added {
                    set: SetName::Updated,
                    record: SetRecord::Entry(b),
                },
                EntryEvent::Added {
                    set: SetName::Removed,
                    record: SetRecord::Key(c),
                },
            ],
        });

        assert_eq!(state(&bootstrapped), state(&replayed));
        assert_eq!(
            state(&bootstrapped),
            vec![
                (key("Tileset", "grass"), b"B".to_vec()),
                (key("Weapon", "axe"), b"A".to_vec()),
            ]
        );
    }
}
