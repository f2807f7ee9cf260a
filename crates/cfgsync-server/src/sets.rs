//! The three shared sets and the transactional batch that mutates them.
//!
//! # Invariants
//!
//! - A key is in at most one of `added` and `updated`.
//! - A key is never in both `removed` and `added`.
//!
//! # Reconciliation
//!
//! [`SharedEntrySets::apply_batch`] processes its adds, then its updates,
//! then its removals. For a key `K` carrying value `V`:
//!
//! ```text
//! add K=V     K in removed  → leave removed, enter updated (an override)
//!             K in added    → replace if V differs
//!             K in updated  → replace if V differs
//!             otherwise     → enter added
//!
//! update K=V  K in added    → replace if V differs
//!             K in updated  → replace if V differs
//!             K in removed  → leave removed, enter updated
//!             otherwise     → enter updated (first override)
//!
//! remove K    K in added    → leave added (fully retracted)
//!             otherwise     → leave updated if there; enter removed if not there
//! ```
//!
//! A replace with an identical value is a no-op and emits nothing.

use std::collections::{BTreeMap, BTreeSet};

use cfgsync_protocol::{
    ConfigEntry, ConfigKey, EntryEvent, SetName, SetRecord, SetSnapshot,
};

/// The canonical pending-change state shared by every subscriber.
#[derive(Debug, Clone, Default)]
pub struct SharedEntrySets {
    added: BTreeMap<ConfigKey, ConfigEntry>,
    updated: BTreeMap<ConfigKey, ConfigEntry>,
    removed: BTreeSet<ConfigKey>,
}

impl SharedEntrySets {
    /// Creates three empty sets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries in `added`, ordered by key.
    pub fn added(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.added.values()
    }

    /// Entries in `updated`, ordered by key.
    pub fn updated(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.updated.values()
    }

    /// Keys in `removed`, ordered.
    pub fn removed(&self) -> impl Iterator<Item = &ConfigKey> {
        self.removed.iter()
    }

    /// Returns `true` if `key` is in `set`.
    pub fn contains(&self, set: SetName, key: &ConfigKey) -> bool {
        match set {
            SetName::Added => self.added.contains_key(key),
            SetName::Updated => self.updated.contains_key(key),
            SetName::Removed => self.removed.contains(key),
        }
    }

    /// The entry stored under `key` in `added` or `updated`.
    pub fn entry(&self, set: SetName, key: &ConfigKey) -> Option<&ConfigEntry> {
        match set {
            SetName::Added => self.added.get(key),
            SetName::Updated => self.updated.get(key),
            SetName::Removed => None,
        }
    }

    /// Returns `true` if all three sets are empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Copies the current contents for a new subscriber.
    pub fn snapshot(&self) -> SetSnapshot {
        SetSnapshot {
            added: self.added.values().cloned().collect(),
            updated: self.updated.values().cloned().collect(),
            removed: self.removed.iter().cloned().collect(),
        }
    }

    /// Applies one batch of changes inside a single transaction and
    /// returns the events it produced, in order.
    ///
    /// There is no rollback: everything that could be applied is.
    pub fn apply_batch(
        &mut self,
        adds: impl IntoIterator<Item = ConfigEntry>,
        updates: impl IntoIterator<Item = ConfigEntry>,
        removes: impl IntoIterator<Item = ConfigKey>,
    ) -> Vec<EntryEvent> {
        let mut tx = Transaction::begin(self);
        for entry in adds {
            tx.add(entry);
        }
        for entry in updates {
            tx.update(entry);
        }
        for key in removes {
            tx.remove(key);
        }
        tx.commit()
    }
}

/// One of the two sets that store full entries.
#[derive(Debug, Clone, Copy)]
enum EntrySet {
    Added,
    Updated,
}

impl EntrySet {
    fn name(self) -> SetName {
        match self {
            EntrySet::Added => SetName::Added,
            EntrySet::Updated => SetName::Updated,
        }
    }
}

/// An open batch against the sets. Every primitive mutation records the
/// event it causes; [`Transaction::commit`] hands them all over at once.
struct Transaction<'a> {
    sets: &'a mut SharedEntrySets,
    events: Vec<EntryEvent>,
}

impl<'a> Transaction<'a> {
    fn begin(sets: &'a mut SharedEntrySets) -> Self {
        Self {
            sets,
            events: Vec::new(),
        }
    }

    fn commit(self) -> Vec<EntryEvent> {
        self.events
    }

    fn add(&mut self, entry: ConfigEntry) {
        let key = entry.key.clone();
        if self.sets.removed.contains(&key) {
            self.delete_removed(&key);
            self.insert_entry(EntrySet::Updated, entry);
        } else if self.sets.added.contains_key(&key) {
            self.replace(EntrySet::Added, entry);
        } else if self.sets.updated.contains_key(&key) {
            self.replace(EntrySet::Updated, entry);
        } else {
            self.insert_entry(EntrySet::Added, entry);
        }
    }

    fn update(&mut self, entry: ConfigEntry) {
        let key = entry.key.clone();
        if self.sets.added.contains_key(&key) {
            self.replace(EntrySet::Added, entry);
        } else if self.sets.updated.contains_key(&key) {
            self.replace(EntrySet::Updated, entry);
        } else if self.sets.removed.contains(&key) {
            self.delete_removed(&key);
            self.insert_entry(EntrySet::Updated, entry);
        } else {
            self.insert_entry(EntrySet::Updated, entry);
        }
    }

    fn remove(&mut self, key: ConfigKey) {
        if self.sets.added.remove(&key).is_some() {
            self.events.push(EntryEvent::Removed {
                set: SetName::Added,
                key,
            });
            return;
        }
        if self.sets.updated.remove(&key).is_some() {
            self.events.push(EntryEvent::Removed {
                set: SetName::Updated,
                key: key.clone(),
            });
        }
        if self.sets.removed.insert(key.clone()) {
            self.events.push(EntryEvent::Added {
                set: SetName::Removed,
                record: SetRecord::Key(key),
            });
        }
    }

    fn insert_entry(&mut self, set: EntrySet, entry: ConfigEntry) {
        self.map_mut(set).insert(entry.key.clone(), entry.clone());
        self.events.push(EntryEvent::Added {
            set: set.name(),
            record: SetRecord::Entry(entry),
        });
    }

    /// Replaces the entry stored in `set`, unless the value is identical.
    fn replace(&mut self, set: EntrySet, entry: ConfigEntry) {
        let map = self.map_mut(set);
        if map.get(&entry.key).is_some_and(|old| old.same_value(&entry)) {
            tracing::trace!(key = %entry.key, set = %set.name(), "identical value, no-op");
            return;
        }
        map.insert(entry.key.clone(), entry.clone());
        self.events.push(EntryEvent::Updated {
            set: set.name(),
            entry,
        });
    }

    fn delete_removed(&mut self, key: &ConfigKey) {
        self.sets.removed.remove(key);
        self.events.push(EntryEvent::Removed {
            set: SetName::Removed,
            key: key.clone(),
        });
    }

    fn map_mut(&mut self, set: EntrySet) -> &mut BTreeMap<ConfigKey, ConfigEntry> {
        match set {
            EntrySet::Added => &mut self.sets.added,
            EntrySet::Updated => &mut self.sets.updated,
        }
    }
}
