//! Core types of the config synchronization protocol.
//!
//! Everything here is plain data: it derives `Serialize`/`Deserialize`
//! so it can cross a process boundary, and carries no behavior beyond
//! small accessors. The reconciliation rules that decide which events
//! get produced live in `cfgsync-server`.

use std::fmt;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{Codec, ProtocolError};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a participant in the sync protocol: a connected client, or
/// the server itself ([`ClientId::SERVER`]).
///
/// The id is what echo suppression compares: every committed batch is
/// tagged with the id of the client that requested it, and a client
/// skips batches carrying its own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    /// Origin used for changes made by the server process itself.
    pub const SERVER: ClientId = ClientId(0);
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// The type tag of a config, e.g. `"Weapon"` or `"Tileset"`.
///
/// Registries map a class to the group that stores configs of that
/// type. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigClass(pub String);

impl ConfigClass {
    /// Creates a class tag from anything string-like.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the tag as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity of a managed config across the whole system:
/// `(class, name)`.
///
/// Equality, ordering and hashing are structural, so two keys built
/// from the same class and name are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    /// The config's type tag.
    pub class: ConfigClass,
    /// The config's name within its class.
    pub name: String,
}

impl ConfigKey {
    /// Creates a key from a class tag and a name.
    pub fn new(class: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            class: ConfigClass::new(class),
            name: name.into(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.class, self.name)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// A full serialized snapshot of one config's value.
///
/// Opaque to the sync layer: it is only ever compared for equality (to
/// elide redundant updates) and handed to the registry group that knows
/// the concrete type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigValue(pub Vec<u8>);

impl ConfigValue {
    /// Serializes `value` with `codec`.
    ///
    /// # Errors
    /// Propagates the codec's encode error.
    pub fn encode<T: Serialize>(
        codec: &impl Codec,
        value: &T,
    ) -> Result<Self, ProtocolError> {
        codec.encode(value).map(Self)
    }

    /// Deserializes the snapshot back into a `T`.
    ///
    /// # Errors
    /// Propagates the codec's decode error.
    pub fn decode<T: DeserializeOwned>(
        &self,
        codec: &impl Codec,
    ) -> Result<T, ProtocolError> {
        codec.decode(&self.0)
    }

    /// Returns the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A key plus the value it should have.
///
/// Entries are addressed by key. [`ConfigEntry::same_value`] tells
/// whether applying `other` on top of `self` would change anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: ConfigKey,
    pub value: ConfigValue,
}

impl ConfigEntry {
    /// Creates an entry.
    pub fn new(key: ConfigKey, value: ConfigValue) -> Self {
        Self { key, value }
    }

    /// Returns `true` if both entries carry identical values.
    pub fn same_value(&self, other: &ConfigEntry) -> bool {
        self.value == other.value
    }
}

// ---------------------------------------------------------------------------
// Shared sets and their change events
// ---------------------------------------------------------------------------

/// Names the three collections held on the shared object.
///
/// - `added`: configs that exist only because a client added them.
/// - `updated`: overrides of configs that come from a backing resource.
/// - `removed`: markers for configs that were deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetName {
    Added,
    Updated,
    Removed,
}

impl fmt::Display for SetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Updated => write!(f, "updated"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// What a set holds for one key: a full entry (`added`/`updated`) or
/// just the key (`removed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetRecord {
    Entry(ConfigEntry),
    Key(ConfigKey),
}

impl SetRecord {
    /// Returns the key this record addresses.
    pub fn key(&self) -> &ConfigKey {
        match self {
            Self::Entry(entry) => &entry.key,
            Self::Key(key) => key,
        }
    }
}

/// A single change to one of the shared sets.
///
/// `#[serde(tag = "kind")]` produces internally tagged JSON, e.g.
/// `{ "kind": "added", "set": "added", "record": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EntryEvent {
    /// A record was inserted into `set`.
    Added { set: SetName, record: SetRecord },
    /// The entry stored in `set` under `entry.key` was replaced.
    Updated { set: SetName, entry: ConfigEntry },
    /// The record stored in `set` under `key` was deleted.
    Removed { set: SetName, key: ConfigKey },
}

impl EntryEvent {
    /// The set this event touched.
    pub fn set(&self) -> SetName {
        match self {
            Self::Added { set, .. }
            | Self::Updated { set, .. }
            | Self::Removed { set, .. } => *set,
        }
    }

    /// The key this event touched.
    pub fn key(&self) -> &ConfigKey {
        match self {
            Self::Added { record, .. } => record.key(),
            Self::Updated { entry, .. } => &entry.key,
            Self::Removed { key, .. } => key,
        }
    }
}

/// The events of one committed transaction, tagged with the client that
/// requested it.
///
/// Subscribers receive a commit as one message, so they never observe
/// the shared sets halfway through a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    /// Who asked for this change. Used only for echo suppression.
    pub origin: ClientId,
    /// The individual changes, in the order they were applied.
    pub events: Vec<EntryEvent>,
}

/// The full contents of the three shared sets at one point in time.
///
/// Sent to every new subscriber before any [`Commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetSnapshot {
    pub added: Vec<ConfigEntry>,
    pub updated: Vec<ConfigEntry>,
    pub removed: Vec<ConfigKey>,
}

impl SetSnapshot {
    /// Returns `true` if all three sets are empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.updated.is_empty()
            && self.removed.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Client → server: "please apply these changes to the shared sets".
///
/// The server processes `add`, then `update`, then `remove`, all inside
/// one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateConfigs {
    #[serde(default)]
    pub add: Vec<ConfigEntry>,
    #[serde(default)]
    pub update: Vec<ConfigEntry>,
    #[serde(default)]
    pub remove: Vec<ConfigKey>,
}

impl UpdateConfigs {
    /// A request that adds a single entry.
    pub fn add(entry: ConfigEntry) -> Self {
        Self {
            add: vec![entry],
            ..Self::default()
        }
    }

    /// A request that updates a single entry.
    pub fn update(entry: ConfigEntry) -> Self {
        Self {
            update: vec![entry],
            ..Self::default()
        }
    }

    /// A request that removes a single key.
    pub fn remove(key: ConfigKey) -> Self {
        Self {
            remove: vec![key],
            ..Self::default()
        }
    }

    /// Returns `true` if the request would change nothing.
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.remove.is_empty()
    }
}

/// Server → subscriber messages.
///
/// `#[serde(tag = "type", content = "data")]` produces adjacently tagged
/// JSON: `{ "type": "Commit", "data": { "origin": 3, "events": [...] } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SyncEvent {
    /// The current contents of the shared sets. Always the first event a
    /// subscriber receives.
    Snapshot(SetSnapshot),
    /// One committed transaction.
    Commit(Commit),
}

#[cfg(test)]
mod tests {
    //! JSON shape tests. Other processes parse these messages, so the
    //! serde attributes are part of the contract.

    use super::*;

    fn key(class: &str, name: &str) -> ConfigKey {
        ConfigKey::new(class, name)
    }

    fn entry(class: &str, name: &str, value: &[u8]) -> ConfigEntry {
        ConfigEntry::new(key(class, name), ConfigValue(value.to_vec()))
    }

    #[test]
    fn test_client_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&ClientId(42)).unwrap();
        assert_eq!(json, "42");
    }

    #[test]
    fn test_client_id_display() {
        assert_eq!(ClientId(7).to_string(), "C-7");
        assert_eq!(ClientId::SERVER.to_string(), "C-0");
    }

    #[test]
    fn test_config_key_structural_equality_and_hash() {
        use std::collections::HashSet;

        let mut keys = HashSet::new();
        keys.insert(key("Weapon", "sword"));
        keys.insert(key("Weapon", "sword"));
        keys.insert(key("Armor", "sword"));

        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_config_key_json_format() {
        let json = serde_json::to_value(key("Weapon", "sword")).unwrap();
        assert_eq!(json["class"], "Weapon");
        assert_eq!(json["name"], "sword");
    }

    #[test]
    fn test_config_key_display() {
        assert_eq!(key("Weapon", "sword").to_string(), "Weapon:sword");
    }

    #[test]
    fn test_same_value_ignores_key() {
        let a = entry("Weapon", "sword", b"1");
        let b = entry("Weapon", "axe", b"1");
        let c = entry("Weapon", "sword", b"2");

        assert!(a.same_value(&b));
        assert!(!a.same_value(&c));
    }

    #[test]
    fn test_set_name_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SetName::Added).unwrap(), "\"added\"");
        assert_eq!(SetName::Removed.to_string(), "removed");
    }

    #[test]
    fn test_entry_event_added_json_format() {
        let event = EntryEvent::Added {
            set: SetName::Added,
            record: SetRecord::Entry(entry("Weapon", "sword", b"1")),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["kind"], "added");
        assert_eq!(json["set"], "added");
        assert_eq!(json["record"]["Entry"]["key"]["name"], "sword");
    }

    #[test]
    fn test_entry_event_accessors() {
        let event = EntryEvent::Removed {
            set: SetName::Updated,
            key: key("Weapon", "bow"),
        };
        assert_eq!(event.set(), SetName::Updated);
        assert_eq!(event.key(), &key("Weapon", "bow"));

        let event = EntryEvent::Added {
            set: SetName::Removed,
            record: SetRecord::Key(key("Weapon", "axe")),
        };
        assert_eq!(event.key(), &key("Weapon", "axe"));
    }

    #[test]
    fn test_update_configs_missing_lists_default_to_empty() {
        let json = r#"{ "remove": [{ "class": "Weapon", "name": "sword" }] }"#;
        let request: UpdateConfigs = serde_json::from_str(json).unwrap();

        assert!(request.add.is_empty());
        assert!(request.update.is_empty());
        assert_eq!(request.remove, vec![key("Weapon", "sword")]);
    }

    #[test]
    fn test_update_configs_is_empty() {
        assert!(UpdateConfigs::default().is_empty());
        assert!(!UpdateConfigs::remove(key("Weapon", "sword")).is_empty());
    }

    #[test]
    fn test_sync_event_commit_json_format() {
        let event = SyncEvent::Commit(Commit {
            origin: ClientId(3),
            events: vec![],
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "Commit");
        assert_eq!(json["data"]["origin"], 3);
        assert!(json["data"]["events"].is_array());
    }

    #[test]
    fn test_sync_event_snapshot_survives_json() {
        let event = SyncEvent::Snapshot(SetSnapshot {
            added: vec![entry("Weapon", "sword", b"1")],
            updated: vec![entry("Armor", "plate", b"2")],
            removed: vec![key("Weapon", "club")],
        });
        let bytes = serde_json::to_vec(&event).unwrap();
        let decoded: SyncEvent = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_decode_unknown_event_kind_returns_error() {
        let unknown = r#"{ "kind": "renamed", "set": "added" }"#;
        let result: Result<EntryEvent, _> = serde_json::from_str(unknown);
        assert!(result.is_err());
    }

    #[test]
    fn test_snapshot_is_empty() {
        assert!(SetSnapshot::default().is_empty());
    }
}
