//! Actor identity, the replication trait and the delta message.

use std::collections::BTreeMap;
use std::fmt;

use cfgsync_protocol::ClientId;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Identifies one live actor within a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// State of an actor that can be sent as a diff against an earlier copy.
///
/// Diffs are applied forward only. `base.apply(&current.diff(base)?)`
/// must leave `base` equal to `current`.
pub trait Replicated: Clone {
    /// An opaque change from one state to another.
    type Diff: Clone;

    /// Returns the change that turns `base` into `self`, or `None` if
    /// nothing changed.
    fn diff(&self, base: &Self) -> Option<Self::Diff>;

    /// Applies `diff` to `self`.
    fn apply(&mut self, diff: &Self::Diff);
}

/// Every actor in a scene at one timestamp.
pub type Scene<T> = BTreeMap<ActorId, T>;

/// An incremental scene update for one recipient.
///
/// `added`, `updated` and `removed` describe the change from the snapshot
/// at `reference` to the snapshot at `timestamp`. A `reference` of 0
/// means the empty scene, so the delta is self-contained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(
    serialize = "T: Serialize, T::Diff: Serialize",
    deserialize = "T: DeserializeOwned, T::Diff: DeserializeOwned"
))]
pub struct SceneDelta<T: Replicated> {
    /// The recipient.
    pub target_id: ClientId,
    pub scene_id: u32,
    /// Timestamp of the last input the sender processed from the
    /// recipient.
    pub acknowledge: u64,
    /// The sender's round-trip estimate, in milliseconds.
    pub ping_estimate: u32,
    /// Timestamp of the baseline this delta was computed against.
    pub reference: u64,
    /// This delta's own version.
    pub timestamp: u64,
    /// Time since the previous delta to this recipient, in milliseconds.
    pub elapsed: u64,
    pub added: Vec<(ActorId, T)>,
    pub updated: Vec<(ActorId, T::Diff)>,
    pub removed: Vec<ActorId>,
    /// Encoded one-shot events that fired since the previous delta.
    pub fired_events: Vec<Vec<u8>>,
}

impl<T: Replicated> SceneDelta<T> {
    /// Returns `true` if the delta doesn't depend on any earlier snapshot.
    pub fn is_self_contained(&self) -> bool {
        self.reference == 0
    }

    /// Returns `true` if the delta changes no actor.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}
