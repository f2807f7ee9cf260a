//! Applies deltas on the receiving side.

use std::collections::BTreeMap;

use crate::{DeltaConfig, DeltaError, Replicated, Scene, SceneDelta};

/// Rebuilds scenes from deltas and keeps the snapshots later deltas may
/// reference.
pub struct DeltaReceiver<T: Replicated> {
    config: DeltaConfig,
    snapshots: BTreeMap<u64, Scene<T>>,
    latest: u64,
}

impl<T: Replicated> DeltaReceiver<T> {
    /// Creates a receiver that has applied no delta yet.
    pub fn new(config: DeltaConfig) -> Self {
        Self {
            config,
            snapshots: BTreeMap::new(),
            latest: 0,
        }
    }

    /// Timestamp of the newest applied delta, 0 before the first. This is
    /// the value to acknowledge back to the sender.
    pub fn latest_timestamp(&self) -> u64 {
        self.latest
    }

    /// The scene as of the newest applied delta.
    pub fn scene(&self) -> Option<&Scene<T>> {
        self.snapshots.get(&self.latest)
    }

    /// Number of snapshots kept as possible references.
    pub fn retained(&self) -> usize {
        self.snapshots.len()
    }

    /// Applies `delta` and returns the resulting scene.
    ///
    /// Returns `Ok(None)` for a delta that isn't newer than the last one
    /// applied (a duplicate or a late arrival).
    ///
    /// # Errors
    /// Returns [`DeltaError::MissingReference`] if the delta's reference
    /// snapshot isn't held.
    pub fn receive(
        &mut self,
        delta: &SceneDelta<T>,
    ) -> Result<Option<&Scene<T>>, DeltaError> {
        if delta.timestamp <= self.latest {
            tracing::trace!(
                timestamp = delta.timestamp,
                latest = self.latest,
                "stale delta, ignoring"
            );
            return Ok(None);
        }

        let mut scene = if delta.is_self_contained() {
            Scene::new()
        } else {
            self.snapshots
                .get(&delta.reference)
                .cloned()
                .ok_or(DeltaError::MissingReference {
                    reference: delta.reference,
                })?
        };

        for id in &delta.removed {
            scene.remove(id);
        }
        for (id, actor) in &delta.added {
            scene.insert(*id, actor.clone());
        }
        for (id, diff) in &delta.updated {
            match scene.get_mut(id) {
                Some(actor) => actor.apply(diff),
                None => {
                    tracing::warn!(
                        actor_id = %id,
                        reference = delta.reference,
                        "diff for unknown actor, skipping"
                    );
                }
            }
        }

        // Acknowledged baselines only move forward.
        self.snapshots.retain(|ts, _| *ts >= delta.reference);
        while self.snapshots.len() >= self.config.history_window.max(1) {
            self.snapshots.pop_first();
        }

        self.latest = delta.timestamp;
        let applied: &Scene<T> = self.snapshots.entry(delta.timestamp).or_insert(scene);
        Ok(Some(applied))
    }
}
