//! Composes deltas for one recipient.

use std::collections::VecDeque;

use cfgsync_protocol::ClientId;

use crate::{ActorId, DeltaConfig, DeltaError, Replicated, Scene, SceneDelta};

/// Per-recipient delta state on the sending side.
///
/// Each composed delta is diffed against the newest snapshot the
/// recipient has acknowledged, as long as that snapshot is still in the
/// retained history. Otherwise it's diffed against the empty scene.
pub struct DeltaSender<T: Replicated> {
    target_id: ClientId,
    scene_id: u32,
    config: DeltaConfig,
    /// Sent snapshots, oldest first.
    history: VecDeque<(u64, Scene<T>)>,
    acknowledged: u64,
    last_input: u64,
    ping_estimate: u32,
    last_sent: Option<u64>,
}

impl<T: Replicated> DeltaSender<T> {
    /// Creates the state for sending `scene_id` to `target_id`.
    pub fn new(target_id: ClientId, scene_id: u32, config: DeltaConfig) -> Self {
        Self {
            target_id,
            scene_id,
            config,
            history: VecDeque::new(),
            acknowledged: 0,
            last_input: 0,
            ping_estimate: 0,
            last_sent: None,
        }
    }

    /// The client every delta from this sender is addressed to.
    pub fn target_id(&self) -> ClientId {
        self.target_id
    }

    /// Newest delta timestamp the recipient has confirmed.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Number of snapshots currently retained.
    pub fn retained(&self) -> usize {
        self.history.len()
    }

    /// Records that the recipient applied the delta at `timestamp`.
    ///
    /// Acknowledgements never move backwards. Snapshots older than the
    /// acknowledged one are dropped, since they'll never be referenced
    /// again.
    pub fn acknowledge(&mut self, timestamp: u64) {
        if timestamp <= self.acknowledged {
            tracing::trace!(
                target_id = %self.target_id,
                timestamp,
                acknowledged = self.acknowledged,
                "stale acknowledgement"
            );
            return;
        }
        self.acknowledged = timestamp;
        while self
            .history
            .front()
            .is_some_and(|(ts, _)| *ts < timestamp)
        {
            self.history.pop_front();
        }
    }

    /// Records the newest input received from the recipient and the
    /// current round-trip estimate.
    pub fn record_input(&mut self, input_timestamp: u64, ping_estimate: u32) {
        self.last_input = self.last_input.max(input_timestamp);
        self.ping_estimate = ping_estimate;
    }

    /// Builds the delta that brings the recipient to `scene` as of
    /// `timestamp`, and retains `scene` as a future baseline.
    ///
    /// # Errors
    /// Returns [`DeltaError::NonMonotonic`] if `timestamp` isn't after the
    /// previous delta's.
    pub fn compose(
        &mut self,
        timestamp: u64,
        scene: &Scene<T>,
        fired_events: Vec<Vec<u8>>,
    ) -> Result<SceneDelta<T>, DeltaError> {
        if let Some(last) = self.last_sent {
            if timestamp <= last {
                return Err(DeltaError::NonMonotonic { last, timestamp });
            }
        }
        if timestamp == 0 {
            return Err(DeltaError::NonMonotonic { last: 0, timestamp });
        }

        let empty = Scene::new();
        let (reference, base) = match self.baseline() {
            Some(base) => (self.acknowledged, base),
            None => {
                if self.acknowledged > 0 {
                    tracing::debug!(
                        target_id = %self.target_id,
                        acknowledged = self.acknowledged,
                        "acknowledged snapshot aged out, sending full scene"
                    );
                }
                (0, &empty)
            }
        };
        let (added, updated, removed) = diff_scenes(base, scene);

        let delta = SceneDelta {
            target_id: self.target_id,
            scene_id: self.scene_id,
            acknowledge: self.last_input,
            ping_estimate: self.ping_estimate,
            reference,
            timestamp,
            elapsed: self.last_sent.map_or(0, |last| timestamp - last),
            added,
            updated,
            removed,
            fired_events,
        };

        self.last_sent = Some(timestamp);
        self.history.push_back((timestamp, scene.clone()));
        while self.history.len() > self.config.history_window.max(1) {
            self.history.pop_front();
        }
        Ok(delta)
    }

    fn baseline(&self) -> Option<&Scene<T>> {
        if self.acknowledged == 0 {
            return None;
        }
        self.history
            .iter()
            .find(|(ts, _)| *ts == self.acknowledged)
            .map(|(_, scene)| scene)
    }
}

type SceneDiff<T> = (
    Vec<(ActorId, T)>,
    Vec<(ActorId, <T as Replicated>::Diff)>,
    Vec<ActorId>,
);

fn diff_scenes<T: Replicated>(base: &Scene<T>, scene: &Scene<T>) -> SceneDiff<T> {
    let mut added = Vec::new();
    let mut updated = Vec::new();
    for (id, actor) in scene {
        match base.get(id) {
            None => added.push((*id, actor.clone())),
            Some(old) => {
                if let Some(diff) = actor.diff(old) {
                    updated.push((*id, diff));
                }
            }
        }
    }
    let removed = base
        .keys()
        .filter(|id| !scene.contains_key(id))
        .copied()
        .collect();
    (added, updated, removed)
}
