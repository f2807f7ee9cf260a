//! Delta retention settings.

use serde::{Deserialize, Serialize};

/// Settings shared by [`DeltaSender`](crate::DeltaSender) and
/// [`DeltaReceiver`](crate::DeltaReceiver).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaConfig {
    /// How many snapshots each side keeps.
    ///
    /// On the sender this bounds which acknowledged baselines can still
    /// be referenced; older ones fall back to reference 0.
    ///
    /// Default: 32.
    pub history_window: usize,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self { history_window: 32 }
    }
}
