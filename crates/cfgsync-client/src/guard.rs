//! Reentrant change-block guard.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A nesting counter marking "a sync-driven change is in progress".
///
/// [`enter`](Self::enter) bumps the counter and returns a guard that
/// lowers it again when dropped, including on early return or panic.
#[derive(Debug, Clone, Default)]
pub struct ChangeBlock {
    depth: Arc<AtomicUsize>,
}

impl ChangeBlock {
    /// Creates a block that isn't entered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters the block until the returned guard is dropped.
    #[must_use = "the block is left as soon as the guard is dropped"]
    pub fn enter(&self) -> ChangeGuard {
        self.depth.fetch_add(1, Ordering::AcqRel);
        ChangeGuard {
            depth: Arc::clone(&self.depth),
        }
    }

    /// Returns `true` while at least one guard is alive.
    pub fn is_entered(&self) -> bool {
        self.depth() > 0
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Acquire)
    }
}

/// Scope of one [`ChangeBlock::enter`].
#[derive(Debug)]
pub struct ChangeGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for ChangeGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}
