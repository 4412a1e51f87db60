//! Graph Targets
//!
//! Every trackable wrapper (observable or computed) carries a `TargetId`.
//! The dependency and subscriber tables are keyed by `(TargetId, key)`, so
//! the wrapper itself — never its underlying storage — is the identity that
//! participates in the graph.

use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a trackable target in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    ///
    /// Uses an atomic counter shared by observables and computeds, so IDs
    /// never collide across the two kinds.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Types that can be named as the target of a watch registration.
///
/// Implemented by the reactive wrappers; `unwatch` accepts any of them.
pub trait Watchable {
    /// The graph identity of this wrapper.
    fn target_id(&self) -> TargetId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let a = TargetId::new();
        let b = TargetId::new();
        let c = TargetId::new();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }
}
