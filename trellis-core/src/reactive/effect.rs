//! Effect Callbacks and Disposers
//!
//! An Effect is a caller-supplied callback bound to the graph purely by
//! appearing in the subscriber table under one or more `(target, key)`
//! entries. When a tracked key changes, every effect subscribed to it is
//! invoked synchronously with the previous value as argument.
//!
//! Effects have no dependency list of their own: the subscriber table is the
//! single source of truth, and a `Disposer` removes the effect from every
//! entry it appears in.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::graph;
use crate::value::Value;

/// Unique identifier for an effect callback.
///
/// Used to deduplicate subscriptions (an effect appears at most once per
/// `(target, key)`) and to remove a specific effect on disposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered side-effect callback.
///
/// Cloning an `Effect` clones the handle; both handles share the same ID and
/// callback, so a clone subscribed elsewhere still deduplicates correctly.
#[derive(Clone)]
pub struct Effect {
    id: EffectId,
    callback: Arc<dyn Fn(Value) + Send + Sync>,
}

impl Effect {
    /// Create a new effect from a callback.
    ///
    /// The callback receives the previous value of whichever key triggered
    /// the notification (`Nil` on the initial run performed by `watch`).
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        Self {
            id: EffectId::new(),
            callback: Arc::new(callback),
        }
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.id
    }

    /// Invoke the callback with the previous value of the changed key.
    pub fn call(&self, old: Value) {
        (self.callback)(old);
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect").field("id", &self.id).finish()
    }
}

/// Handle returned by the watch API that removes the registrations it
/// covers.
///
/// Disposal is explicit and idempotent: calling `dispose` twice is the same
/// as calling it once. Dropping an undisposed `Disposer` leaves the
/// registrations active — an effect lives in the graph until removed.
///
/// Disposing during an active cascade is allowed; the removal takes effect
/// for subsequent cascades, not the in-flight iteration.
pub struct Disposer {
    effects: Vec<EffectId>,
    disposed: AtomicBool,
}

impl Disposer {
    pub(crate) fn new(effects: Vec<EffectId>) -> Self {
        Self {
            effects,
            disposed: AtomicBool::new(false),
        }
    }

    /// Remove every registration this disposer covers from the graph.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for id in &self.effects {
            graph::remove_effect(*id);
        }
    }

    /// Whether `dispose` has already run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Disposer")
            .field("effects", &self.effects.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn effect_ids_are_unique() {
        let a = EffectId::new();
        let b = EffectId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn effect_call_invokes_callback_with_old_value() {
        let seen = Arc::new(std::sync::Mutex::new(Value::Nil));
        let seen_clone = seen.clone();

        let effect = Effect::new(move |old| {
            *seen_clone.lock().unwrap() = old;
        });

        effect.call(Value::Int(7));
        assert_eq!(*seen.lock().unwrap(), Value::Int(7));
    }

    #[test]
    fn effect_clone_shares_id_and_callback() {
        let count = Arc::new(AtomicI32::new(0));
        let count_clone = count.clone();

        let effect = Effect::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        let clone = effect.clone();

        assert_eq!(effect.id(), clone.id());

        effect.call(Value::Nil);
        clone.call(Value::Nil);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn disposer_is_idempotent() {
        let disposer = Disposer::new(vec![EffectId::new()]);

        assert!(!disposer.is_disposed());
        disposer.dispose();
        assert!(disposer.is_disposed());

        // Second call is a no-op.
        disposer.dispose();
        assert!(disposer.is_disposed());
    }
}
