//! Dependency and Subscriber Tables
//!
//! Two process-wide, two-level tables keyed by `(TargetId, key)` hold the
//! whole reactive graph:
//!
//! - `DEPS` maps a tracked key to the computeds that read it during their
//!   most recent evaluation. A write walks this table to dirty-mark every
//!   transitively dependent computed.
//! - `EFFECTS` maps a tracked key to the effect callbacks subscribed to it,
//!   in insertion order. A write notifies these after dirty-marking
//!   completes, so an effect that reads a computed always sees a value
//!   recomputed from current upstream state.
//!
//! Both lists are deduplicated, so re-reading the same key within one
//! evaluation never grows them.
//!
//! # Locking
//!
//! No table lock is held while user code runs: propagation snapshots each
//! dependents list before recursing, and notification snapshots the effect
//! list before invoking callbacks. Effects may therefore subscribe,
//! unsubscribe, or write re-entrantly; list changes made during a cascade
//! apply to subsequent cascades, not the in-flight iteration.
//!
//! Dependents are held weakly: a computed whose last handle was dropped is
//! pruned the next time propagation crosses its entry.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use super::target::TargetId;
use crate::reactive::computed::{Computed, ComputedWeak};
use crate::reactive::context;
use crate::reactive::effect::{Effect, EffectId};
use crate::reactive::VALUE_KEY;
use crate::value::Value;

type KeyTable<T> = HashMap<String, Vec<T>>;

static DEPS: OnceLock<RwLock<HashMap<TargetId, KeyTable<ComputedWeak>>>> = OnceLock::new();
static EFFECTS: OnceLock<RwLock<HashMap<TargetId, KeyTable<Effect>>>> = OnceLock::new();

fn deps_table() -> &'static RwLock<HashMap<TargetId, KeyTable<ComputedWeak>>> {
    DEPS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn effects_table() -> &'static RwLock<HashMap<TargetId, KeyTable<Effect>>> {
    EFFECTS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Record the current tracking frames as readers of `(target, key)`.
///
/// Called by every tracked read: the current effect (if any) subscribes to
/// the key, and the current computed (if any, and not `target` itself) is
/// linked as a dependent.
pub(crate) fn track(target: TargetId, key: &str) {
    if let Some(effect) = context::current_effect() {
        subscribe(target, key, effect);
    }
    if let Some(computed) = context::current_computed() {
        if computed.id() != target {
            link(target, key, &computed);
        }
    }
}

/// Append `dependent` to the dependents of `(target, key)` if absent.
pub(crate) fn link(target: TargetId, key: &str, dependent: &Computed) {
    let mut deps = deps_table().write().expect("deps lock poisoned");
    let list = deps
        .entry(target)
        .or_default()
        .entry(key.to_string())
        .or_default();

    if !list.iter().any(|w| w.target_id() == dependent.id()) {
        list.push(dependent.downgrade());
    }
}

/// Dirty-mark every computed transitively dependent on `(target, key)`.
///
/// Pre-order: each dependent is marked before its own dependents are
/// visited. Termination relies on the computed graph being acyclic, which
/// is the caller's responsibility.
pub(crate) fn propagate(target: TargetId, key: &str) {
    let snapshot: Vec<ComputedWeak> = {
        let deps = deps_table().read().expect("deps lock poisoned");
        match deps.get(&target).and_then(|keys| keys.get(key)) {
            Some(list) => list.clone(),
            None => return,
        }
    };

    tracing::trace!(
        target_id = target.raw(),
        key,
        dependents = snapshot.len(),
        "propagate dirty"
    );

    let mut saw_dead = false;
    for weak in &snapshot {
        match weak.upgrade() {
            Some(dependent) => {
                dependent.mark_dirty();
                propagate(dependent.id(), VALUE_KEY);
            }
            None => saw_dead = true,
        }
    }

    if saw_dead {
        prune_dead_dependents(target, key);
    }
}

fn prune_dead_dependents(target: TargetId, key: &str) {
    let mut deps = deps_table().write().expect("deps lock poisoned");
    if let Some(keys) = deps.get_mut(&target) {
        if let Some(list) = keys.get_mut(key) {
            list.retain(|w| w.upgrade().is_some());
            if list.is_empty() {
                keys.remove(key);
            }
        }
        if keys.is_empty() {
            deps.remove(&target);
        }
    }
}

/// Append `effect` to the subscribers of `(target, key)` if absent.
pub(crate) fn subscribe(target: TargetId, key: &str, effect: Effect) {
    let mut effects = effects_table().write().expect("effects lock poisoned");
    let list = effects
        .entry(target)
        .or_default()
        .entry(key.to_string())
        .or_default();

    if !list.iter().any(|e| e.id() == effect.id()) {
        list.push(effect);
    }
}

/// Remove subscriptions under `target`.
///
/// With both `key` and `effect`, removes the single effect from that key's
/// list. With only `key`, drops the whole key entry. Without `key`, drops
/// the whole target entry. Empty inner and outer entries are pruned.
pub(crate) fn unsubscribe(target: TargetId, key: Option<&str>, effect: Option<EffectId>) {
    let mut effects = effects_table().write().expect("effects lock poisoned");
    match (key, effect) {
        (Some(key), Some(effect)) => {
            if let Some(keys) = effects.get_mut(&target) {
                if let Some(list) = keys.get_mut(key) {
                    list.retain(|e| e.id() != effect);
                    if list.is_empty() {
                        keys.remove(key);
                    }
                }
                if keys.is_empty() {
                    effects.remove(&target);
                }
            }
        }
        (Some(key), None) => {
            if let Some(keys) = effects.get_mut(&target) {
                keys.remove(key);
                if keys.is_empty() {
                    effects.remove(&target);
                }
            }
        }
        (None, _) => {
            effects.remove(&target);
        }
    }
}

/// Invoke every effect subscribed to `(target, key)` with the old value.
///
/// The list is snapshotted first: registrations and disposals performed by
/// the callbacks affect later cascades only.
pub(crate) fn notify(target: TargetId, key: &str, old: Value) {
    let snapshot: Vec<Effect> = {
        let effects = effects_table().read().expect("effects lock poisoned");
        match effects.get(&target).and_then(|keys| keys.get(key)) {
            Some(list) => list.clone(),
            None => return,
        }
    };

    tracing::trace!(
        target_id = target.raw(),
        key,
        effects = snapshot.len(),
        "notify effects"
    );

    for effect in snapshot {
        effect.call(old.clone());
    }
}

/// Remove `effect` from every `(target, key)` entry it appears in.
pub(crate) fn remove_effect(effect: EffectId) {
    let mut effects = effects_table().write().expect("effects lock poisoned");
    effects.retain(|_, keys| {
        keys.retain(|_, list| {
            list.retain(|e| e.id() != effect);
            !list.is_empty()
        });
        !keys.is_empty()
    });
}

/// Remove `computed` from the dependency graph entirely: from every
/// dependents list it appears in, and its own dependents entry.
pub(crate) fn clear_link(computed: &Computed) {
    let id = computed.id();
    let mut deps = deps_table().write().expect("deps lock poisoned");
    deps.retain(|target, keys| {
        if *target == id {
            return false;
        }
        keys.retain(|_, list| {
            list.retain(|w| w.target_id() != id);
            !list.is_empty()
        });
        !keys.is_empty()
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn notify_fires_in_insertion_order() {
        let target = TargetId::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            subscribe(target, "k", Effect::new(move |_| order.lock().unwrap().push(label)));
        }

        notify(target, "k", Value::Nil);
        assert_eq!(order.lock().unwrap().as_slice(), &["first", "second", "third"]);
    }

    #[test]
    fn subscribe_deduplicates_by_effect_id() {
        let target = TargetId::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let effect = Effect::new(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        subscribe(target, "k", effect.clone());
        subscribe(target, "k", effect.clone());
        subscribe(target, "k", effect);

        notify(target, "k", Value::Nil);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_passes_old_value() {
        let target = TargetId::new();
        let seen = Arc::new(Mutex::new(Value::Nil));
        let seen_clone = seen.clone();

        subscribe(target, "k", Effect::new(move |old| {
            *seen_clone.lock().unwrap() = old;
        }));

        notify(target, "k", Value::Int(9));
        assert_eq!(*seen.lock().unwrap(), Value::Int(9));
    }

    #[test]
    fn unsubscribe_single_effect() {
        let target = TargetId::new();
        let count = Arc::new(AtomicUsize::new(0));

        let keep = {
            let count = count.clone();
            Effect::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            })
        };
        let drop_me = {
            let count = count.clone();
            Effect::new(move |_| {
                count.fetch_add(100, Ordering::SeqCst);
            })
        };

        subscribe(target, "k", keep);
        subscribe(target, "k", drop_me.clone());
        unsubscribe(target, Some("k"), Some(drop_me.id()));

        notify(target, "k", Value::Nil);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_whole_key_and_target() {
        let target = TargetId::new();
        let count = Arc::new(AtomicUsize::new(0));

        for key in ["a", "b"] {
            let count = count.clone();
            subscribe(target, key, Effect::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }));
        }

        unsubscribe(target, Some("a"), None);
        notify(target, "a", Value::Nil);
        notify(target, "b", Value::Nil);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        unsubscribe(target, None, None);
        notify(target, "b", Value::Nil);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn propagate_marks_dependents_transitively() {
        let source = TargetId::new();
        let c1 = Computed::new(|_| Value::Int(1));
        let c2 = Computed::new(|_| Value::Int(2));

        // Evaluate both so their dirty flags clear.
        c1.get();
        c2.get();
        assert!(!c1.is_dirty());
        assert!(!c2.is_dirty());

        link(source, "k", &c1);
        link(c1.id(), VALUE_KEY, &c2);

        propagate(source, "k");
        assert!(c1.is_dirty());
        assert!(c2.is_dirty());
    }

    #[test]
    fn propagate_prunes_dropped_computeds() {
        let source = TargetId::new();
        let survivor = Computed::new(|_| Value::Int(1));
        survivor.get();

        {
            let doomed = Computed::new(|_| Value::Int(2));
            link(source, "k", &doomed);
        }
        link(source, "k", &survivor);

        // The dropped computed is skipped and pruned; the survivor is
        // still marked.
        propagate(source, "k");
        assert!(survivor.is_dirty());

        let deps = deps_table().read().unwrap();
        let list = deps.get(&source).and_then(|keys| keys.get("k")).unwrap();
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn clear_link_removes_computed_everywhere() {
        let source_a = TargetId::new();
        let source_b = TargetId::new();
        let computed = Computed::new(|_| Value::Nil);

        link(source_a, "x", &computed);
        link(source_b, "y", &computed);
        link(computed.id(), VALUE_KEY, &Computed::new(|_| Value::Nil));

        clear_link(&computed);

        let deps = deps_table().read().unwrap();
        assert!(deps.get(&source_a).is_none());
        assert!(deps.get(&source_b).is_none());
        assert!(deps.get(&computed.id()).is_none());
    }

    #[test]
    fn remove_effect_prunes_empty_entries() {
        let target = TargetId::new();
        let effect = Effect::new(|_| {});

        subscribe(target, "k", effect.clone());
        remove_effect(effect.id());

        let effects = effects_table().read().unwrap();
        assert!(effects.get(&target).is_none());
    }
}
