//! Watch API
//!
//! The public surface for registering effects against the reactive graph.
//! Every entry point returns a [`Disposer`] that removes the registrations
//! it created; disposal is idempotent.
//!
//! # Registration Styles
//!
//! - [`watch`] runs the effect once immediately. The initial run happens
//!   with the effect as the current tracking frame, so every tracked read
//!   it performs — including reads done inside computed getters it
//!   triggers — subscribes it for future changes.
//!
//! - [`watch_ref`], [`watch_computed`], and [`watch_reactive`] subscribe
//!   typed wrapper callbacks to specific `(target, key)` slots without an
//!   initial invocation. Wrappers read the target for the new value at
//!   notification time and report the old value they were handed.

use std::sync::Arc;

use super::computed::Computed;
use super::context::EffectFrame;
use super::effect::{Disposer, Effect, EffectId};
use super::observable::{Observable, Ref};
use super::VALUE_KEY;
use crate::graph::{self, Watchable};
use crate::value::Value;

/// Register an effect and run it once synchronously.
///
/// The callback receives the previous value of whichever key triggered the
/// notification; the initial run receives `Nil`. The returned disposer
/// removes the effect from every `(target, key)` it subscribed to.
pub fn watch<F>(effect: F) -> Disposer
where
    F: Fn(Value) + Send + Sync + 'static,
{
    let effect = Effect::new(effect);
    let id = effect.id();

    {
        let _frame = EffectFrame::enter(effect.clone());
        effect.call(Value::Nil);
    }

    Disposer::new(vec![id])
}

/// Watch a ref's `value` slot.
///
/// The callback receives `(new, old)`. Not invoked at registration time.
pub fn watch_ref<F>(r: &Ref, callback: F) -> Disposer
where
    F: Fn(Value, Value) + Send + Sync + 'static,
{
    let target = r.observable().clone();
    let effect = Effect::new(move |old| {
        let new = target.get(VALUE_KEY);
        callback(new, old);
    });
    let id = effect.id();

    graph::subscribe(r.id(), VALUE_KEY, effect);
    Disposer::new(vec![id])
}

/// Watch a computed's `value` slot.
///
/// The callback receives `(new, old)`; the wrapper reads the computed for
/// the new value, recomputing it if an upstream change left it dirty.
pub fn watch_computed<F>(c: &Computed, callback: F) -> Disposer
where
    F: Fn(Value, Value) + Send + Sync + 'static,
{
    let target = c.clone();
    let effect = Effect::new(move |old| {
        let new = target.get();
        callback(new, old);
    });
    let id = effect.id();

    graph::subscribe(c.id(), VALUE_KEY, effect);
    Disposer::new(vec![id])
}

/// Watch a getter by first wrapping it in a computed.
///
/// The wrapper keeps the computed alive for as long as the subscription
/// exists.
pub fn watch_computed_fn<G, F>(getter: G, callback: F) -> Disposer
where
    G: Fn(Value) -> Value + Send + Sync + 'static,
    F: Fn(Value, Value) + Send + Sync + 'static,
{
    let computed = Computed::new(getter);
    watch_computed(&computed, callback)
}

/// Watch every key of an observable, recursively.
///
/// Walks the observable's storage at registration time; for every
/// `(observable, key)` encountered — keys of nested observables included —
/// subscribes a wrapper reporting `(key, new, old)`. Records assigned after
/// registration are converted by the deep write path but are not walked
/// retroactively.
///
/// The returned disposer covers all wrappers at once.
pub fn watch_reactive<F>(obs: &Observable, callback: F) -> Disposer
where
    F: Fn(&str, Value, Value) + Send + Sync + 'static,
{
    let callback: Arc<dyn Fn(&str, Value, Value) + Send + Sync> = Arc::new(callback);
    let mut effects = Vec::new();
    walk(obs, &callback, &mut effects);
    Disposer::new(effects)
}

fn walk(
    obs: &Observable,
    callback: &Arc<dyn Fn(&str, Value, Value) + Send + Sync>,
    effects: &mut Vec<EffectId>,
) {
    for (key, value) in obs.raw().entries() {
        let target = obs.clone();
        let effect_key = key.clone();
        let effect_callback = Arc::clone(callback);

        let effect = Effect::new(move |old| {
            let new = target.get(&effect_key);
            effect_callback(&effect_key, new, old);
        });
        effects.push(effect.id());
        graph::subscribe(obs.id(), &key, effect);

        if let Value::Reactive(nested) = value {
            walk(&nested, callback, effects);
        }
    }
}

/// Remove subscriptions from `target`.
///
/// With both `key` and `effect`, removes that single effect; with only
/// `key`, drops every effect on the key; with neither, drops every effect
/// on the target.
pub fn unwatch(target: &dyn Watchable, key: Option<&str>, effect: Option<EffectId>) {
    graph::unsubscribe(target.target_id(), key, effect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::context;
    use crate::value::Table;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[test]
    fn watch_runs_once_immediately() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let disposer = watch(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
        disposer.dispose();
    }

    #[test]
    fn watch_pops_effect_frame_after_initial_run() {
        let disposer = watch(|_| {
            assert!(context::current_effect().is_some());
        });

        assert!(context::current_effect().is_none());
        disposer.dispose();
    }

    #[test]
    fn watch_pops_effect_frame_when_initial_run_panics() {
        let result = std::panic::catch_unwind(|| {
            watch(|_| panic!("initial run failed"));
        });

        assert!(result.is_err());
        assert!(context::current_effect().is_none());
    }

    #[test]
    fn nested_watch_restores_outer_effect() {
        let outer_seen = Arc::new(Mutex::new(Vec::new()));
        let outer_seen_clone = outer_seen.clone();

        let outer = watch(move |_| {
            let inner = watch(|_| {});
            inner.dispose();
            outer_seen_clone
                .lock()
                .unwrap()
                .push(context::current_effect().is_some());
        });

        // The inner registration popped its own frame; the outer effect was
        // still current afterwards.
        assert_eq!(outer_seen.lock().unwrap().as_slice(), &[true]);
        outer.dispose();
    }

    #[test]
    fn watch_ref_is_not_invoked_at_registration() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let r = Ref::new(Value::Int(1));
        let disposer = watch_ref(&r, move |_, _| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 0);
        r.set(Value::Int(2));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        disposer.dispose();
    }

    #[test]
    fn unwatch_by_key_drops_subscriptions() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();

        let obs = Observable::new(Table::new());
        obs.set("k", Value::Int(0));

        let obs_clone = obs.clone();
        let disposer = watch(move |_| {
            obs_clone.get("k");
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(count.load(Ordering::SeqCst), 1);

        unwatch(&obs, Some("k"), None);
        obs.set("k", Value::Int(1));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        disposer.dispose();
    }
}
